//! Waiting registry for pending registrations.
//!
//! All state sits behind one mutex so that selection, eviction and removal
//! never interleave. No method holds the lock across an `.await`; the
//! coordinator claims an entry, talks to the row store unlocked, then comes
//! back to [`WaitingRegistry::complete`] or [`WaitingRegistry::release`].

use crate::notifier::SessionId;
use crate::persistence::RowPosition;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// A registration waiting for its card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRegistration {
    /// Display name as submitted.
    pub name: String,
    /// Where the registration row lives in the row store.
    pub position: RowPosition,
    /// Browser session that submitted the registration.
    pub session: SessionId,
    /// When the registration entered the registry.
    pub arrived_at: Instant,
    seq: u64,
    in_flight: bool,
}

impl PendingRegistration {
    /// `now - arrived_at > timeout`.
    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.arrived_at) > timeout
    }

    /// Insertion sequence number; breaks ties between equal arrival times.
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Whether a scan is currently writing this registration's card.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    fn order_key(&self) -> (Instant, u64) {
        (self.arrived_at, self.seq)
    }
}

/// An entry a scan has reserved.
#[derive(Debug, Clone)]
pub struct Claim {
    pub reg_no: String,
    pub entry: PendingRegistration,
}

/// Result of [`WaitingRegistry::claim_oldest`].
#[derive(Debug, Default)]
pub struct ClaimResult {
    pub claim: Option<Claim>,
    /// Expired candidates removed while searching.
    pub evicted: Vec<(String, PendingRegistration)>,
}

/// Outcome of a status lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Waiting,
    TimedOut(PendingRegistration),
    Absent,
}

#[derive(Debug, Default)]
struct RegistryState {
    entries: HashMap<String, PendingRegistration>,
    next_seq: u64,
}

impl RegistryState {
    fn oldest(&self, include_in_flight: bool) -> Option<(&String, &PendingRegistration)> {
        self.entries
            .iter()
            .filter(|(_, entry)| include_in_flight || !entry.in_flight)
            .min_by_key(|(_, entry)| entry.order_key())
    }

    fn evict_if_expired(
        &mut self,
        reg_no: &str,
        now: Instant,
        timeout: Duration,
    ) -> Option<PendingRegistration> {
        let expired = self
            .entries
            .get(reg_no)
            .map(|entry| !entry.in_flight && entry.is_expired(now, timeout))
            .unwrap_or(false);
        if expired {
            self.entries.remove(reg_no)
        } else {
            None
        }
    }
}

/// Registrations waiting for a scan, keyed by registration number.
///
/// Holds at most one entry per registration number. Re-registering a number
/// that is still pending replaces the earlier entry, including its arrival
/// time and row position.
#[derive(Debug, Default)]
pub struct WaitingRegistry {
    inner: Mutex<RegistryState>,
}

impl WaitingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // Every mutation completes before the guard drops, so a poisoned
        // state is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a registration, stamped with the current time.
    ///
    /// Returns the entry it replaced, if any.
    pub fn insert(
        &self,
        reg_no: impl Into<String>,
        name: impl Into<String>,
        position: RowPosition,
        session: SessionId,
    ) -> Option<PendingRegistration> {
        let reg_no = reg_no.into();
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;

        let entry = PendingRegistration {
            name: name.into(),
            position,
            session,
            arrived_at: Instant::now(),
            seq,
            in_flight: false,
        };
        let replaced = state.entries.insert(reg_no.clone(), entry);
        if let Some(old) = &replaced {
            warn!(
                reg_no = %reg_no,
                old_row = old.position.row(),
                new_row = position.row(),
                "Registration number re-submitted while pending; replacing earlier entry"
            );
        }
        replaced
    }

    /// The longest-waiting entry, claimed or not.
    pub fn peek_oldest(&self) -> Option<(String, PendingRegistration)> {
        let state = self.lock();
        state
            .oldest(true)
            .map(|(reg_no, entry)| (reg_no.clone(), entry.clone()))
    }

    /// Remove an entry unconditionally.
    pub fn remove(&self, reg_no: &str) -> Option<PendingRegistration> {
        self.lock().entries.remove(reg_no)
    }

    /// Remove the entry if it has outlived `timeout`.
    ///
    /// Entries claimed by an in-flight scan are left alone.
    pub fn evict_if_expired(
        &self,
        reg_no: &str,
        now: Instant,
        timeout: Duration,
    ) -> Option<PendingRegistration> {
        self.lock().evict_if_expired(reg_no, now, timeout)
    }

    /// Look up a registration for a status poll, evicting it if expired.
    pub fn probe(&self, reg_no: &str, now: Instant, timeout: Duration) -> Probe {
        let mut state = self.lock();
        if let Some(entry) = state.evict_if_expired(reg_no, now, timeout) {
            return Probe::TimedOut(entry);
        }
        if state.entries.contains_key(reg_no) {
            Probe::Waiting
        } else {
            Probe::Absent
        }
    }

    /// Reserve the oldest live entry for a scan.
    ///
    /// Expired entries met on the way are evicted rather than claimed. The
    /// claimed entry stays visible to status polls as waiting.
    pub fn claim_oldest(&self, now: Instant, timeout: Duration) -> ClaimResult {
        let mut state = self.lock();
        let mut result = ClaimResult::default();

        loop {
            let reg_no = match state.oldest(false) {
                Some((reg_no, _)) => reg_no.clone(),
                None => return result,
            };

            if let Some(expired) = state.evict_if_expired(&reg_no, now, timeout) {
                result.evicted.push((reg_no, expired));
                continue;
            }

            if let Some(entry) = state.entries.get_mut(&reg_no) {
                entry.in_flight = true;
                result.claim = Some(Claim {
                    reg_no,
                    entry: entry.clone(),
                });
            }
            return result;
        }
    }

    /// Remove a claimed entry after a successful link.
    ///
    /// Returns `None` if the registration was replaced while the scan was in
    /// flight; the replacement stays pending.
    pub fn complete(&self, claim: &Claim) -> Option<PendingRegistration> {
        let mut state = self.lock();
        let same = state
            .entries
            .get(&claim.reg_no)
            .map(|entry| entry.seq == claim.entry.seq)
            .unwrap_or(false);
        if same {
            state.entries.remove(&claim.reg_no)
        } else {
            None
        }
    }

    /// Return a claimed entry to the waiting pool after a failed link.
    ///
    /// The original arrival time is kept. Returns `false` if the entry was
    /// replaced or removed meanwhile.
    pub fn release(&self, claim: &Claim) -> bool {
        let mut state = self.lock();
        match state.entries.get_mut(&claim.reg_no) {
            Some(entry) if entry.seq == claim.entry.seq => {
                entry.in_flight = false;
                true
            }
            _ => false,
        }
    }

    /// Evict every expired, unclaimed entry.
    pub fn sweep_expired(&self, now: Instant, timeout: Duration) -> Vec<(String, PendingRegistration)> {
        let mut state = self.lock();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| !entry.in_flight && entry.is_expired(now, timeout))
            .map(|(reg_no, _)| reg_no.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|reg_no| state.entries.remove(&reg_no).map(|entry| (reg_no, entry)))
            .collect()
    }

    pub fn contains(&self, reg_no: &str) -> bool {
        self.lock().entries.contains_key(reg_no)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}
