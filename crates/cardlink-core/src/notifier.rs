//! Per-session completion signals.
//!
//! Once a scan links a registration its registry entry is gone, so the
//! browser that submitted it needs another place to learn the result. Each
//! session gets a small slot: the registration it is watching, and a linked
//! signal that the next matching status check consumes. Slots nobody comes
//! back for are dropped by [`SessionNotifier::sweep_stale`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Opaque per-browser token correlating a registration with its status polls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
struct SessionSlot {
    watching: Option<String>,
    linked: Option<String>,
    /// Last watch or link signal stored in this slot.
    touched: Instant,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            watching: None,
            linked: None,
            touched: Instant::now(),
        }
    }

    fn is_empty(&self) -> bool {
        self.watching.is_none() && self.linked.is_none()
    }
}

/// Consume-once link notifications keyed by session.
#[derive(Debug, Default)]
pub struct SessionNotifier {
    slots: Mutex<HashMap<SessionId, SessionSlot>>,
}

impl SessionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that `session` is waiting on `reg_no`.
    ///
    /// Returns the different registration the session was watching before,
    /// if any.
    pub fn watch(&self, session: &SessionId, reg_no: &str) -> Option<String> {
        let mut slots = self.lock();
        let slot = slots.entry(session.clone()).or_insert_with(SessionSlot::new);
        slot.touched = Instant::now();
        slot.watching
            .replace(reg_no.to_string())
            .filter(|previous| previous != reg_no)
    }

    #[cfg(test)]
    pub(crate) fn watching(&self, session: &SessionId) -> Option<String> {
        self.lock().get(session).and_then(|slot| slot.watching.clone())
    }

    /// Stop watching `reg_no` (timeout). Leaves any other watch in place.
    pub fn unwatch(&self, session: &SessionId, reg_no: &str) {
        let mut slots = self.lock();
        if let Some(slot) = slots.get_mut(session) {
            if slot.watching.as_deref() == Some(reg_no) {
                slot.watching = None;
            }
            if slot.is_empty() {
                slots.remove(session);
            }
        }
    }

    /// Signal that `reg_no` was linked on behalf of `session`.
    ///
    /// Overwrites an unconsumed earlier signal.
    pub fn mark_linked(&self, session: &SessionId, reg_no: &str) {
        let mut slots = self.lock();
        let slot = slots.entry(session.clone()).or_insert_with(SessionSlot::new);
        if slot.watching.as_deref() == Some(reg_no) {
            slot.watching = None;
        }
        slot.linked = Some(reg_no.to_string());
        slot.touched = Instant::now();
        debug!(session = %session, reg_no = %reg_no, "Link signal stored");
    }

    /// Consume the linked signal if it is for `reg_no`.
    ///
    /// A signal for a different registration is left untouched.
    pub fn take_linked(&self, session: &SessionId, reg_no: &str) -> bool {
        let mut slots = self.lock();
        let Some(slot) = slots.get_mut(session) else {
            return false;
        };
        if slot.linked.as_deref() != Some(reg_no) {
            return false;
        }
        slot.linked = None;
        if slot.is_empty() {
            slots.remove(session);
        }
        true
    }

    /// Drop slots untouched for longer than `ttl`. Returns how many went.
    ///
    /// A browser that closed its tab never consumes its signal; this is the
    /// only way such a slot leaves the map.
    pub fn sweep_stale(&self, now: Instant, ttl: Duration) -> usize {
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|_, slot| now.saturating_duration_since(slot.touched) <= ttl);
        before - slots.len()
    }

    /// Number of sessions holding a watch or an unconsumed signal.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linked_signal_consumed_once() {
        let notifier = SessionNotifier::new();
        let session = SessionId::new("browser-1");

        notifier.mark_linked(&session, "R1");

        assert!(notifier.take_linked(&session, "R1"));
        assert!(!notifier.take_linked(&session, "R1"));
        assert!(notifier.is_empty());
    }

    #[test]
    fn test_signal_for_other_registration_is_kept() {
        let notifier = SessionNotifier::new();
        let session = SessionId::new("browser-1");

        notifier.mark_linked(&session, "R1");

        assert!(!notifier.take_linked(&session, "R2"));
        assert!(notifier.take_linked(&session, "R1"));
    }

    #[test]
    fn test_signal_is_per_session() {
        let notifier = SessionNotifier::new();
        notifier.mark_linked(&SessionId::new("a"), "R1");

        assert!(!notifier.take_linked(&SessionId::new("b"), "R1"));
        assert!(notifier.take_linked(&SessionId::new("a"), "R1"));
    }

    #[test]
    fn test_watch_cleared_by_link_and_unwatch() {
        let notifier = SessionNotifier::new();
        let session = SessionId::new("browser-1");

        assert!(notifier.watch(&session, "R1").is_none());
        assert_eq!(notifier.watching(&session).as_deref(), Some("R1"));

        notifier.mark_linked(&session, "R1");
        assert!(notifier.watching(&session).is_none());

        notifier.watch(&session, "R2");
        notifier.unwatch(&session, "R3");
        assert_eq!(notifier.watching(&session).as_deref(), Some("R2"));
        notifier.unwatch(&session, "R2");
        assert!(notifier.watching(&session).is_none());
    }

    #[test]
    fn test_watch_reports_replaced_registration() {
        let notifier = SessionNotifier::new();
        let session = SessionId::new("browser-1");

        assert!(notifier.watch(&session, "R1").is_none());
        assert!(notifier.watch(&session, "R1").is_none());
        assert_eq!(notifier.watch(&session, "R2").as_deref(), Some("R1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_stale_drops_old_slots() {
        let notifier = SessionNotifier::new();
        let ttl = Duration::from_secs(300);

        notifier.mark_linked(&SessionId::new("closed-tab"), "R1");
        notifier.watch(&SessionId::new("gone"), "R2");
        tokio::time::advance(Duration::from_secs(200)).await;
        notifier.mark_linked(&SessionId::new("fresh"), "R3");

        assert_eq!(notifier.sweep_stale(Instant::now(), ttl), 0);
        tokio::time::advance(Duration::from_secs(150)).await;

        assert_eq!(notifier.sweep_stale(Instant::now(), ttl), 2);
        assert_eq!(notifier.len(), 1);
        assert!(notifier.take_linked(&SessionId::new("fresh"), "R3"));
    }
}
