//! In-memory registry of registrations waiting for a card scan.

mod waiting;

pub use waiting::{Claim, ClaimResult, PendingRegistration, Probe, WaitingRegistry};
