//! # Lease Store
//!
//! Time-bounded grants for issued secrets. [`LeaseStore`] owns every lease
//! record; handlers mutate leases only through its API. Time comes from an
//! injected [`Clock`] so expiry behaviour can be driven in tests.

pub mod clock;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{LeaseStore, Renewal, Revocation};
