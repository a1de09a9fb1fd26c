//! Time-driven tournament lifecycle.
//!
//! Every replica runs a [`LifecycleScheduler`]; the [`LockCoordinator`]
//! makes sure only one of them sweeps at a time.

pub mod lock;
pub mod scheduler;

pub use lock::{DEFAULT_LIFECYCLE_LOCK_KEY, LockCoordinator, LockOutcome};
pub use scheduler::{DEFAULT_SWEEP_INTERVAL, LifecycleScheduler, SweepReport};
