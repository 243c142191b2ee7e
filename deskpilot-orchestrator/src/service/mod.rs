//! Service Module
//!
//! Business logic layer for the orchestrator.
//! - `lifecycle`: the per-request job state machine and its background phase
//! - `tracker`: in-memory job bookkeeping

pub mod lifecycle;
pub mod tracker;

pub use lifecycle::{Collaborators, JobError, JobLifecycleManager, LifecycleSettings};
pub use tracker::{JobTracker, TrackerError};
