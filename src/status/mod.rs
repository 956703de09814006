//! Job status schema, the status store and its lease lock.
//!
//! Every component routes persisted state changes through
//! [`StatusStore::update`], which keeps the lease fresh.
mod paths;
mod store;
mod summary;
mod types;

pub use paths::{PipelinePaths, STATUS_FILE_NAME};
pub use store::{check_lease, LeasePolicy, ResumeState, StatusStore, DEFAULT_LEASE_SECS};
pub use summary::{current_step, CurrentStep};
pub use types::{CompletedJobRecord, JobStatus, PlanEntry, RunStatus, StepParams, STATUS_KEYS};
