//! Incremental, resumable orchestration of report-generation pipelines.
//!
//! A job file names the steps to configure; the step catalog declares what
//! each step produces and depends on. Every invocation plans which steps must
//! re-run against the persisted status of the previous run, executes them in
//! catalog order, and keeps the status file current so a crashed or changed
//! job picks up where it left off.
pub mod catalog;
pub mod command_step;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod runner;
pub mod status;
pub mod terminate;

#[cfg(test)]
mod test_support;

pub use catalog::{StepCatalog, StepSpec};
pub use command_step::CommandStep;
pub use error::{ConfigError, PipelineError};
pub use pipeline::{Confirm, Pipeline, PreparedRun, StdinConfirm};
pub use plan::{compute_plan, RunFlags};
pub use runner::{run_step, Pricing, PriceTable, Step, StepContext, StepOutcome};
pub use status::{JobStatus, LeasePolicy, PipelinePaths, StatusStore};
pub use terminate::terminate;
