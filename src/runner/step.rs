//! Step collaborator seam.
//!
//! A step receives a [`StepContext`] over the job status: it mutates its own
//! config, records token usage and may report progress. Progress reports go
//! through the status store, so they also renew the lease.
use crate::catalog::StepSpec;
use crate::config::JobSettings;
use crate::error::PipelineError;
use crate::status::{JobStatus, StatusStore, StepParams};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// One unit of pipeline work.
pub trait Step {
    fn run(&self, ctx: &mut StepContext<'_>) -> Result<()>;
}

impl<F> Step for F
where
    F: Fn(&mut StepContext<'_>) -> Result<()>,
{
    fn run(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        self(ctx)
    }
}

/// Mutable view of the job handed to a running step.
pub struct StepContext<'a> {
    spec: &'a StepSpec,
    status: &'a mut JobStatus,
    store: &'a StatusStore,
    output_dir: &'a Path,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(
        spec: &'a StepSpec,
        status: &'a mut JobStatus,
        store: &'a StatusStore,
        output_dir: &'a Path,
    ) -> Self {
        Self {
            spec,
            status,
            store,
            output_dir,
        }
    }

    pub fn step(&self) -> &str {
        &self.spec.step
    }

    pub fn spec(&self) -> &StepSpec {
        self.spec
    }

    pub fn settings(&self) -> &JobSettings {
        &self.status.settings
    }

    /// Read-only view of the whole job (other steps' configs included).
    pub fn status(&self) -> &JobStatus {
        self.status
    }

    /// This step's config.
    pub fn params(&self) -> &StepParams {
        self.status
            .steps
            .get(&self.spec.step)
            .unwrap_or_else(|| empty_params())
    }

    /// This step's config, created empty if absent.
    pub fn params_mut(&mut self) -> &mut StepParams {
        self.status.steps.entry(self.spec.step.clone()).or_default()
    }

    /// Directory holding every step artifact of this job.
    pub fn output_dir(&self) -> &Path {
        self.output_dir
    }

    /// Where this step is expected to write its artifact.
    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir.join(&self.spec.filename)
    }

    /// Add model usage to the cumulative job counters.
    pub fn record_usage(&mut self, input_tokens: u64, output_tokens: u64) {
        self.status.token_usage_input += input_tokens;
        self.status.token_usage_output += output_tokens;
        self.status.total_token_usage += input_tokens + output_tokens;
    }

    /// Start a progress bar of `total` tasks.
    pub fn set_progress_total(&mut self, total: u64) -> Result<(), PipelineError> {
        self.store.update(self.status, |status| {
            status.current_job_progress = Some(0);
            status.current_jop_tasks = Some(total);
        })
    }

    /// Mark `incr` more tasks done.
    pub fn advance_progress(&mut self, incr: u64) -> Result<(), PipelineError> {
        self.store.update(self.status, |status| {
            let done = status.current_job_progress.unwrap_or(0) + incr;
            status.current_job_progress = Some(done);
        })
    }

    /// Persist the current state and push the lease forward.
    pub fn renew_lease(&mut self) -> Result<(), PipelineError> {
        self.store.renew(self.status)
    }
}

fn empty_params() -> &'static StepParams {
    static EMPTY: std::sync::OnceLock<StepParams> = std::sync::OnceLock::new();
    EMPTY.get_or_init(StepParams::new)
}
