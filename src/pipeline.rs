//! Pipeline driver: initialization, the step loop and termination.
//!
//! Initialization validates the job, checks the lease of any previous run,
//! resolves step configs and computes the whole plan before anything runs.
use crate::catalog::StepCatalog;
use crate::config::{output_dir_name, resolve_step_params, validate_job, JobFile, JobSettings};
use crate::error::{ConfigError, PipelineError};
use crate::plan::{compute_plan, RunFlags};
use crate::runner::{run_step, Pricing, Step};
use crate::status::{
    check_lease, JobStatus, LeasePolicy, PipelinePaths, PlanEntry, ResumeState, RunStatus,
    StatusStore,
};
use crate::terminate::{compact_history, terminate};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

/// A job that passed initialization checks but has not started.
#[derive(Debug)]
pub struct PreparedRun {
    pub status: JobStatus,
    pub store: StatusStore,
    pub resume: ResumeState,
}

impl PreparedRun {
    pub fn plan(&self) -> &[PlanEntry] {
        &self.status.plan
    }
}

/// Asks whether a computed plan should go ahead.
pub trait Confirm {
    fn confirm(&mut self, plan: &[PlanEntry]) -> std::io::Result<bool>;
}

/// Prints the plan and waits for Enter on stdin.
#[derive(Debug, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, plan: &[PlanEntry]) -> std::io::Result<bool> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "So, here is what I am planning to run:")?;
        for entry in plan {
            let verb = if entry.run { "run " } else { "skip" };
            writeln!(stdout, "  {verb} {:<28} {}", entry.step, entry.reason)?;
        }
        writeln!(stdout, "Looks good? Press enter to continue or Ctrl+C to abort.")?;
        stdout.flush()?;
        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        Ok(read > 0)
    }
}

/// Step catalog plus the collaborators that implement each step.
pub struct Pipeline {
    paths: PipelinePaths,
    catalog: StepCatalog,
    steps: BTreeMap<String, Box<dyn Step>>,
    pricing: Option<Box<dyn Pricing>>,
    lease: LeasePolicy,
}

impl Pipeline {
    pub fn new(paths: PipelinePaths, catalog: StepCatalog) -> Self {
        Self {
            paths,
            catalog,
            steps: BTreeMap::new(),
            pricing: None,
            lease: LeasePolicy::default(),
        }
    }

    /// Register the collaborator for `name`.
    pub fn with_step(mut self, name: &str, step: impl Step + 'static) -> Self {
        self.steps.insert(name.to_string(), Box::new(step));
        self
    }

    pub fn with_pricing(mut self, pricing: impl Pricing + 'static) -> Self {
        self.pricing = Some(Box::new(pricing));
        self
    }

    pub fn with_lease(mut self, lease: LeasePolicy) -> Self {
        self.lease = lease;
        self
    }

    pub fn paths(&self) -> &PipelinePaths {
        &self.paths
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    /// Validate, check the lease and plan without writing anything.
    pub fn prepare(&self, job_file: &Path, flags: &RunFlags) -> Result<PreparedRun, PipelineError> {
        let job = JobFile::load(job_file)?;
        validate_job(&job, &self.catalog)?;
        if let Some(only) = flags.only.as_deref() {
            if !self.catalog.contains(only) {
                return Err(ConfigError::UnknownOnlyStep(only.to_string()).into());
            }
        }
        let output_dir = output_dir_name(job_file);
        let store = StatusStore::new(&self.paths, &output_dir, self.lease);

        let previous = store.load()?;
        let resume = check_lease(previous.as_ref(), Utc::now())?;

        let settings = JobSettings::from_job(&job)?;
        let steps = resolve_step_params(&self.catalog, &job, &settings, &self.paths)?;
        let mut status = JobStatus::new(settings, output_dir, steps);
        status.plan = compute_plan(
            &self.catalog,
            &status,
            previous.as_ref(),
            flags,
            &self.output_path(&status.output_dir),
        );
        status.previous = previous.map(Box::new);
        Ok(PreparedRun {
            status,
            store,
            resume,
        })
    }

    /// Prepare the run, confirm the plan if asked to, and record the start.
    pub fn initialize(
        &self,
        job_file: &Path,
        flags: &RunFlags,
        confirm: &mut dyn Confirm,
    ) -> Result<PreparedRun, PipelineError> {
        let PreparedRun {
            mut status,
            store,
            resume,
        } = self.prepare(job_file, flags)?;
        for entry in status.plan.iter().filter(|entry| entry.run) {
            if !self.steps.contains_key(&entry.step) {
                return Err(ConfigError::MissingCollaborator(entry.step.clone()).into());
            }
        }

        let output_path = self.output_path(&status.output_dir);
        fs::create_dir_all(&output_path)
            .map_err(|source| PipelineError::persistence("create", &output_path, source))?;

        if !flags.skip_interaction {
            let accepted = confirm
                .confirm(&status.plan)
                .map_err(|err| PipelineError::Aborted(err.to_string()))?;
            if !accepted {
                return Err(PipelineError::Aborted("plan not confirmed".to_string()));
            }
        }

        // Only receipts of skipped steps carry over; a planned step that
        // never finishes must leave no trace behind.
        let history = status
            .previous
            .as_deref()
            .map(|previous| compact_history(previous, &status.plan))
            .unwrap_or_default();
        store.update(&mut status, |status| {
            status.status = Some(RunStatus::Running);
            status.start_time = Some(Utc::now());
            status.completed_jobs = Vec::new();
            status.previously_completed_jobs = history;
            status.total_token_usage = 0;
            status.token_usage_input = 0;
            status.token_usage_output = 0;
        })?;
        tracing::info!(
            output_dir = %status.output_dir,
            resume = ?resume,
            steps = status.plan.iter().filter(|entry| entry.run).count(),
            "pipeline started"
        );
        Ok(PreparedRun {
            status,
            store,
            resume,
        })
    }

    /// Run the job end to end and return its final status.
    ///
    /// Failures before the start record abort without touching the status
    /// file; failures after it are recorded by the terminator and returned.
    pub fn run(
        &self,
        job_file: &Path,
        flags: &RunFlags,
        confirm: &mut dyn Confirm,
    ) -> Result<JobStatus, PipelineError> {
        let PreparedRun {
            mut status, store, ..
        } = self.initialize(job_file, flags, confirm)?;
        let result = self.execute(&mut status, &store);
        terminate(&mut status, &store, result.err())?;
        Ok(status)
    }

    fn execute(&self, status: &mut JobStatus, store: &StatusStore) -> Result<(), PipelineError> {
        let output_path = self.output_path(&status.output_dir);
        for spec in self.catalog.steps() {
            let planned = status
                .plan_entry(&spec.step)
                .map(|entry| entry.run)
                .ok_or_else(|| ConfigError::UnplannedStep(spec.step.clone()))?;
            let collaborator: &dyn Step = match self.steps.get(&spec.step) {
                Some(step) => step.as_ref(),
                None if !planned => &skip_only,
                None => return Err(ConfigError::MissingCollaborator(spec.step.clone()).into()),
            };
            run_step(
                spec,
                collaborator,
                status,
                store,
                self.pricing.as_deref(),
                &output_path,
            )?;
        }
        Ok(())
    }

    fn output_path(&self, output_dir: &str) -> PathBuf {
        self.paths.output_dir(output_dir)
    }
}

/// Stand-in for unregistered steps the plan skips; never invoked.
fn skip_only(_: &mut crate::runner::StepContext<'_>) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
