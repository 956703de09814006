//! Step execution with usage and cost accounting.
//!
//! A planned step is bracketed by two status writes: one marking it current
//! before the collaborator runs, one appending its receipt afterwards.
mod pricing;
mod step;

pub use pricing::{ModelPrice, PriceTable, Pricing};
pub use step::{Step, StepContext};

use crate::catalog::StepSpec;
use crate::error::{ConfigError, PipelineError};
use crate::status::{CompletedJobRecord, JobStatus, StatusStore};
use chrono::Utc;
use std::path::Path;

/// What `run_step` did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Skipped { reason: String },
    Completed { token_usage: u64, duration: f64 },
}

/// Run `spec` through `collaborator` if the plan says so.
///
/// Collaborator failures come back as [`PipelineError::Step`] without any
/// status write; recording them is the terminator's job.
pub fn run_step(
    spec: &StepSpec,
    collaborator: &dyn Step,
    status: &mut JobStatus,
    store: &StatusStore,
    pricing: Option<&dyn Pricing>,
    output_dir: &Path,
) -> Result<StepOutcome, PipelineError> {
    let entry = status
        .plan_entry(&spec.step)
        .ok_or_else(|| ConfigError::UnplannedStep(spec.step.clone()))?;
    if !entry.run {
        tracing::info!(step = %spec.step, reason = %entry.reason, "skipping step");
        return Ok(StepOutcome::Skipped {
            reason: entry.reason.clone(),
        });
    }
    tracing::info!(step = %spec.step, reason = %entry.reason, "running step");

    let started = Utc::now();
    store.update(status, |status| {
        status.current_job = Some(spec.step.clone());
        status.current_job_started = Some(started);
        // The old receipt no longer describes what is on disk.
        status
            .previously_completed_jobs
            .retain(|record| record.step != spec.step);
    })?;

    let tokens_before = status.total_token_usage;
    {
        let mut ctx = StepContext::new(spec, status, store, output_dir);
        collaborator
            .run(&mut ctx)
            .map_err(|error| PipelineError::Step {
                step: spec.step.clone(),
                error,
            })?;
    }
    let token_usage = status.total_token_usage.saturating_sub(tokens_before);

    let estimated_cost = estimate_cost(status, pricing);
    let completed = Utc::now();
    let duration = (completed - started).num_milliseconds() as f64 / 1000.0;
    let record = CompletedJobRecord {
        step: spec.step.clone(),
        completed,
        duration,
        params: status.steps.get(&spec.step).cloned().unwrap_or_default(),
        token_usage,
    };
    store.update(status, |status| {
        status.current_job_progress = None;
        status.current_jop_tasks = None;
        status.completed_jobs.push(record);
        status.estimated_cost = estimated_cost;
    })?;
    tracing::info!(step = %spec.step, token_usage, duration, "step completed");
    Ok(StepOutcome::Completed {
        token_usage,
        duration,
    })
}

/// Cumulative cost of the run so far; `0.0` when it cannot be priced.
fn estimate_cost(status: &JobStatus, pricing: Option<&dyn Pricing>) -> f64 {
    let Some(provider) = status.settings.provider.as_deref() else {
        return 0.0;
    };
    let model = status.settings.model.as_str();
    if model.is_empty() || status.token_usage_input == 0 || status.token_usage_output == 0 {
        return 0.0;
    }
    let Some(pricing) = pricing else {
        tracing::debug!("no pricing configured; recording zero cost");
        return 0.0;
    };
    match pricing.calculate_cost(
        provider,
        model,
        status.token_usage_input,
        status.token_usage_output,
    ) {
        Ok(cost) => {
            tracing::info!(provider, model, cost, "estimated cost");
            cost
        }
        Err(err) => {
            tracing::warn!(provider, model, error = %format!("{err:#}"), "cost estimate failed");
            0.0
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
