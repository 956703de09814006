//! Run finalization and history compaction.
use crate::error::PipelineError;
use crate::status::{CompletedJobRecord, JobStatus, PlanEntry, RunStatus, StatusStore};
use chrono::Utc;

/// Fold a prior run's receipts into one history list.
///
/// Receipts of steps the current plan runs are dropped. Either this run
/// holds a newer receipt for the step, or the step never finished and its
/// artifact can no longer be trusted to match the old receipt.
pub fn compact_history(previous: &JobStatus, plan: &[PlanEntry]) -> Vec<CompletedJobRecord> {
    previous
        .history()
        .filter(|record| {
            !plan
                .iter()
                .any(|entry| entry.run && entry.step == record.step)
        })
        .cloned()
        .collect()
}

/// Finalize the run: compact history, drop `previous`, record the outcome.
///
/// On failure the error is persisted and then handed back unchanged, so the
/// caller always sees the original failure.
pub fn terminate(
    status: &mut JobStatus,
    store: &StatusStore,
    error: Option<PipelineError>,
) -> Result<(), PipelineError> {
    if let Some(previous) = status.previous.take() {
        status.previously_completed_jobs = compact_history(&previous, &status.plan);
    }

    let Some(error) = error else {
        store.update(status, |status| {
            status.status = Some(RunStatus::Completed);
            status.end_time = Some(Utc::now());
        })?;
        tracing::info!(
            output_dir = %status.output_dir,
            total_token_usage = status.total_token_usage,
            estimated_cost = status.estimated_cost,
            "pipeline completed"
        );
        return Ok(());
    };

    let message = format!("{}: {}", error.kind(), error);
    let trace = error.trace();
    tracing::error!(output_dir = %status.output_dir, error = %message, "pipeline failed");
    if let Err(write_err) = store.update(status, |status| {
        status.status = Some(RunStatus::Error);
        status.end_time = Some(Utc::now());
        status.error = Some(message);
        status.error_stack_trace = Some(trace);
    }) {
        tracing::error!(error = %write_err, "could not record pipeline failure");
    }
    Err(error)
}

#[cfg(test)]
#[path = "terminate_tests.rs"]
mod tests;
