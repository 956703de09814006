//! Run/skip planning.
//!
//! For every catalog step, in declaration order, the first matching rule
//! decides whether it runs. Upstream re-runs are read from the entries
//! already decided, which is why the catalog must list producers first.
use crate::catalog::{StepCatalog, StepSpec};
use crate::status::{CompletedJobRecord, JobStatus, PlanEntry, StepParams};
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Control flags of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFlags {
    /// Re-run every step.
    pub force: bool,
    /// Run only this step.
    pub only: Option<String>,
    /// Start without asking for confirmation of the plan.
    pub skip_interaction: bool,
    /// Skip the HTML visualization step.
    pub without_html: bool,
}

/// Why a step runs or is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanReason {
    SkipHtml,
    Forced,
    ForcedAnotherStep,
    ForcedThisStep,
    NoPreviousTrace,
    OutputMissing,
    DependentStepsRerunning(Vec<String>),
    ParametersChanged(Vec<String>),
    NothingChanged,
}

impl PlanReason {
    pub fn runs(&self) -> bool {
        !matches!(
            self,
            PlanReason::SkipHtml | PlanReason::ForcedAnotherStep | PlanReason::NothingChanged
        )
    }
}

impl fmt::Display for PlanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanReason::SkipHtml => f.write_str("skipping html output"),
            PlanReason::Forced => f.write_str("forced"),
            PlanReason::ForcedAnotherStep => f.write_str("forced another step"),
            PlanReason::ForcedThisStep => f.write_str("forced this step"),
            PlanReason::NoPreviousTrace => f.write_str("no trace of previous run"),
            PlanReason::OutputMissing => f.write_str("previous data not found"),
            PlanReason::DependentStepsRerunning(steps) => {
                write!(f, "dependent steps re-running: {}", steps.join(", "))
            }
            PlanReason::ParametersChanged(keys) => {
                write!(f, "parameters changed: {}", keys.join(", "))
            }
            PlanReason::NothingChanged => f.write_str("nothing changed"),
        }
    }
}

/// Decide, for every catalog step, whether it runs in this invocation.
///
/// `status` carries the resolved step configs of this run; `previous` is the
/// last persisted status for the same output directory, if any; `output_dir`
/// is where step artifacts are expected.
pub fn compute_plan(
    catalog: &StepCatalog,
    status: &JobStatus,
    previous: Option<&JobStatus>,
    flags: &RunFlags,
    output_dir: &Path,
) -> Vec<PlanEntry> {
    let history: Vec<&CompletedJobRecord> = previous
        .map(|previous| previous.history().collect())
        .unwrap_or_default();
    let empty = StepParams::new();

    let mut plan: Vec<PlanEntry> = Vec::with_capacity(catalog.len());
    for spec in catalog.steps() {
        let current = status.steps.get(&spec.step).unwrap_or(&empty);
        let reason = decide(spec, current, &history, &plan, flags, output_dir);
        tracing::debug!(step = %spec.step, run = reason.runs(), %reason, "planned step");
        plan.push(PlanEntry {
            step: spec.step.clone(),
            run: reason.runs(),
            reason: reason.to_string(),
        });
    }
    plan
}

fn decide(
    spec: &StepSpec,
    current: &StepParams,
    history: &[&CompletedJobRecord],
    decided: &[PlanEntry],
    flags: &RunFlags,
    output_dir: &Path,
) -> PlanReason {
    if spec.html && flags.without_html {
        return PlanReason::SkipHtml;
    }
    if flags.force {
        return PlanReason::Forced;
    }
    match flags.only.as_deref() {
        Some(only) if only != spec.step => return PlanReason::ForcedAnotherStep,
        Some(_) => return PlanReason::ForcedThisStep,
        None => {}
    }
    let Some(previous) = history.iter().find(|record| record.step == spec.step) else {
        return PlanReason::NoPreviousTrace;
    };
    if !output_dir.join(&spec.filename).exists() {
        return PlanReason::OutputMissing;
    }
    let rerunning: Vec<String> = decided
        .iter()
        .filter(|entry| entry.run && spec.dependencies.steps.contains(&entry.step))
        .map(|entry| entry.step.clone())
        .collect();
    if !rerunning.is_empty() {
        return PlanReason::DependentStepsRerunning(rerunning);
    }
    let changed = changed_params(spec, &previous.params, current);
    if !changed.is_empty() {
        return PlanReason::ParametersChanged(changed);
    }
    PlanReason::NothingChanged
}

/// Tracked params whose value differs from the previous snapshot.
fn changed_params(spec: &StepSpec, previous: &StepParams, current: &StepParams) -> Vec<String> {
    spec.tracked_params()
        .into_iter()
        .filter(|key| {
            let before = previous.get(key).unwrap_or(&Value::Null);
            let after = current.get(key).unwrap_or(&Value::Null);
            if before != after {
                tracing::info!(
                    step = %spec.step,
                    param = %key,
                    from = %before,
                    to = %after,
                    "step parameter changed"
                );
                return true;
            }
            false
        })
        .collect()
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
