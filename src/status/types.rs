//! JSON schema of the per-job status file.
//!
//! The status file is the full job state: validated settings, resolved
//! per-step configs, the plan, progress, history and token counters.
use crate::config::JobSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Resolved config of one step (options, prompt, model, source snapshot).
pub type StepParams = Map<String, Value>;

/// Lifecycle of a run as recorded in the status file.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Error,
}

impl RunStatus {
    /// Return the stable string identifier used in JSON artifacts.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One run/skip decision.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub step: String,
    pub run: bool,
    pub reason: String,
}

/// Receipt of one executed step.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CompletedJobRecord {
    pub step: String,
    pub completed: DateTime<Utc>,
    /// Wall-clock seconds between start and completion.
    pub duration: f64,
    pub params: StepParams,
    pub token_usage: u64,
}

/// Top-level keys the status file uses for job settings and run state.
/// Step configs share the same object, so no step may take one of these names.
pub const STATUS_KEYS: [&str; 28] = [
    "input",
    "question",
    "model",
    "name",
    "intro",
    "is_pubcom",
    "is_embedded_at_local",
    "provider",
    "local_llm_address",
    "enable_source_link",
    "output_dir",
    "plan",
    "status",
    "start_time",
    "end_time",
    "lock_until",
    "current_job",
    "current_job_started",
    "current_job_progress",
    "current_jop_tasks",
    "completed_jobs",
    "previously_completed_jobs",
    "total_token_usage",
    "token_usage_input",
    "token_usage_output",
    "estimated_cost",
    "error",
    "error_stack_trace",
];

/// Full mutable state of one job, persisted after every state change.
///
/// `None` fields are omitted from the file, so clearing a field removes the key.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JobStatus {
    #[serde(flatten)]
    pub settings: JobSettings,
    pub output_dir: String,
    #[serde(default)]
    pub plan: Vec<PlanEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_job: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_job_started: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_job_progress: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_jop_tasks: Option<u64>,
    #[serde(default)]
    pub completed_jobs: Vec<CompletedJobRecord>,
    #[serde(default)]
    pub previously_completed_jobs: Vec<CompletedJobRecord>,
    #[serde(default)]
    pub total_token_usage: u64,
    #[serde(default)]
    pub token_usage_input: u64,
    #[serde(default)]
    pub token_usage_output: u64,
    #[serde(default)]
    pub estimated_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stack_trace: Option<String>,
    /// Per-step configs, stored at the top level under each step's name.
    #[serde(flatten)]
    pub steps: BTreeMap<String, StepParams>,
    /// Prior run's status, kept in memory for planning and compaction only.
    #[serde(skip)]
    pub previous: Option<Box<JobStatus>>,
}

impl JobStatus {
    /// Fresh state for a job that has not started yet.
    pub fn new(
        settings: JobSettings,
        output_dir: String,
        steps: BTreeMap<String, StepParams>,
    ) -> Self {
        Self {
            settings,
            output_dir,
            plan: Vec::new(),
            status: None,
            start_time: None,
            end_time: None,
            lock_until: None,
            current_job: None,
            current_job_started: None,
            current_job_progress: None,
            current_jop_tasks: None,
            completed_jobs: Vec::new(),
            previously_completed_jobs: Vec::new(),
            total_token_usage: 0,
            token_usage_input: 0,
            token_usage_output: 0,
            estimated_cost: 0.0,
            error: None,
            error_stack_trace: None,
            steps,
            previous: None,
        }
    }

    /// Plan entry for `step`, if planned.
    pub fn plan_entry(&self, step: &str) -> Option<&PlanEntry> {
        self.plan.iter().find(|entry| entry.step == step)
    }

    /// Completed-step receipts of this run followed by older history.
    pub fn history(&self) -> impl Iterator<Item = &CompletedJobRecord> {
        self.completed_jobs
            .iter()
            .chain(self.previously_completed_jobs.iter())
    }
}
