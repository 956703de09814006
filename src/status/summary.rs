//! Read-only progress view of a status file, as served to report dashboards.
//!
//! Unlike resumption, this view never fails: a missing or unreadable status
//! file reports `current_step = "error"` with zeroed counters.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct StatusProbe {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    current_job: Option<String>,
    #[serde(default)]
    total_token_usage: u64,
    #[serde(default)]
    token_usage_input: u64,
    #[serde(default)]
    token_usage_output: u64,
    #[serde(default)]
    estimated_cost: f64,
    #[serde(default)]
    error: Option<String>,
}

/// Current step and token usage of one job.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CurrentStep {
    pub current_step: String,
    pub token_usage: u64,
    pub token_usage_input: u64,
    pub token_usage_output: u64,
    pub estimated_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CurrentStep {
    fn unavailable(error: String) -> Self {
        Self {
            current_step: "error".to_string(),
            token_usage: 0,
            token_usage_input: 0,
            token_usage_output: 0,
            estimated_cost: 0.0,
            error: Some(error),
        }
    }
}

/// Summarize the status file at `path`.
pub fn current_step(path: &Path) -> CurrentStep {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "status file unavailable");
            return CurrentStep::unavailable(format!("read {}: {err}", path.display()));
        }
    };
    let probe: StatusProbe = match serde_json::from_slice(&bytes) {
        Ok(probe) => probe,
        Err(err) => {
            return CurrentStep::unavailable(format!("parse {}: {err}", path.display()));
        }
    };
    let current_step = match probe.status.as_deref() {
        Some("error") => "error".to_string(),
        Some("completed") => "completed".to_string(),
        _ => probe.current_job.unwrap_or_else(|| "loading".to_string()),
    };
    CurrentStep {
        current_step,
        token_usage: probe.total_token_usage,
        token_usage_input: probe.token_usage_input,
        token_usage_output: probe.token_usage_output,
        estimated_cost: probe.estimated_cost,
        error: probe.error,
    }
}
