//! Typed failures for every orchestrator boundary.
//!
//! Callers branch on the variant (or on [`PipelineError::kind`]) instead of
//! inspecting messages. Step collaborators stay on `anyhow` and are wrapped
//! into [`PipelineError::Step`] by the runner.
use chrono::{DateTime, Utc};
use std::error::Error as _;
use std::path::PathBuf;
use thiserror::Error;

/// Problems with the job file or the step catalog, raised before any lock
/// is taken or directory created.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing required field '{0}' in config")]
    MissingField(&'static str),
    #[error("unknown field '{0}' in config")]
    UnknownField(String),
    #[error("config for step '{step}' must be a JSON object")]
    SectionNotObject { step: String },
    #[error("unknown option '{option}' for step '{step}' in config")]
    UnknownOption { step: String, option: String },
    #[error("duplicate step '{0}' in catalog")]
    DuplicateStep(String),
    #[error("step name '{0}' collides with a job or status field")]
    ReservedStepName(String),
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },
    #[error("step '{step}' depends on '{dependency}', which is not declared before it")]
    DependencyOrder { step: String, dependency: String },
    #[error("unknown step '{0}' requested with --only")]
    UnknownOnlyStep(String),
    #[error("read prompt for step '{step}' at {path}: {source}")]
    Prompt {
        step: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no collaborator registered for step '{0}'")]
    MissingCollaborator(String),
    #[error("step '{0}' has no plan entry")]
    UnplannedStep(String),
}

/// Error union returned by orchestrator operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("job already running in '{output_dir}' (locked until {lock_until}); try again later")]
    Concurrency {
        output_dir: String,
        lock_until: DateTime<Utc>,
    },
    #[error("step '{step}' failed: {error:#}")]
    Step { step: String, error: anyhow::Error },
    #[error("{action} {path}: {source}")]
    Persistence {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("status file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("run aborted before start: {0}")]
    Aborted(String),
}

impl PipelineError {
    /// Stable taxonomy name recorded in the status file.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "ValidationError",
            PipelineError::Concurrency { .. } => "ConcurrencyError",
            PipelineError::Step { .. } => "StepExecutionError",
            PipelineError::Persistence { .. } | PipelineError::Corrupt { .. } => {
                "PersistenceError"
            }
            PipelineError::Aborted(_) => "AbortedError",
        }
    }

    /// Full diagnostic for `error_stack_trace`: the cause chain, plus the
    /// captured backtrace for step failures when `RUST_BACKTRACE` is set.
    pub fn trace(&self) -> String {
        if let PipelineError::Step { step, error } = self {
            return format!("step '{step}' failed\n\n{error:?}");
        }
        let mut out = self.to_string();
        let mut cause = self.source();
        while let Some(err) = cause {
            out.push_str("\n\nCaused by:\n    ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        out
    }

    pub(crate) fn persistence(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        PipelineError::Persistence {
            action,
            path: path.into(),
            source,
        }
    }
}
