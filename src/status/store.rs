//! Durable status persistence and the lease lock.
//!
//! `StatusStore::update` is the only mutation path for persisted state: every
//! call renews the lease and rewrites the whole status file, so any observable
//! transition doubles as a heartbeat for the running job.
use super::paths::PipelinePaths;
use super::types::{JobStatus, RunStatus};
use crate::error::PipelineError;
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default lease length.
pub const DEFAULT_LEASE_SECS: u32 = 5 * 60;

/// How long a status write keeps `output_dir` owned by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeasePolicy {
    duration: Duration,
}

impl LeasePolicy {
    /// Unsigned 32-bit seconds keep every deadline within chrono's range.
    pub fn from_secs(secs: u32) -> Self {
        Self {
            duration: Duration::seconds(i64::from(secs)),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Lease deadline for a write happening at `now`.
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.duration
    }
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self::from_secs(DEFAULT_LEASE_SECS)
    }
}

/// What an existing status file means for a new run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeState {
    /// No status file: first run against this output directory.
    Fresh,
    /// A previous run completed or failed cleanly.
    Resumable(RunStatus),
    /// A previous run was still marked running but its lease has elapsed.
    CrashRecovered { lock_until: Option<DateTime<Utc>> },
}

/// Decide whether a new run may start given the previous status.
pub fn check_lease(
    previous: Option<&JobStatus>,
    now: DateTime<Utc>,
) -> Result<ResumeState, PipelineError> {
    let Some(previous) = previous else {
        return Ok(ResumeState::Fresh);
    };
    match previous.status {
        Some(RunStatus::Running) => match previous.lock_until {
            Some(lock_until) if lock_until > now => Err(PipelineError::Concurrency {
                output_dir: previous.output_dir.clone(),
                lock_until,
            }),
            lock_until => {
                tracing::warn!(
                    output_dir = %previous.output_dir,
                    lock_until = ?lock_until,
                    "previous run crashed (lease expired); proceeding"
                );
                Ok(ResumeState::CrashRecovered { lock_until })
            }
        },
        Some(status) => Ok(ResumeState::Resumable(status)),
        None => Ok(ResumeState::Resumable(RunStatus::Completed)),
    }
}

/// Status file for one output directory.
#[derive(Debug, Clone)]
pub struct StatusStore {
    path: PathBuf,
    lease: LeasePolicy,
}

impl StatusStore {
    pub fn new(paths: &PipelinePaths, output_dir: &str, lease: LeasePolicy) -> Self {
        Self {
            path: paths.status_path(output_dir),
            lease,
        }
    }

    /// Store backed by an explicit file path.
    pub fn at(path: PathBuf, lease: LeasePolicy) -> Self {
        Self { path, lease }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lease(&self) -> LeasePolicy {
        self.lease
    }

    /// Load the status file; a missing file is `None`, anything unreadable is fatal.
    pub fn load(&self) -> Result<Option<JobStatus>, PipelineError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)
            .map_err(|source| PipelineError::persistence("read status", &self.path, source))?;
        let status = serde_json::from_slice(&bytes).map_err(|source| PipelineError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(status))
    }

    /// Apply `apply` to the in-memory status, renew the lease and persist.
    pub fn update<F>(&self, status: &mut JobStatus, apply: F) -> Result<(), PipelineError>
    where
        F: FnOnce(&mut JobStatus),
    {
        apply(status);
        status.lock_until = Some(self.lease.expires_at(Utc::now()));
        self.write(status)
    }

    /// Renew the lease without any other change.
    pub fn renew(&self, status: &mut JobStatus) -> Result<(), PipelineError> {
        self.update(status, |_| {})
    }

    /// Replace the status file atomically (temp file in the same directory, then rename).
    fn write(&self, status: &JobStatus) -> Result<(), PipelineError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)
            .map_err(|source| PipelineError::persistence("create", dir, source))?;
        let text = serde_json::to_string_pretty(status).map_err(|source| {
            PipelineError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|source| PipelineError::persistence("create temp for", &self.path, source))?;
        tmp.write_all(text.as_bytes())
            .map_err(|source| PipelineError::persistence("write", &self.path, source))?;
        tmp.persist(&self.path)
            .map_err(|err| PipelineError::persistence("replace", &self.path, err.error))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
