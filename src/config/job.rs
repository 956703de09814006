//! Job file and validated job settings.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Model used when the job file names none.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Raw job file as written by the user.
///
/// Every key that is not a global field lands in `sections`, where validation
/// checks it against the step catalog.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JobFile {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub intro: Option<String>,
    #[serde(default)]
    pub is_pubcom: Option<bool>,
    #[serde(default)]
    pub is_embedded_at_local: Option<bool>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub local_llm_address: Option<String>,
    #[serde(default)]
    pub enable_source_link: Option<bool>,
    #[serde(flatten)]
    pub sections: BTreeMap<String, Value>,
}

impl JobFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Global job fields after validation and defaulting.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JobSettings {
    pub input: String,
    pub question: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pubcom: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_embedded_at_local: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_llm_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_source_link: Option<bool>,
}

impl JobSettings {
    /// Extract settings from a job file, defaulting the model.
    pub fn from_job(job: &JobFile) -> Result<Self, ConfigError> {
        Ok(Self {
            input: job
                .input
                .clone()
                .ok_or(ConfigError::MissingField("input"))?,
            question: job
                .question
                .clone()
                .ok_or(ConfigError::MissingField("question"))?,
            model: job
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            name: job.name.clone(),
            intro: job.intro.clone(),
            is_pubcom: job.is_pubcom,
            is_embedded_at_local: job.is_embedded_at_local,
            provider: job.provider.clone(),
            local_llm_address: job.local_llm_address.clone(),
            enable_source_link: job.enable_source_link,
        })
    }
}

/// Output directory name for a job file: its file name up to the first dot.
pub fn output_dir_name(job_file: &Path) -> String {
    job_file
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .and_then(|name| name.split('.').next().map(str::to_string))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "job".to_string())
}
