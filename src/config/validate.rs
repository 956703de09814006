//! Job file validation against the step catalog.
//!
//! Runs once, before any output directory is created or any lock is taken.
use super::job::JobFile;
use crate::catalog::StepCatalog;
use crate::error::ConfigError;

/// Reject missing required fields, unknown top-level keys and unknown step options.
pub fn validate_job(job: &JobFile, catalog: &StepCatalog) -> Result<(), ConfigError> {
    if job.input.is_none() {
        return Err(ConfigError::MissingField("input"));
    }
    if job.question.is_none() {
        return Err(ConfigError::MissingField("question"));
    }
    for (key, section) in &job.sections {
        let Some(spec) = catalog.get(key) else {
            return Err(ConfigError::UnknownField(key.clone()));
        };
        let options = section
            .as_object()
            .ok_or_else(|| ConfigError::SectionNotObject { step: key.clone() })?;
        if let Some(option) = options.keys().find(|option| !spec.accepts_option(option)) {
            return Err(ConfigError::UnknownOption {
                step: spec.step.clone(),
                option: option.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
