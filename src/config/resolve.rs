//! Per-step config resolution.
//!
//! Each step's section is completed with catalog defaults, a snapshot of the
//! step implementation and, for LLM steps, the prompt text and model.
use super::job::{JobFile, JobSettings};
use crate::catalog::{StepCatalog, StepSpec};
use crate::error::ConfigError;
use crate::status::{PipelinePaths, StepParams};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;

/// Prompt file used when a step names none.
pub const DEFAULT_PROMPT_FILE: &str = "default";

/// Resolve the config of every catalog step.
pub fn resolve_step_params(
    catalog: &StepCatalog,
    job: &JobFile,
    settings: &JobSettings,
    paths: &PipelinePaths,
) -> Result<BTreeMap<String, StepParams>, ConfigError> {
    let mut steps = BTreeMap::new();
    for spec in catalog.steps() {
        let section = job.sections.get(&spec.step);
        let params = resolve_one(spec, section, settings, paths)?;
        steps.insert(spec.step.clone(), params);
    }
    Ok(steps)
}

fn resolve_one(
    spec: &StepSpec,
    section: Option<&Value>,
    settings: &JobSettings,
    paths: &PipelinePaths,
) -> Result<StepParams, ConfigError> {
    let mut params = match section {
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            return Err(ConfigError::SectionNotObject {
                step: spec.step.clone(),
            })
        }
        None => StepParams::new(),
    };
    for (key, value) in &spec.options {
        params.entry(key.clone()).or_insert_with(|| value.clone());
    }
    if let Some(source) = spec.source.as_deref() {
        let path = paths.resolve(source);
        match fs::read_to_string(&path) {
            Ok(code) => {
                params.insert("source_code".to_string(), Value::String(code));
            }
            Err(err) => {
                tracing::warn!(
                    step = %spec.step,
                    path = %path.display(),
                    %err,
                    "could not snapshot step source code"
                );
            }
        }
    }
    if spec.use_llm {
        if !params.contains_key("prompt") {
            let file = params
                .get("prompt_file")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_PROMPT_FILE)
                .to_string();
            let path = paths.prompt_path(&spec.step, &file);
            let prompt = fs::read_to_string(&path).map_err(|source| ConfigError::Prompt {
                step: spec.step.clone(),
                path: path.clone(),
                source,
            })?;
            params.insert("prompt".to_string(), Value::String(prompt));
        }
        if !params.contains_key("model") {
            params.insert("model".to_string(), Value::String(settings.model.clone()));
        }
    }
    Ok(params)
}
