//! Step catalog: the static, ordered list of pipeline steps.
//!
//! Declaration order doubles as execution order, so the catalog is rejected at
//! load time unless every step is declared after all of its upstream steps.
use crate::error::ConfigError;
use crate::status::STATUS_KEYS;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Options every LLM step accepts on top of its declared ones.
pub const LLM_OPTIONS: [&str; 3] = ["prompt", "model", "prompt_file"];

/// Params implicitly tracked for LLM steps when deciding whether to re-run.
pub const LLM_TRACKED_PARAMS: [&str; 2] = ["prompt", "model"];

/// Inputs a step reads: config keys and upstream steps.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StepDependencies {
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// One entry of the step catalog.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    pub step: String,
    /// Output artifact, relative to the job's output directory.
    pub filename: String,
    #[serde(default)]
    pub dependencies: StepDependencies,
    #[serde(default)]
    pub use_llm: bool,
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Step implementation snapshotted into the step config as `source_code`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Marks the visualization step suppressed by `--without-html`.
    #[serde(default)]
    pub html: bool,
    /// Command line for the external collaborator used by the CLI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl StepSpec {
    /// Config keys compared against the previous run's snapshot.
    pub fn tracked_params(&self) -> Vec<String> {
        let mut keys = self.dependencies.params.clone();
        if self.use_llm {
            for key in LLM_TRACKED_PARAMS {
                if !keys.iter().any(|existing| existing == key) {
                    keys.push(key.to_string());
                }
            }
        }
        keys
    }

    /// Whether `option` may appear in this step's job-file section.
    pub fn accepts_option(&self, option: &str) -> bool {
        self.options.contains_key(option) || (self.use_llm && LLM_OPTIONS.contains(&option))
    }
}

/// Validated, ordered step catalog.
#[derive(Debug, Clone)]
pub struct StepCatalog {
    steps: Vec<StepSpec>,
}

impl StepCatalog {
    /// Build a catalog, checking names are unique, free of status keys and
    /// that upstream steps come first.
    pub fn new(steps: Vec<StepSpec>) -> Result<Self, ConfigError> {
        let all: BTreeSet<&str> = steps.iter().map(|spec| spec.step.as_str()).collect();
        let mut seen = BTreeSet::new();
        for spec in &steps {
            if STATUS_KEYS.contains(&spec.step.as_str()) {
                return Err(ConfigError::ReservedStepName(spec.step.clone()));
            }
            for dependency in &spec.dependencies.steps {
                if !all.contains(dependency.as_str()) {
                    return Err(ConfigError::UnknownDependency {
                        step: spec.step.clone(),
                        dependency: dependency.clone(),
                    });
                }
                if !seen.contains(dependency.as_str()) {
                    return Err(ConfigError::DependencyOrder {
                        step: spec.step.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
            if !seen.insert(spec.step.as_str()) {
                return Err(ConfigError::DuplicateStep(spec.step.clone()));
            }
        }
        Ok(Self { steps })
    }

    /// Load the catalog from a JSON array of step specs.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let steps: Vec<StepSpec> =
            serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(steps)
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    pub fn get(&self, name: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|spec| spec.step == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
