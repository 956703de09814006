//! Typed paths into a pipeline directory layout.
//!
//! Centralizing path construction keeps the runner, the planner and the
//! status store pointed at the same files.
use std::path::{Path, PathBuf};

/// File name of the per-job status document.
pub const STATUS_FILE_NAME: &str = "hierarchical_status.json";

/// Convenience wrapper for locating pipeline inputs and job outputs.
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    root: PathBuf,
}

impl PipelinePaths {
    /// Create a new path helper rooted at the pipeline directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Return the pipeline root used for path derivation.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the default `hierarchical_specs.json` catalog path.
    pub fn catalog_path(&self) -> PathBuf {
        self.root.join("hierarchical_specs.json")
    }

    /// Return the `outputs/` directory path.
    pub fn outputs_root(&self) -> PathBuf {
        self.root.join("outputs")
    }

    /// Return the `outputs/<output_dir>/` directory for one job.
    pub fn output_dir(&self, output_dir: &str) -> PathBuf {
        self.outputs_root().join(output_dir)
    }

    /// Return the status file for one job.
    pub fn status_path(&self, output_dir: &str) -> PathBuf {
        self.output_dir(output_dir).join(STATUS_FILE_NAME)
    }

    /// Return the `prompts/<step>/<name>.txt` path.
    pub fn prompt_path(&self, step: &str, name: &str) -> PathBuf {
        self.root
            .join("prompts")
            .join(step)
            .join(format!("{name}.txt"))
    }

    /// Resolve a catalog-relative path such as a step's `source`.
    pub fn resolve(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }
}
