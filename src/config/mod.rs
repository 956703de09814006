//! Job configuration: the typed job file, its validation against the step
//! catalog, and resolution of each step's effective config.
mod job;
mod resolve;
mod validate;

pub use job::{output_dir_name, JobFile, JobSettings, DEFAULT_MODEL};
pub use resolve::{resolve_step_params, DEFAULT_PROMPT_FILE};
pub use validate::validate_job;
