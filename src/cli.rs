//! CLI argument parsing for the pipeline orchestrator.
//!
//! The CLI only wires paths and flags; planning and execution live in the
//! library so tests can drive them in-process.
use clap::{Args, Parser, Subcommand};
use report_pipeline::status::DEFAULT_LEASE_SECS;
use report_pipeline::RunFlags;
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "rpipe",
    version,
    about = "Incremental, resumable report pipeline runner",
    after_help = "Examples:\n  rpipe plan jobs/r1.json\n  rpipe run jobs/r1.json --skip-interaction\n  rpipe run jobs/r1.json --only clustering\n  rpipe status --output-dir r1 --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log at debug level (overridden by RPIPE_LOG)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Plan(PlanArgs),
    Status(StatusArgs),
}

/// Location of the pipeline directory and its step catalog.
#[derive(Args, Debug)]
pub struct PipelineArgs {
    /// Pipeline root holding the catalog, prompts/ and outputs/
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub pipeline_dir: PathBuf,

    /// Step catalog (defaults to <pipeline-dir>/hierarchical_specs.json)
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<PathBuf>,
}

/// Flags that change which steps the plan selects.
#[derive(Args, Debug)]
pub struct PlanFlagArgs {
    /// Re-run every step
    #[arg(short, long)]
    pub force: bool,

    /// Run only this step
    #[arg(short, long, value_name = "STEP")]
    pub only: Option<String>,

    /// Skip the HTML visualization step
    #[arg(long)]
    pub without_html: bool,
}

impl PlanFlagArgs {
    pub fn run_flags(&self, skip_interaction: bool) -> RunFlags {
        RunFlags {
            force: self.force,
            only: self.only.clone(),
            skip_interaction,
            without_html: self.without_html,
        }
    }
}

/// Run command inputs for one job file.
#[derive(Parser, Debug)]
#[command(about = "Plan and execute a job, resuming from its last status")]
pub struct RunArgs {
    /// Job file; its name (up to the first '.') names the output directory
    #[arg(value_name = "JOB")]
    pub job: PathBuf,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[command(flatten)]
    pub flags: PlanFlagArgs,

    /// Start without asking to confirm the plan
    #[arg(long)]
    pub skip_interaction: bool,

    /// Provider/model price list used to estimate cost
    #[arg(long, value_name = "PATH")]
    pub pricing: Option<PathBuf>,

    /// Lease length in seconds renewed on every status write
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = DEFAULT_LEASE_SECS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub lease_secs: u32,
}

/// Plan command inputs: compute the plan without running or writing anything.
#[derive(Parser, Debug)]
#[command(about = "Print the run/skip plan for a job as JSON")]
pub struct PlanArgs {
    /// Job file to plan
    #[arg(value_name = "JOB")]
    pub job: PathBuf,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[command(flatten)]
    pub flags: PlanFlagArgs,
}

/// Status command inputs for one output directory.
#[derive(Parser, Debug)]
#[command(about = "Show the current step and token usage of a job")]
pub struct StatusArgs {
    /// Output directory name under outputs/
    #[arg(long, value_name = "NAME")]
    pub output_dir: String,

    /// Pipeline root holding outputs/
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub pipeline_dir: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
