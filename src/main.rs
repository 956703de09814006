//! `rpipe` binary: run, plan and inspect report pipeline jobs.
use anyhow::{Context, Result};
use clap::Parser;
use report_pipeline::status::current_step;
use report_pipeline::{
    CommandStep, LeasePolicy, Pipeline, PipelinePaths, PriceTable, StdinConfirm, StepCatalog,
};

mod cli;

use cli::{Command, PipelineArgs, PlanArgs, RootArgs, RunArgs, StatusArgs};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Run(args) => run_job(args),
        Command::Plan(args) => plan_job(args),
        Command::Status(args) => show_status(args),
    }
}

/// Log to stderr; `RPIPE_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("RPIPE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_pipeline(args: &PipelineArgs) -> Result<Pipeline> {
    let paths = PipelinePaths::new(args.pipeline_dir.clone());
    let catalog_path = args
        .catalog
        .clone()
        .unwrap_or_else(|| paths.catalog_path());
    let catalog = StepCatalog::load(&catalog_path)
        .with_context(|| format!("load step catalog {}", catalog_path.display()))?;

    let commands: Vec<(String, String)> = catalog
        .steps()
        .iter()
        .filter_map(|spec| Some((spec.step.clone(), spec.command.clone()?)))
        .collect();
    let mut pipeline = Pipeline::new(paths, catalog);
    for (step, command) in commands {
        pipeline = pipeline.with_step(
            &step,
            CommandStep::new(command).in_dir(args.pipeline_dir.clone()),
        );
    }
    Ok(pipeline)
}

fn run_job(args: RunArgs) -> Result<()> {
    let mut pipeline =
        build_pipeline(&args.pipeline)?.with_lease(LeasePolicy::from_secs(args.lease_secs));
    if let Some(path) = &args.pricing {
        pipeline = pipeline.with_pricing(PriceTable::load(path)?);
    }
    let flags = args.flags.run_flags(args.skip_interaction);
    let status = pipeline.run(&args.job, &flags, &mut StdinConfirm)?;

    let ran = status.completed_jobs.len();
    let skipped = status.plan.len().saturating_sub(ran);
    println!(
        "{}: {ran} step(s) run, {skipped} skipped, {} tokens, estimated cost ${:.4}",
        status.output_dir, status.total_token_usage, status.estimated_cost
    );
    Ok(())
}

fn plan_job(args: PlanArgs) -> Result<()> {
    let pipeline = build_pipeline(&args.pipeline)?;
    let prepared = pipeline.prepare(&args.job, &args.flags.run_flags(true))?;
    let text = serde_json::to_string_pretty(prepared.plan()).context("serialize plan")?;
    println!("{text}");
    Ok(())
}

fn show_status(args: StatusArgs) -> Result<()> {
    let paths = PipelinePaths::new(args.pipeline_dir);
    let summary = current_step(&paths.status_path(&args.output_dir));
    if args.json {
        let text = serde_json::to_string_pretty(&summary).context("serialize status")?;
        println!("{text}");
        return Ok(());
    }
    println!("current step: {}", summary.current_step);
    println!(
        "tokens: {} (input {}, output {})",
        summary.token_usage, summary.token_usage_input, summary.token_usage_output
    );
    println!("estimated cost: ${:.4}", summary.estimated_cost);
    if let Some(error) = &summary.error {
        println!("error: {error}");
    }
    Ok(())
}
