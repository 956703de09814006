//! Steps backed by an external command.
//!
//! The command gets a JSON request on stdin and may answer with a JSON
//! object on stdout carrying updated params and token usage. Step identity
//! and artifact location are also exported as environment variables.
use crate::config::JobSettings;
use crate::runner::{Step, StepContext};
use crate::status::StepParams;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, Command, Stdio};
use std::time::Instant;

/// Request written to the command's stdin.
#[derive(Debug, Serialize)]
struct CommandRequest<'a> {
    step: &'a str,
    output_dir: &'a Path,
    artifact: PathBuf,
    settings: &'a JobSettings,
    params: &'a StepParams,
}

/// Optional answer read from the command's stdout.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandResponse {
    #[serde(default)]
    params: Option<StepParams>,
    #[serde(default)]
    token_usage_input: u64,
    #[serde(default)]
    token_usage_output: u64,
}

/// Runs a shell-style command line for one step.
#[derive(Debug, Clone)]
pub struct CommandStep {
    command: String,
    working_dir: Option<PathBuf>,
}

impl CommandStep {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
        }
    }

    /// Run the command from `dir` instead of the current directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Step for CommandStep {
    fn run(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let args = shell_words::split(&self.command)
            .with_context(|| format!("parse step command: {}", self.command))?;
        let Some((program, rest)) = args.split_first() else {
            return Err(anyhow!("step command is empty"));
        };

        let artifact = ctx.artifact_path();
        let request = serde_json::to_vec(&CommandRequest {
            step: ctx.step(),
            output_dir: ctx.output_dir(),
            artifact: artifact.clone(),
            settings: ctx.settings(),
            params: ctx.params(),
        })
        .context("serialize step request")?;

        let mut command = Command::new(program);
        command
            .args(rest)
            .env("RPIPE_STEP", ctx.step())
            .env("RPIPE_OUTPUT_DIR", ctx.output_dir())
            .env("RPIPE_ARTIFACT", &artifact)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let start = Instant::now();
        let mut child = command
            .spawn()
            .with_context(|| format!("spawn step command: {program}"))?;
        // Feed stdin from its own thread so a command that answers before
        // reading its whole request cannot fill stdout and deadlock us.
        let stdin = child.stdin.take();
        let (output, written) = std::thread::scope(|scope| {
            let writer = scope.spawn(|| write_request(stdin, &request));
            let output = child.wait_with_output();
            (output, writer.join())
        });
        let output = output.context("wait for step command")?;
        written
            .map_err(|_| anyhow!("step stdin writer panicked"))?
            .context("write request to step stdin")?;
        tracing::info!(
            step = %ctx.step(),
            elapsed_ms = start.elapsed().as_millis(),
            response_bytes = output.stdout.len(),
            "step command finished"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "step command failed with status {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        let response = parse_response(&output.stdout)?;
        if let Some(params) = response.params {
            ctx.params_mut().extend(params);
        }
        ctx.record_usage(response.token_usage_input, response.token_usage_output);
        Ok(())
    }
}

/// Write the request and close the pipe. A command that exits without
/// reading it is judged by its exit status alone.
fn write_request(stdin: Option<ChildStdin>, request: &[u8]) -> io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    match stdin.write_all(request) {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
            tracing::debug!(bytes = request.len(), "step command closed stdin early");
            Ok(())
        }
        result => result,
    }
}

fn parse_response(stdout: &[u8]) -> Result<CommandResponse> {
    let text = std::str::from_utf8(stdout).context("decode step stdout as UTF-8")?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(CommandResponse::default());
    }
    serde_json::from_str(text).with_context(|| {
        let head: String = text.chars().take(200).collect();
        format!("parse step response as JSON (first 200 chars: {head})")
    })
}
