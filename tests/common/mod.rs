//! Shared test infrastructure for integration tests.
//!
//! A fixture is a throwaway pipeline directory whose catalog steps are small
//! shell commands: each one appends its name to `calls.log` and writes its
//! artifact, so tests can see which steps actually ran.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const STEP_COMMAND: &str =
    r#"sh -c 'cat > /dev/null; echo "$RPIPE_STEP" >> calls.log; printf data > "$RPIPE_ARTIFACT"'"#;

/// Pipeline directory with a five-step catalog, prompts and a job file.
pub struct PipelineFixture {
    pub dir: TempDir,
}

impl PipelineFixture {
    pub fn setup() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let fixture = Self { dir };
        fixture.write_json("hierarchical_specs.json", &catalog());
        fixture.write("prompts/extraction/default.txt", "Extract the arguments.");
        fixture.write("prompts/labelling/default.txt", "Label each cluster.");
        fixture.write("prompts/labelling/short.txt", "Label briefly.");
        fixture.write("steps/clustering.sh", "# kmeans v1\n");
        fixture.write_job(json!({}));
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn job_path(&self) -> PathBuf {
        self.root().join("jobs").join("r1.json")
    }

    pub fn status_path(&self) -> PathBuf {
        self.root()
            .join("outputs")
            .join("r1")
            .join("hierarchical_status.json")
    }

    /// Write `jobs/r1.json` with `sections` merged over the base job.
    pub fn write_job(&self, sections: Value) {
        let mut job = json!({"input": "r1", "question": "What did people say?"});
        if let (Some(job), Some(sections)) = (job.as_object_mut(), sections.as_object()) {
            job.extend(sections.clone());
        }
        self.write_json("jobs/r1.json", &job);
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(path, contents).expect("write fixture file");
    }

    fn write_json(&self, rel: &str, value: &Value) {
        self.write(rel, &serde_json::to_string_pretty(value).expect("fixture json"));
    }

    /// Steps run since the last call, in order.
    pub fn take_calls(&self) -> Vec<String> {
        let path = self.root().join("calls.log");
        let calls = std::fs::read_to_string(&path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect();
        let _ = std::fs::remove_file(path);
        calls
    }

    pub fn status(&self) -> Value {
        let text = std::fs::read_to_string(self.status_path()).expect("read status file");
        serde_json::from_str(&text).expect("parse status file")
    }

    /// Run `rpipe <subcommand> ... --pipeline-dir <root>`.
    pub fn rpipe(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_rpipe"))
            .args(args)
            .arg("--pipeline-dir")
            .arg(self.root())
            .env("RPIPE_LOG", "warn")
            .output()
            .expect("run rpipe")
    }

    pub fn run_job(&self, extra: &[&str]) -> Output {
        let job = self.job_path();
        let job = job.to_str().expect("utf-8 job path");
        let mut args = vec!["run", job, "--skip-interaction"];
        args.extend_from_slice(extra);
        self.rpipe(&args)
    }
}

/// History step names from a status document.
pub fn steps_of(status: &Value, key: &str) -> Vec<String> {
    status[key]
        .as_array()
        .map(|records| {
            records
                .iter()
                .filter_map(|record| record["step"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "rpipe failed: {}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn catalog() -> Value {
    json!([
        {
            "step": "extraction",
            "filename": "args.csv",
            "use_llm": true,
            "dependencies": {"params": ["limit"], "steps": []},
            "options": {"limit": 1000},
            "command": STEP_COMMAND
        },
        {
            "step": "embedding",
            "filename": "embeddings.pkl",
            "dependencies": {"params": ["model"], "steps": ["extraction"]},
            "options": {"model": "text-embedding-3-small"},
            "command": STEP_COMMAND
        },
        {
            "step": "clustering",
            "filename": "clusters.csv",
            "dependencies": {"params": ["cluster_nums", "source_code"], "steps": ["embedding"]},
            "options": {"cluster_nums": [3, 6]},
            "source": "steps/clustering.sh",
            "command": STEP_COMMAND
        },
        {
            "step": "labelling",
            "filename": "labels.csv",
            "use_llm": true,
            "dependencies": {"params": ["sampling_num"], "steps": ["clustering"]},
            "options": {"sampling_num": 3},
            "command": STEP_COMMAND
        },
        {
            "step": "visualization",
            "filename": "report.html",
            "html": true,
            "dependencies": {"params": [], "steps": ["labelling"]},
            "command": STEP_COMMAND
        }
    ])
}
