//! Builders shared by unit tests.
use crate::catalog::StepCatalog;
use crate::config::JobSettings;
use crate::status::{CompletedJobRecord, JobStatus, StepParams};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// extraction -> embedding -> clustering -> labelling -> visualization.
pub(crate) fn catalog() -> StepCatalog {
    let steps = serde_json::from_value(json!([
        {
            "step": "extraction",
            "filename": "args.csv",
            "use_llm": true,
            "dependencies": {"params": ["limit"], "steps": []},
            "options": {"limit": 1000}
        },
        {
            "step": "embedding",
            "filename": "embeddings.pkl",
            "dependencies": {"params": ["model"], "steps": ["extraction"]},
            "options": {"model": "text-embedding-3-small"}
        },
        {
            "step": "clustering",
            "filename": "clusters.csv",
            "dependencies": {"params": ["cluster_nums"], "steps": ["embedding"]},
            "options": {"cluster_nums": [3, 6]}
        },
        {
            "step": "labelling",
            "filename": "labels.csv",
            "use_llm": true,
            "dependencies": {"params": ["sampling_num"], "steps": ["clustering"]},
            "options": {"sampling_num": 3}
        },
        {
            "step": "visualization",
            "filename": "report.html",
            "html": true,
            "dependencies": {"params": [], "steps": ["labelling"]}
        }
    ]))
    .expect("parse test catalog");
    StepCatalog::new(steps).expect("valid test catalog")
}

pub(crate) fn settings() -> JobSettings {
    JobSettings {
        input: "r1".to_string(),
        question: "Q".to_string(),
        model: "gpt-4o-mini".to_string(),
        name: None,
        intro: None,
        is_pubcom: None,
        is_embedded_at_local: None,
        provider: None,
        local_llm_address: None,
        enable_source_link: None,
    }
}

/// Step configs as initialization would resolve them for [`catalog`].
pub(crate) fn step_params(catalog: &StepCatalog) -> BTreeMap<String, StepParams> {
    catalog
        .steps()
        .iter()
        .map(|spec| {
            let mut params = spec.options.clone();
            if spec.use_llm {
                params.insert("prompt".to_string(), json!(format!("prompt for {}", spec.step)));
                params.insert("model".to_string(), json!("gpt-4o-mini"));
            }
            (spec.step.clone(), params)
        })
        .collect()
}

pub(crate) fn status(catalog: &StepCatalog, output_dir: &str) -> JobStatus {
    JobStatus::new(settings(), output_dir.to_string(), step_params(catalog))
}

pub(crate) fn record(step: &str, params: &StepParams) -> CompletedJobRecord {
    CompletedJobRecord {
        step: step.to_string(),
        completed: Utc::now(),
        duration: 1.5,
        params: params.clone(),
        token_usage: 0,
    }
}

/// A previous status in which every step completed with the current params.
pub(crate) fn completed_previous(catalog: &StepCatalog, output_dir: &str) -> JobStatus {
    let mut previous = status(catalog, output_dir);
    previous.status = Some(crate::status::RunStatus::Completed);
    previous.completed_jobs = catalog
        .steps()
        .iter()
        .map(|spec| record(&spec.step, &previous.steps[&spec.step]))
        .collect();
    previous
}

pub(crate) fn set_param(status: &mut JobStatus, step: &str, key: &str, value: Value) {
    status
        .steps
        .get_mut(step)
        .expect("step params")
        .insert(key.to_string(), value);
}

/// Create every catalog artifact inside `dir`.
pub(crate) fn touch_outputs(catalog: &StepCatalog, dir: &std::path::Path) {
    std::fs::create_dir_all(dir).expect("create output dir");
    for spec in catalog.steps() {
        std::fs::write(dir.join(&spec.filename), b"data").expect("write artifact");
    }
}

/// Pin a closure to the higher-ranked signature `Step` expects.
pub(crate) fn step_fn<F>(f: F) -> F
where
    F: Fn(&mut crate::runner::StepContext<'_>) -> anyhow::Result<()>,
{
    f
}
