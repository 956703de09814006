use super::validate_job;
use crate::catalog::StepCatalog;
use crate::config::JobFile;
use crate::error::ConfigError;
use serde_json::json;

fn catalog() -> StepCatalog {
    let steps = serde_json::from_value(json!([
        {"step": "extraction", "filename": "args.csv", "use_llm": true, "options": {"workers": 1}},
        {"step": "clustering", "filename": "clusters.csv", "options": {"cluster_nums": [3, 6]}}
    ]))
    .expect("parse catalog");
    StepCatalog::new(steps).expect("valid catalog")
}

fn job(value: serde_json::Value) -> JobFile {
    serde_json::from_value(value).expect("parse job")
}

#[test]
fn accepts_globals_and_declared_options() {
    let job = job(json!({
        "input": "r1",
        "question": "Q",
        "model": "gpt-4o",
        "is_pubcom": true,
        "enable_source_link": false,
        "extraction": {"workers": 3, "prompt_file": "short", "model": "gpt-4o"},
        "clustering": {"cluster_nums": [2, 4]}
    }));
    validate_job(&job, &catalog()).expect("valid job");
}

#[test]
fn missing_input_or_question_fails() {
    let err = validate_job(&job(json!({"question": "Q"})), &catalog()).expect_err("no input");
    assert!(matches!(err, ConfigError::MissingField("input")));

    let err = validate_job(&job(json!({"input": "r1"})), &catalog()).expect_err("no question");
    assert!(matches!(err, ConfigError::MissingField("question")));
}

#[test]
fn unknown_top_level_key_fails() {
    let err = validate_job(
        &job(json!({"input": "r1", "question": "Q", "colour": "red"})),
        &catalog(),
    )
    .expect_err("unknown key");
    assert!(matches!(err, ConfigError::UnknownField(key) if key == "colour"));
}

#[test]
fn unknown_step_option_fails() {
    let err = validate_job(
        &job(json!({"input": "r1", "question": "Q", "clustering": {"prompt": "x"}})),
        &catalog(),
    )
    .expect_err("prompt not allowed on non-llm step");
    assert!(matches!(
        err,
        ConfigError::UnknownOption { step, option } if step == "clustering" && option == "prompt"
    ));
}

#[test]
fn non_object_step_section_fails() {
    let err = validate_job(
        &job(json!({"input": "r1", "question": "Q", "extraction": 3})),
        &catalog(),
    )
    .expect_err("scalar section");
    assert!(matches!(err, ConfigError::SectionNotObject { .. }));
}
