use super::{compute_plan, RunFlags};
use crate::status::PlanEntry;
use crate::test_support::{catalog, completed_previous, set_param, status, touch_outputs};
use serde_json::json;

fn reasons(plan: &[PlanEntry]) -> Vec<(&str, bool, &str)> {
    plan.iter()
        .map(|entry| (entry.step.as_str(), entry.run, entry.reason.as_str()))
        .collect()
}

#[test]
fn first_run_runs_everything_without_trace() {
    let catalog = catalog();
    let dir = tempfile::tempdir().expect("tempdir");
    let current = status(&catalog, "r1");

    let plan = compute_plan(&catalog, &current, None, &RunFlags::default(), dir.path());

    assert_eq!(plan.len(), catalog.len());
    for entry in &plan {
        assert!(entry.run, "{} should run", entry.step);
        assert_eq!(entry.reason, "no trace of previous run");
    }
}

#[test]
fn unchanged_rerun_skips_everything() {
    let catalog = catalog();
    let dir = tempfile::tempdir().expect("tempdir");
    touch_outputs(&catalog, dir.path());
    let previous = completed_previous(&catalog, "r1");
    let current = status(&catalog, "r1");

    let plan = compute_plan(
        &catalog,
        &current,
        Some(&previous),
        &RunFlags::default(),
        dir.path(),
    );

    for entry in &plan {
        assert!(!entry.run, "{} should be skipped", entry.step);
        assert_eq!(entry.reason, "nothing changed");
    }
}

#[test]
fn force_runs_everything_except_suppressed_html() {
    let catalog = catalog();
    let dir = tempfile::tempdir().expect("tempdir");
    touch_outputs(&catalog, dir.path());
    let previous = completed_previous(&catalog, "r1");
    let current = status(&catalog, "r1");
    let flags = RunFlags {
        force: true,
        without_html: true,
        ..RunFlags::default()
    };

    let plan = compute_plan(&catalog, &current, Some(&previous), &flags, dir.path());

    assert_eq!(
        reasons(&plan),
        vec![
            ("extraction", true, "forced"),
            ("embedding", true, "forced"),
            ("clustering", true, "forced"),
            ("labelling", true, "forced"),
            ("visualization", false, "skipping html output"),
        ]
    );
}

#[test]
fn only_flag_runs_the_named_step() {
    let catalog = catalog();
    let dir = tempfile::tempdir().expect("tempdir");
    let current = status(&catalog, "r1");
    let flags = RunFlags {
        only: Some("clustering".to_string()),
        ..RunFlags::default()
    };

    let plan = compute_plan(&catalog, &current, None, &flags, dir.path());

    for entry in &plan {
        if entry.step == "clustering" {
            assert!(entry.run);
            assert_eq!(entry.reason, "forced this step");
        } else {
            assert!(!entry.run);
            assert_eq!(entry.reason, "forced another step");
        }
    }
}

#[test]
fn changed_param_propagates_to_downstream_steps() {
    let catalog = catalog();
    let dir = tempfile::tempdir().expect("tempdir");
    touch_outputs(&catalog, dir.path());
    let previous = completed_previous(&catalog, "r1");
    let mut current = status(&catalog, "r1");
    set_param(&mut current, "clustering", "cluster_nums", json!([5, 10]));

    let plan = compute_plan(
        &catalog,
        &current,
        Some(&previous),
        &RunFlags::default(),
        dir.path(),
    );

    assert_eq!(
        reasons(&plan),
        vec![
            ("extraction", false, "nothing changed"),
            ("embedding", false, "nothing changed"),
            ("clustering", true, "parameters changed: cluster_nums"),
            ("labelling", true, "dependent steps re-running: clustering"),
            ("visualization", true, "dependent steps re-running: labelling"),
        ]
    );
}

#[test]
fn llm_steps_track_prompt_and_model_implicitly() {
    let catalog = catalog();
    let dir = tempfile::tempdir().expect("tempdir");
    touch_outputs(&catalog, dir.path());
    let previous = completed_previous(&catalog, "r1");
    let mut current = status(&catalog, "r1");
    set_param(&mut current, "labelling", "prompt", json!("new prompt"));
    set_param(&mut current, "labelling", "model", json!("gpt-4o"));

    let plan = compute_plan(
        &catalog,
        &current,
        Some(&previous),
        &RunFlags::default(),
        dir.path(),
    );

    let labelling = plan
        .iter()
        .find(|entry| entry.step == "labelling")
        .expect("labelling entry");
    assert!(labelling.run);
    assert_eq!(labelling.reason, "parameters changed: prompt, model");
}

#[test]
fn untracked_param_change_is_ignored() {
    let catalog = catalog();
    let dir = tempfile::tempdir().expect("tempdir");
    touch_outputs(&catalog, dir.path());
    let previous = completed_previous(&catalog, "r1");
    let mut current = status(&catalog, "r1");
    set_param(&mut current, "embedding", "batch_size", json!(64));

    let plan = compute_plan(
        &catalog,
        &current,
        Some(&previous),
        &RunFlags::default(),
        dir.path(),
    );
    assert!(plan.iter().all(|entry| !entry.run));
}

#[test]
fn missing_artifact_reruns_step_and_dependents() {
    let catalog = catalog();
    let dir = tempfile::tempdir().expect("tempdir");
    touch_outputs(&catalog, dir.path());
    std::fs::remove_file(dir.path().join("embeddings.pkl")).expect("remove artifact");
    let previous = completed_previous(&catalog, "r1");
    let current = status(&catalog, "r1");

    let plan = compute_plan(
        &catalog,
        &current,
        Some(&previous),
        &RunFlags::default(),
        dir.path(),
    );

    assert_eq!(plan[0].reason, "nothing changed");
    assert_eq!(plan[1].reason, "previous data not found");
    assert_eq!(plan[2].reason, "dependent steps re-running: embedding");
}

#[test]
fn history_from_older_runs_counts_as_trace() {
    let catalog = catalog();
    let dir = tempfile::tempdir().expect("tempdir");
    touch_outputs(&catalog, dir.path());
    let mut previous = completed_previous(&catalog, "r1");
    // Last run only re-ran labelling; the rest is compacted history.
    let labelling = previous.completed_jobs.remove(3);
    previous.previously_completed_jobs = std::mem::take(&mut previous.completed_jobs);
    previous.completed_jobs = vec![labelling];
    let current = status(&catalog, "r1");

    let plan = compute_plan(
        &catalog,
        &current,
        Some(&previous),
        &RunFlags::default(),
        dir.path(),
    );
    assert!(plan.iter().all(|entry| entry.reason == "nothing changed"));
}
