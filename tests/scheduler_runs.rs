use std::error::Error;
use std::time::Duration;

use sitemill::dag::Scheduler;
use sitemill::engine::{TaskOutcome, TaskSummary};
use sitemill::pipeline::standard_plan;

type TestResult = Result<(), Box<dyn Error>>;

fn success() -> TaskOutcome {
    TaskOutcome::Success(TaskSummary {
        files: 1,
        duration: Duration::from_millis(5),
    })
}

fn names(tasks: &[sitemill::dag::ScheduledTask]) -> Vec<&str> {
    let mut names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
    names.sort();
    names
}

#[test]
fn full_build_releases_clean_first_then_the_rest_concurrently() -> TestResult {
    let mut scheduler = Scheduler::new(&standard_plan())?;

    scheduler.start_new_run();
    let ready = scheduler.handle_trigger("clean");
    assert_eq!(names(&ready), vec!["clean"]);

    for task in ["markup", "styles", "scripts", "static"] {
        assert!(scheduler.handle_trigger(task).is_empty());
    }

    let ready = scheduler.handle_completion("clean", &success());
    assert_eq!(names(&ready), vec!["markup", "scripts", "static", "styles"]);

    for task in ["markup", "styles", "scripts", "static"] {
        assert!(scheduler.handle_completion(task, &success()).is_empty());
    }
    assert!(scheduler.is_idle());

    Ok(())
}

#[test]
fn clean_failure_fails_every_triggered_dependent() -> TestResult {
    let mut scheduler = Scheduler::new(&standard_plan())?;

    scheduler.start_new_run();
    scheduler.handle_trigger("clean");
    for task in ["markup", "styles", "scripts", "static"] {
        scheduler.handle_trigger(task);
    }

    let ready =
        scheduler.handle_completion("clean", &TaskOutcome::Failed("disk on fire".into()));
    assert!(ready.is_empty());
    assert!(scheduler.is_idle());

    Ok(())
}

#[test]
fn later_runs_rely_on_historical_successes() -> TestResult {
    let mut scheduler = Scheduler::new(&standard_plan())?;

    scheduler.start_new_run();
    scheduler.handle_trigger("clean");
    scheduler.handle_trigger("styles");
    scheduler.handle_completion("clean", &success());
    scheduler.handle_completion("styles", &success());
    assert!(scheduler.is_idle());

    // A file edit re-triggers styles only; clean is satisfied from history
    // and must not run again.
    scheduler.start_new_run();
    let ready = scheduler.handle_trigger("styles");
    assert_eq!(names(&ready), vec!["styles"]);

    assert!(scheduler.handle_completion("styles", &success()).is_empty());
    assert!(scheduler.is_idle());

    Ok(())
}

#[test]
fn primed_successes_satisfy_dependencies_in_a_fresh_scheduler() -> TestResult {
    let mut scheduler = Scheduler::new(&standard_plan())?;
    scheduler.prime_success("clean");

    scheduler.start_new_run();
    let ready = scheduler.handle_trigger("markup");
    assert_eq!(names(&ready), vec!["markup"]);

    Ok(())
}

#[test]
fn never_succeeded_dependencies_are_pulled_into_the_run() -> TestResult {
    let mut scheduler = Scheduler::new(&standard_plan())?;

    // No priming: clean has never run, so triggering styles alone must not
    // park it forever.
    scheduler.start_new_run();
    let ready = scheduler.handle_trigger("styles");
    assert_eq!(names(&ready), vec!["clean"]);

    let ready = scheduler.handle_completion("clean", &success());
    assert_eq!(names(&ready), vec!["styles"]);

    scheduler.handle_completion("styles", &success());
    assert!(scheduler.is_idle());

    Ok(())
}

#[test]
fn duplicate_triggers_within_a_run_are_ignored() -> TestResult {
    let mut scheduler = Scheduler::new(&standard_plan())?;
    scheduler.prime_success("clean");

    scheduler.start_new_run();
    let first = scheduler.handle_trigger("scripts");
    assert_eq!(names(&first), vec!["scripts"]);

    let second = scheduler.handle_trigger("scripts");
    assert!(second.is_empty());

    Ok(())
}

#[test]
fn notify_flags_follow_the_plan() -> TestResult {
    let scheduler = Scheduler::new(&standard_plan())?;

    assert!(scheduler.notify_clients("markup"));
    assert!(scheduler.notify_clients("styles"));
    assert!(scheduler.notify_clients("scripts"));
    assert!(!scheduler.notify_clients("clean"));
    assert!(!scheduler.notify_clients("static"));
    assert!(!scheduler.notify_clients("no-such-task"));

    Ok(())
}
