use std::collections::HashSet;
use std::time::Duration;

use proptest::prelude::*;
use sitemill::dag::Scheduler;
use sitemill::engine::{TaskOutcome, TaskSummary};
use sitemill::pipeline::standard_plan;

fn success() -> TaskOutcome {
    TaskOutcome::Success(TaskSummary {
        files: 1,
        duration: Duration::from_millis(1),
    })
}

proptest! {
    // Simulate a sequence of runs over the fixed task plan. Each run triggers
    // a random subset of tasks and fails a random subset; the scheduler must
    // dispatch every task at most once per run and settle back to idle once
    // the simulated executor drains.
    #[test]
    fn edit_storms_always_drain_to_idle(
        runs in proptest::collection::vec(
            (
                proptest::collection::vec(0..5usize, 1..6),
                proptest::collection::vec(0..5usize, 0..3),
            ),
            1..6,
        )
    ) {
        let plan = standard_plan();
        let names: Vec<&str> = plan.iter().map(|n| n.name.as_str()).collect();
        let mut scheduler = Scheduler::new(&plan).unwrap();

        for (trigger_idxs, failing_idxs) in runs {
            let failing: HashSet<&str> = failing_idxs.iter().map(|&i| names[i]).collect();

            scheduler.start_new_run();

            // Tasks currently "executing". Triggers all land before the first
            // completion, matching how the runtime primes a run.
            let mut executing: Vec<String> = Vec::new();
            for &i in &trigger_idxs {
                let ready = scheduler.handle_trigger(names[i]);
                executing.extend(ready.into_iter().map(|t| t.name));
            }

            let mut dispatched: HashSet<String> = HashSet::new();
            for task in &executing {
                prop_assert!(
                    dispatched.insert(task.clone()),
                    "task '{}' dispatched twice in one run",
                    task
                );
            }

            let mut steps = 0;
            while let Some(task) = executing.pop() {
                steps += 1;
                prop_assert!(steps <= 32, "run did not settle");

                let outcome = if failing.contains(task.as_str()) {
                    TaskOutcome::Failed("synthetic failure".to_string())
                } else {
                    success()
                };
                for ready in scheduler.handle_completion(&task, &outcome) {
                    prop_assert!(
                        dispatched.insert(ready.name.clone()),
                        "task '{}' dispatched twice in one run",
                        ready.name
                    );
                    executing.push(ready.name);
                }
            }

            prop_assert!(
                scheduler.is_idle(),
                "nothing left executing but the scheduler is still busy"
            );
        }
    }
}
