// src/dag/scheduler.rs

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::graph::{TaskGraph, TaskKind, TaskNode};
use crate::engine::{TaskName, TaskOutcome};
use crate::errors::Result;

/// Per-run state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    /// Task was triggered for this run but is waiting on dependencies.
    Pending,
    /// Task has been dispatched to the executor and is currently running.
    Running,
    /// Task completed successfully for this run.
    DoneSuccess,
    /// Task failed in this run (or was blocked by a failed dependency).
    DoneFailed,
}

/// Static task information from the plan, plus per-run state.
#[derive(Debug, Clone)]
struct TaskInfo {
    name: TaskName,
    kind: TaskKind,
    notify_clients: bool,
    /// Direct dependencies for this task (names in its `after`).
    deps: Vec<TaskName>,

    /// Per-run state (None if not participating in the current run).
    run_state: Option<RunState>,

    /// Last run ID in which this task succeeded.
    ///
    /// This allows semantics like: if clean -> styles and styles is
    /// re-triggered by a file edit, styles can run without wiping the
    /// output directory again, because clean already succeeded earlier.
    last_successful_run: Option<u64>,

    /// Last run ID in which this task failed.
    last_failed_run: Option<u64>,
}

/// Description of a task that the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub kind: TaskKind,
    pub notify_clients: bool,
}

impl ScheduledTask {
    fn from_task_info(info: &TaskInfo) -> Self {
        Self {
            name: info.name.clone(),
            kind: info.kind,
            notify_clients: info.notify_clients,
        }
    }
}

/// Scheduler holds the immutable DAG plus mutable per-run state.
///
/// It is responsible for:
/// - remembering which tasks are part of the current run
/// - deciding when a triggered task is "ready" to run (deps satisfied)
/// - marking tasks as succeeded/failed
/// - scheduling dependents when appropriate
/// - failing dependents when a task fails
pub struct Scheduler {
    graph: TaskGraph,
    tasks: HashMap<TaskName, TaskInfo>,

    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
}

impl Scheduler {
    /// Construct a scheduler from a task plan.
    pub fn new(plan: &[TaskNode]) -> Result<Self> {
        let graph = TaskGraph::from_nodes(plan)?;

        let mut tasks = HashMap::new();
        for node in plan {
            let info = TaskInfo {
                name: node.name.clone(),
                kind: node.kind,
                notify_clients: node.notify_clients,
                deps: node.after.clone(),
                run_state: None,
                last_successful_run: None,
                last_failed_run: None,
            };
            tasks.insert(node.name.clone(), info);
        }

        Ok(Self {
            graph,
            tasks,
            run_counter: 0,
            current_run_id: None,
        })
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// Whether connected browsers should be told when this task rewrites
    /// its outputs. Unknown tasks report `false`.
    pub fn notify_clients(&self, task: &str) -> bool {
        self.tasks
            .get(task)
            .map(|info| info.notify_clients)
            .unwrap_or(false)
    }

    /// Record that a task already succeeded before this scheduler existed.
    ///
    /// Used when a fresh watch-mode scheduler takes over from an initial
    /// one-shot run: tasks that succeeded there satisfy dependencies here
    /// without being re-run.
    pub fn prime_success(&mut self, task: &str) {
        match self.tasks.get_mut(task) {
            Some(info) => {
                info.last_successful_run = Some(0);
                debug!(task = %task, "seeded historical success");
            }
            None => {
                warn!(task = %task, "cannot seed success for unknown task; ignoring");
            }
        }
    }

    /// Start a new run, resetting per-run state but keeping historical success
    /// information (for dependency satisfaction on later runs).
    pub fn start_new_run(&mut self) {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);

        for info in self.tasks.values_mut() {
            info.run_state = None;
        }

        debug!(run_id = self.run_counter, "scheduler: starting new run");
    }

    /// Handle a trigger for a task name.
    ///
    /// This is called by the runtime whenever a task should participate in
    /// the current run (at startup or due to file changes).
    ///
    /// Returns a list of tasks that are now ready to be executed.
    pub fn handle_trigger(&mut self, task: &str) -> Vec<ScheduledTask> {
        if self.current_run_id.is_none() {
            warn!("handle_trigger called with no active run; implicitly starting a new run");
            self.start_new_run();
        }

        if let Some(info) = self.tasks.get_mut(task) {
            match info.run_state {
                None => {
                    info.run_state = Some(RunState::Pending);
                    debug!(task = %info.name, "task marked as Pending in this run");
                    self.pull_in_never_succeeded_deps(task);
                }
                Some(_) => {
                    // Already part of this run; ignore duplicate trigger.
                    debug!(
                        task = %info.name,
                        "task already participating in current run; ignoring additional trigger"
                    );
                }
            }
        } else {
            warn!(task = %task, "trigger for unknown task; ignoring");
        }

        let ready = self.collect_new_ready_tasks();
        self.maybe_finish_run();
        ready
    }

    /// Pull dependencies into the run when they could never be satisfied
    /// from history.
    ///
    /// A dependency that is not part of this run and has no recorded success
    /// would park the triggered task in `Pending` forever. Running the
    /// dependency first resolves that; once it has succeeded, later triggers
    /// skip it again.
    fn pull_in_never_succeeded_deps(&mut self, task: &str) {
        let mut stack = vec![task.to_string()];
        while let Some(name) = stack.pop() {
            let deps = self
                .tasks
                .get(&name)
                .map(|info| info.deps.clone())
                .unwrap_or_default();
            for dep in deps {
                if let Some(dep_info) = self.tasks.get_mut(&dep) {
                    if dep_info.run_state.is_none() && dep_info.last_successful_run.is_none() {
                        dep_info.run_state = Some(RunState::Pending);
                        info!(
                            task = %dep,
                            "dependency has never succeeded; pulling it into this run"
                        );
                        stack.push(dep);
                    }
                }
            }
        }
    }

    /// Handle completion of a task with a concrete outcome.
    ///
    /// - On success, mark it `DoneSuccess`, update historical success, and
    ///   schedule dependents where possible.
    /// - On failure, mark it `DoneFailed` and mark all triggered dependents
    ///   in this run as `DoneFailed` as well.
    pub fn handle_completion(&mut self, task: &str, outcome: &TaskOutcome) -> Vec<ScheduledTask> {
        let run_id = match self.current_run_id {
            Some(id) => id,
            None => {
                warn!(task = %task, "handle_completion called with no active run; ignoring");
                return Vec::new();
            }
        };

        let mut newly_ready = Vec::new();

        match self.tasks.get_mut(task) {
            Some(info) => match outcome {
                TaskOutcome::Success(summary) => {
                    info.run_state = Some(RunState::DoneSuccess);
                    info.last_successful_run = Some(run_id);
                    debug!(
                        task = %info.name,
                        files = summary.files,
                        elapsed_ms = summary.duration.as_millis() as u64,
                        "task completed successfully"
                    );
                    newly_ready.extend(self.collect_new_ready_tasks());
                }
                TaskOutcome::Failed(reason) => {
                    info.run_state = Some(RunState::DoneFailed);
                    info.last_failed_run = Some(run_id);
                    warn!(
                        task = %info.name,
                        error = %reason,
                        "task failed; failing dependents in this run"
                    );
                    self.mark_dependents_failed(task);
                }
            },
            None => {
                warn!(task = %task, "completion for unknown task; ignoring");
            }
        }

        self.maybe_finish_run();
        newly_ready
    }

    /// Determine whether all tasks are in a terminal state and clear
    /// `current_run_id` if so.
    fn maybe_finish_run(&mut self) {
        if self.current_run_id.is_none() {
            return;
        }

        let any_active = self.tasks.values().any(|info| {
            matches!(
                info.run_state,
                Some(RunState::Pending) | Some(RunState::Running)
            )
        });

        if !any_active {
            info!(
                run_id = self.current_run_id,
                "scheduler: all tasks terminal; marking run as finished"
            );
            self.current_run_id = None;
        }
    }

    /// Collect tasks that are `Pending` and whose dependencies are satisfied,
    /// mark them as `Running`, and return them as `ScheduledTask`s.
    fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        // Iterate twice: first to decide, then to mutate, to avoid borrowing
        // conflicts.
        let candidates: Vec<TaskName> = self
            .tasks
            .values()
            .filter_map(|info| {
                if matches!(info.run_state, Some(RunState::Pending)) && self.deps_satisfied(info) {
                    Some(info.name.clone())
                } else {
                    None
                }
            })
            .collect();

        let mut ready = Vec::new();
        for name in candidates {
            if let Some(info) = self.tasks.get_mut(&name) {
                debug!(task = %info.name, "dependencies satisfied; marking Running");
                info.run_state = Some(RunState::Running);
                ready.push(ScheduledTask::from_task_info(info));
            }
        }

        ready
    }

    /// Check whether all dependencies of the given task are satisfied for the
    /// *current run*.
    ///
    /// A dependency is satisfied if:
    /// - In this run: its `run_state` is `DoneSuccess`, OR
    /// - It is not part of this run (`run_state == None`) **and** it has a
    ///   `last_successful_run` recorded (it succeeded in a previous run or
    ///   was seeded via [`Scheduler::prime_success`]).
    ///
    /// If a dependency is `DoneFailed` in this run, or has never succeeded,
    /// the dependencies are not satisfied.
    fn deps_satisfied(&self, info: &TaskInfo) -> bool {
        for dep_name in &info.deps {
            let dep = match self.tasks.get(dep_name) {
                Some(d) => d,
                None => {
                    // Should not happen since the graph is validated.
                    warn!(
                        task = %info.name,
                        dep = %dep_name,
                        "dependency missing from tasks map"
                    );
                    return false;
                }
            };

            match dep.run_state {
                Some(RunState::DoneSuccess) => {}
                Some(RunState::DoneFailed) => {
                    return false;
                }
                Some(RunState::Pending) | Some(RunState::Running) => {
                    return false;
                }
                None => {
                    // Not part of this run; rely on history.
                    if dep.last_successful_run.is_none() {
                        return false;
                    }
                }
            }
        }

        true
    }

    /// Mark all *triggered* dependents (and their transitively triggered
    /// dependents) of a failed task as `DoneFailed` for this run.
    fn mark_dependents_failed(&mut self, failed_task: &str) {
        let mut stack: Vec<TaskName> = self
            .graph
            .dependents_of(failed_task)
            .iter()
            .cloned()
            .collect();

        while let Some(name) = stack.pop() {
            if let Some(info) = self.tasks.get_mut(&name) {
                match info.run_state {
                    Some(RunState::Pending) | Some(RunState::Running) => {
                        info.run_state = Some(RunState::DoneFailed);
                        debug!(
                            task = %info.name,
                            "marking dependent as DoneFailed due to upstream failure"
                        );
                        stack.extend(self.graph.dependents_of(&name).iter().cloned());
                    }
                    Some(RunState::DoneSuccess) | Some(RunState::DoneFailed) | None => {}
                }
            }
        }
    }
}
