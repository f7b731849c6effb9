// src/engine/runtime.rs

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::scheduler::{ScheduledTask, Scheduler};
use crate::engine::queue::TriggerQueue;
use crate::server::reload::ReloadHub;

/// Public type alias for task names throughout the engine.
pub type TaskName = String;

/// Reason why a task was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Seeded by the CLI at the start of a build or dev session.
    Startup,
    /// A watched source file changed.
    FileWatch,
}

/// What a successful task did.
#[derive(Debug, Clone, Default)]
pub struct TaskSummary {
    /// Output files written (or removed, for cleanup tasks).
    pub files: usize,
    pub duration: Duration,
}

/// Result of running a task.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Success(TaskSummary),
    Failed(String),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }
}

/// Events sent into the runtime from watchers, the executor, the dev
/// server, or external signals.
///
/// - the watcher sends `TaskTriggered` and `ReloadRequested`
/// - the executor sends `TaskCompleted`
/// - Ctrl-C handling sends `ShutdownRequested`
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    TaskTriggered {
        task: TaskName,
        reason: TriggerReason,
    },
    TaskCompleted {
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// A static asset changed; browsers should refresh but no task re-runs.
    ReloadRequested,
    ShutdownRequested,
}

/// Options that influence how the runtime behaves.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// If true, exit as soon as there is nothing left to run and no queued
    /// triggers. In watch mode this should be `false`.
    pub exit_when_idle: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            exit_when_idle: false,
        }
    }
}

/// Per-session record of what ran and how it ended.
///
/// Later completions of the same task overwrite earlier ones, so the report
/// always reflects the most recent outcome per task.
#[derive(Debug, Default)]
pub struct RunReport {
    outcomes: BTreeMap<TaskName, TaskOutcome>,
}

impl RunReport {
    pub fn record(&mut self, task: &str, outcome: TaskOutcome) {
        self.outcomes.insert(task.to_string(), outcome);
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_success())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| !o.is_success())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed().is_empty()
    }
}

/// The main orchestration runtime.
///
/// Responsibilities:
/// - Consume `RuntimeEvent`s from the watcher/executor/ctrl-c.
/// - Coalesce triggers that arrive mid-run.
/// - Drive the DAG scheduler.
/// - Send `ScheduledTask`s to the executor when tasks are ready.
/// - Publish change/reload notifications to connected browsers.
pub struct Runtime {
    scheduler: Scheduler,
    queue: TriggerQueue,
    options: RuntimeOptions,

    /// Unified event stream from all producers.
    events_rx: mpsc::Receiver<RuntimeEvent>,

    /// Channel to executor: whenever the scheduler marks a task as ready, we
    /// send it here.
    exec_tx: mpsc::Sender<ScheduledTask>,

    /// Live-reload fan-out; `None` outside dev sessions.
    reload: Option<ReloadHub>,

    report: RunReport,
}

impl Runtime {
    pub fn new(
        scheduler: Scheduler,
        options: RuntimeOptions,
        events_rx: mpsc::Receiver<RuntimeEvent>,
        exec_tx: mpsc::Sender<ScheduledTask>,
    ) -> Self {
        Self {
            scheduler,
            queue: TriggerQueue::new(),
            options,
            events_rx,
            exec_tx,
            reload: None,
            report: RunReport::default(),
        }
    }

    /// Attach a live-reload hub; successful compile tasks and static asset
    /// changes will be published to it.
    pub fn with_reload_hub(mut self, hub: ReloadHub) -> Self {
        self.reload = Some(hub);
        self
    }

    /// Main event loop.
    ///
    /// Called from `lib.rs` after the scheduler is constructed, the executor
    /// is spawned, and any startup triggers have been sent into the event
    /// channel.
    pub async fn run(mut self) -> Result<RunReport> {
        info!("runtime started");

        while let Some(event) = self.events_rx.recv().await {
            debug!(?event, "runtime received event");

            let keep_running = match event {
                RuntimeEvent::TaskTriggered { task, reason } => {
                    self.handle_task_trigger(task, reason).await?
                }
                RuntimeEvent::TaskCompleted { task, outcome } => {
                    self.handle_task_completion(task, outcome).await?
                }
                RuntimeEvent::ReloadRequested => {
                    self.handle_reload_request();
                    true
                }
                RuntimeEvent::ShutdownRequested => {
                    info!("shutdown requested, stopping runtime");
                    false
                }
            };

            if !keep_running {
                break;
            }
        }

        info!("runtime exiting");
        Ok(self.report)
    }

    /// Handle a trigger (at startup or from file watching).
    async fn handle_task_trigger(&mut self, task: TaskName, reason: TriggerReason) -> Result<bool> {
        info!(task = %task, ?reason, "task triggered");

        if self.scheduler.is_idle() {
            // Starting a new run. Combine this trigger with anything queued
            // while the previous run was still finishing.
            let mut triggers: HashSet<TaskName> = self.queue.drain_pending().into_iter().collect();
            triggers.insert(task);

            self.start_new_run(triggers.into_iter().collect()).await?;
        } else {
            self.queue.record_trigger(&task);
            debug!(task = %task, "run in progress; trigger queued");
        }

        Ok(self.keep_running_when_idle())
    }

    /// Handle completion of a task.
    ///
    /// This includes both success and failure; failures cause dependents to
    /// never run, which is handled inside `Scheduler::handle_completion`.
    async fn handle_task_completion(
        &mut self,
        task: TaskName,
        outcome: TaskOutcome,
    ) -> Result<bool> {
        match &outcome {
            TaskOutcome::Success(summary) => {
                info!(
                    task = %task,
                    files = summary.files,
                    elapsed_ms = summary.duration.as_millis() as u64,
                    "task completed"
                );
                if self.scheduler.notify_clients(&task) {
                    if let Some(hub) = &self.reload {
                        hub.changed(&task);
                    }
                }
            }
            TaskOutcome::Failed(reason) => {
                warn!(task = %task, error = %reason, "task failed");
            }
        }

        let newly_ready = self.scheduler.handle_completion(&task, &outcome);
        self.report.record(&task, outcome);
        self.spawn_ready_tasks(newly_ready).await?;

        self.maybe_start_queued_run().await?;

        Ok(self.keep_running_when_idle())
    }

    fn handle_reload_request(&self) {
        match &self.reload {
            Some(hub) => hub.reload(),
            None => debug!("reload requested but no browser hub attached; ignoring"),
        }
    }

    /// Start a brand-new run from the given set of root triggers.
    async fn start_new_run(&mut self, triggers: Vec<TaskName>) -> Result<()> {
        if triggers.is_empty() {
            debug!("start_new_run called with empty trigger set; nothing to do");
            return Ok(());
        }

        info!(triggers = ?triggers, "starting new run");

        self.scheduler.start_new_run();

        for task in triggers {
            let newly_ready = self.scheduler.handle_trigger(&task);
            self.spawn_ready_tasks(newly_ready).await?;
        }

        Ok(())
    }

    /// If the scheduler is idle and there are queued triggers, start a new run.
    async fn maybe_start_queued_run(&mut self) -> Result<()> {
        if !self.scheduler.is_idle() {
            return Ok(());
        }

        let triggers = self.queue.drain_pending();
        if triggers.is_empty() {
            return Ok(());
        }

        self.start_new_run(triggers).await
    }

    /// Send all ready tasks to the executor.
    async fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        for task in tasks {
            debug!(task = %task.name, "dispatching task to executor");
            if let Err(err) = self.exec_tx.send(task).await {
                error!(error = %err, "failed to send task to executor");
                // If the executor channel is closed, there's not much we can
                // do; bubble up so higher layers can decide.
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// In one-shot mode, stop once the scheduler is idle and nothing is
    /// queued.
    fn keep_running_when_idle(&self) -> bool {
        if self.options.exit_when_idle && self.scheduler.is_idle() && self.queue.is_empty() {
            info!("runtime idle and exit_when_idle=true, stopping");
            return false;
        }
        true
    }
}
