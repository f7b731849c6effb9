// src/engine/queue.rs

use std::collections::BTreeSet;

use tracing::debug;

use super::runtime::TaskName;

/// Triggers that arrive while a run is already executing.
///
/// Semantics:
/// - Triggers recorded here are coalesced into a single pending set; a task
///   name recorded twice still runs once.
/// - When the runtime becomes idle it calls [`TriggerQueue::drain_pending`]
///   and starts one new run from the merged set.
///
/// This works with the rules:
/// - If clean -> styles and only styles triggers while running, the next run
///   starts from styles alone.
/// - If styles and scripts both trigger while running, the next run unions
///   them and each task still runs once.
#[derive(Debug, Default)]
pub struct TriggerQueue {
    pending: BTreeSet<TaskName>,
}

impl TriggerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are no queued triggers.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Record that a task was triggered while a run is in progress.
    pub fn record_trigger(&mut self, task: &str) {
        let inserted = self.pending.insert(task.to_string());
        debug!(task = %task, inserted, "trigger recorded for next run");
    }

    /// Drain all pending triggers, in name order, for the next run.
    pub fn drain_pending(&mut self) -> Vec<TaskName> {
        let tasks: Vec<TaskName> = std::mem::take(&mut self.pending).into_iter().collect();
        if !tasks.is_empty() {
            debug!(drained = tasks.len(), "drained queued triggers into new run");
        }
        tasks
    }
}
