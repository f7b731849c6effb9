// src/pipeline/executor.rs

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::dag::{ScheduledTask, TaskKind};
use crate::engine::{RuntimeEvent, TaskOutcome, TaskSummary};
use crate::pipeline::context::BuildContext;
use crate::pipeline::{clean, markup, scripts, statics, styles};

/// Spawn the background executor loop.
///
/// The returned `mpsc::Sender<ScheduledTask>` is what the runtime uses as
/// `exec_tx` in `engine::Runtime`. Each scheduled task runs in its own Tokio
/// task, so independent pipeline steps can run in parallel. The pipeline
/// functions themselves are blocking filesystem work and run on the blocking
/// pool.
pub fn spawn_executor(
    ctx: Arc<BuildContext>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        info!("executor loop started");
        while let Some(task) = rx.recv().await {
            let ctx = Arc::clone(&ctx);
            let runtime_tx = runtime_tx.clone();
            tokio::spawn(async move {
                execute(task, ctx, runtime_tx).await;
            });
        }
        info!("executor loop finished (channel closed)");
    });

    tx
}

/// Run a single pipeline task and emit its `TaskCompleted` event.
///
/// All errors are converted into a failed completion; they are also logged
/// via `tracing::error!`.
async fn execute(
    task: ScheduledTask,
    ctx: Arc<BuildContext>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    info!(task = %task.name, "starting task");
    let started = Instant::now();

    let kind = task.kind;
    let worker_ctx = Arc::clone(&ctx);
    let joined = tokio::task::spawn_blocking(move || run_task(&worker_ctx, kind)).await;

    let outcome = match joined {
        Ok(Ok(files)) => TaskOutcome::Success(TaskSummary {
            files,
            duration: started.elapsed(),
        }),
        Ok(Err(err)) => {
            error!(task = %task.name, error = format!("{err:#}"), "task failed");
            TaskOutcome::Failed(format!("{err:#}"))
        }
        Err(err) => {
            error!(task = %task.name, error = %err, "task panicked");
            TaskOutcome::Failed(format!("task panicked: {err}"))
        }
    };

    let _ = runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task.name,
            outcome,
        })
        .await;
}

/// Dispatch a task kind to its pipeline function. Returns the number of
/// files it produced (or removed).
pub fn run_task(ctx: &BuildContext, kind: TaskKind) -> Result<usize> {
    match kind {
        TaskKind::Clean => clean::remove_output(ctx),
        TaskKind::Markup => markup::process(ctx),
        TaskKind::Styles => styles::process(ctx),
        TaskKind::Scripts => scripts::process(ctx),
        TaskKind::Statics => statics::copy(ctx),
    }
}
