// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cli::{CliArgs, Command, RunnableTask};
use crate::config::ConfigFile;
use crate::dag::{Scheduler, TaskGraph, TaskKind};
use crate::engine::{RunReport, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason};
use crate::pipeline::{BuildContext, BuildMode};
use crate::server::ReloadHub;

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = config::load_or_default(&config_path)?;
    let base_dir = config::config_root_dir(&config_path);

    match args.command {
        Command::Build => run_build(cfg, &base_dir).await,
        Command::Dev => run_dev(cfg, &base_dir).await,
        Command::Clean => run_single(cfg, &base_dir, RunnableTask::Clean),
        Command::Run { task } => run_single(cfg, &base_dir, task),
        Command::Lint => run_single(cfg, &base_dir, RunnableTask::Lint),
        Command::Plan => print_plan(&cfg),
    }
}

/// Production build: one scheduler pass over the whole task graph.
async fn run_build(cfg: ConfigFile, base_dir: &Path) -> Result<()> {
    let report = run_dag(cfg, base_dir, BuildMode::Production, pipeline::build_tasks()).await?;
    if !report.all_succeeded() {
        bail!(
            "build finished with failed tasks: {}",
            report.failed().join(", ")
        );
    }
    info!("build finished");
    Ok(())
}

/// Development session: initial compile pass, then server + watcher + a
/// fresh runtime that reacts to file changes until Ctrl-C.
async fn run_dev(cfg: ConfigFile, base_dir: &Path) -> Result<()> {
    let report = run_dag(
        cfg.clone(),
        base_dir,
        BuildMode::Development,
        pipeline::dev_tasks(),
    )
    .await?;
    for task in report.failed() {
        warn!(task = %task, "initial build failed; fix the source and save to retry");
    }

    let ctx = Arc::new(BuildContext::new(cfg, BuildMode::Development, base_dir)?);

    // Prime the watch-phase scheduler with the initial run's successes so a
    // file change does not re-run `clean` and wipe the output tree.
    let mut scheduler = Scheduler::new(&pipeline::standard_plan())?;
    for task in report.succeeded() {
        scheduler.prime_success(task);
    }

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let exec_tx = pipeline::spawn_executor(Arc::clone(&ctx), rt_tx.clone());
    let hub = ReloadHub::new();

    let rules = watch::build_watch_rules(&ctx.config, &ctx.manifest)?;
    let debounce = Duration::from_millis(ctx.config.watch.debounce_ms);
    let _watcher = watch::spawn_watcher(
        ctx.paths.source_root.clone(),
        rules,
        debounce,
        rt_tx.clone(),
    )?;

    // Server task; a bind failure ends the whole session.
    {
        let state = server::ServerState::new(&ctx, hub.clone());
        let host = ctx.config.server.host.clone();
        let port = ctx.config.server.port;
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(err) = server::serve(state, &host, port).await {
                error!(error = format!("{err:#}"), "dev server stopped");
                let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
            }
        });
    }

    // Ctrl-C -> graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    info!("watching for changes; Ctrl-C to stop");

    let options = RuntimeOptions {
        exit_when_idle: false,
    };
    let runtime = Runtime::new(scheduler, options, rt_rx, exec_tx).with_reload_hub(hub);
    runtime.run().await?;
    Ok(())
}

/// One scheduler pass: trigger `tasks`, run until the graph is idle.
async fn run_dag(
    cfg: ConfigFile,
    base_dir: &Path,
    mode: BuildMode,
    tasks: Vec<&'static str>,
) -> Result<RunReport> {
    let ctx = Arc::new(BuildContext::new(cfg, mode, base_dir)?);
    let scheduler = Scheduler::new(&pipeline::standard_plan())?;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let exec_tx = pipeline::spawn_executor(Arc::clone(&ctx), rt_tx.clone());

    for task in tasks {
        rt_tx
            .send(RuntimeEvent::TaskTriggered {
                task: task.to_string(),
                reason: TriggerReason::Startup,
            })
            .await?;
    }

    let options = RuntimeOptions {
        exit_when_idle: true,
    };
    let runtime = Runtime::new(scheduler, options, rt_rx, exec_tx);
    runtime.run().await
}

/// Run one task directly with a development context, outside the graph.
fn run_single(cfg: ConfigFile, base_dir: &Path, task: RunnableTask) -> Result<()> {
    let ctx = BuildContext::new(cfg, BuildMode::Development, base_dir)?;

    let files = match task {
        RunnableTask::Markup => pipeline::executor::run_task(&ctx, TaskKind::Markup)?,
        RunnableTask::Styles => pipeline::executor::run_task(&ctx, TaskKind::Styles)?,
        RunnableTask::Scripts => pipeline::executor::run_task(&ctx, TaskKind::Scripts)?,
        RunnableTask::Static => pipeline::executor::run_task(&ctx, TaskKind::Statics)?,
        RunnableTask::Clean => pipeline::executor::run_task(&ctx, TaskKind::Clean)?,
        RunnableTask::Lint => {
            pipeline::lint::run(&ctx)?;
            return Ok(());
        }
    };
    info!(task = ?task, files, "task finished");
    Ok(())
}

/// Print tasks, edges, topological order and watch rules; execute nothing.
fn print_plan(cfg: &ConfigFile) -> Result<()> {
    let plan = pipeline::standard_plan();
    let graph = TaskGraph::from_nodes(&plan)?;

    println!("sitemill plan");
    println!();
    println!("tasks:");
    for node in &plan {
        if node.after.is_empty() {
            println!("  - {}", node.name);
        } else {
            println!("  - {} (after: {})", node.name, node.after.join(", "));
        }
    }
    println!();
    println!("order: {}", graph.topo_order().join(" -> "));
    println!();
    println!("watch rules:");
    println!("  markup:  {:?}", cfg.watch.markup);
    println!("  styles:  {:?}", cfg.watch.styles);
    println!("  scripts: {:?}", cfg.watch.scripts);
    println!("  static:  {:?} (reload only)", cfg.statics.patterns);
    println!();
    println!("debounce: {}ms", cfg.watch.debounce_ms);

    Ok(())
}
