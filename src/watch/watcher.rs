// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{RuntimeEvent, TriggerReason};
use crate::pipeline::context::relative_str;
use crate::watch::hash::HashLedger;
use crate::watch::patterns::{WatchAction, WatchRule};

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive
/// for as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher over the source root.
///
/// Changed paths are matched against the rules; matches are collected until
/// the event stream has been quiet for `debounce`, then flushed as one batch
/// of `TaskTriggered` events (plus at most one `ReloadRequested` when a
/// reload-only rule matched). A burst of saves therefore produces a single
/// run per affected task.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    rules: Vec<WatchRule>,
    debounce: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    let rules = Arc::new(rules);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        {
            let event_tx = event_tx.clone();
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Err(err) = event_tx.send(event) {
                        // We can't log via tracing here easily, so fallback to stderr.
                        eprintln!("sitemill: failed to forward notify event: {err}");
                    }
                }
                Err(err) => {
                    eprintln!("sitemill: file watch error: {err}");
                }
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!("file watcher started on {:?}", root);

    tokio::spawn(debounce_loop(
        event_rx,
        root.clone(),
        Arc::clone(&rules),
        debounce,
        runtime_tx,
    ));

    Ok(WatcherHandle { _inner: watcher })
}

/// Core watch loop: absorb a burst of events, then flush one batch.
async fn debounce_loop(
    mut event_rx: mpsc::UnboundedReceiver<Event>,
    root: PathBuf,
    rules: Arc<Vec<WatchRule>>,
    debounce: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let mut ledger = HashLedger::new();

    while let Some(event) = event_rx.recv().await {
        let mut pending: BTreeSet<usize> = BTreeSet::new();
        note_matches(&event, &root, &rules, &mut pending);

        // Trailing-edge debounce: keep absorbing events until the stream
        // has been quiet for the whole window.
        loop {
            tokio::select! {
                _ = tokio::time::sleep(debounce) => break,
                next = event_rx.recv() => match next {
                    Some(event) => {
                        note_matches(&event, &root, &rules, &mut pending);
                    }
                    None => break,
                },
            }
        }

        if pending.is_empty() {
            continue;
        }

        let mut reload = false;
        for index in pending {
            let rule = &rules[index];

            if rule.use_hash() {
                match ledger.changed(rule, &root) {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(rule = rule.label(), "skipping trigger, contents unchanged");
                        continue;
                    }
                    Err(err) => {
                        warn!(rule = rule.label(), error = %err, "hash check failed, assuming changed");
                    }
                }
            }

            match rule.action() {
                WatchAction::Trigger(task) => {
                    debug!(task = %task, "watch match -> triggering task");
                    if runtime_tx
                        .send(RuntimeEvent::TaskTriggered {
                            task: task.clone(),
                            reason: TriggerReason::FileWatch,
                        })
                        .await
                        .is_err()
                    {
                        debug!("runtime channel closed, stopping watcher loop");
                        return;
                    }
                }
                WatchAction::Reload => reload = true,
            }
        }

        if reload {
            debug!("static asset change -> requesting reload");
            if runtime_tx.send(RuntimeEvent::ReloadRequested).await.is_err() {
                debug!("runtime channel closed, stopping watcher loop");
                return;
            }
        }
    }

    debug!("file watcher loop ended");
}

/// Record which rules are interested in any of the event's paths.
fn note_matches(
    event: &Event,
    root: &std::path::Path,
    rules: &[WatchRule],
    pending: &mut BTreeSet<usize>,
) {
    for path in &event.paths {
        let Some(rel) = relative_str(root, path) else {
            continue;
        };
        for (index, rule) in rules.iter().enumerate() {
            if rule.matches(&rel) {
                debug!(rule = rule.label(), path = %rel, "watch match");
                pending.insert(index);
            }
        }
    }
}
