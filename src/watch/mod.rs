// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling the per-task watch globs and the static-manifest reload rule.
//! - Wiring up a cross-platform filesystem watcher (`notify`) with a
//!   trailing-edge debounce so editor save bursts collapse into one trigger.
//! - Optional content hashing so touched-but-unchanged files don't re-run
//!   tasks.
//!
//! It does **not** know about the DAG or task dependencies; it only turns
//! filesystem changes into task-level triggers and reload requests.

pub mod hash;
pub mod patterns;
pub mod watcher;

pub use hash::HashLedger;
pub use patterns::{build_globset, build_watch_rules, WatchAction, WatchRule};
pub use watcher::{spawn_watcher, WatcherHandle};
