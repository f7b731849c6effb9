// src/engine/mod.rs

//! Orchestration engine for sitemill.
//!
//! This module ties together:
//! - the DAG scheduler
//! - the trigger queue (what happens when triggers arrive while a run is active)
//! - the main runtime event loop that reacts to:
//!   - file-watch triggers
//!   - task completion events
//!   - static asset reload requests
//!   - shutdown signals

pub mod queue;
pub mod runtime;

pub use queue::TriggerQueue;
pub use runtime::{
    RunReport, Runtime, RuntimeEvent, RuntimeOptions, TaskName, TaskOutcome, TaskSummary,
    TriggerReason,
};
