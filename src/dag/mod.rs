// src/dag/mod.rs

//! Task plan representation and scheduling.
//!
//! - [`graph`] holds the directed acyclic graph of pipeline tasks.
//! - [`scheduler`] contains the per-run state machine that decides
//!   which tasks are ready to run, and when dependents can be scheduled.

pub mod graph;
pub mod scheduler;

pub use graph::{TaskGraph, TaskKind, TaskNode};
pub use scheduler::{ScheduledTask, Scheduler};
