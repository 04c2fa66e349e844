//! Controller core.
//!
//! This module contains:
//! - EventStore: per-task execution history with ring-buffer retention
//! - Unit: runtime binding of a task to a template and driver
//! - BaseController: bootstrap shared by both run modes
//! - ReadOnlyController: one bounded inspect-only pass
//! - ReadWriteController: unbounded per-unit convergence loops

pub mod base;
pub mod readonly;
pub mod readwrite;
pub mod store;
pub mod unit;

use thiserror::Error;

use crate::domain::{OverallStatus, Task, TaskStatus};
use crate::driver::DriverError;
use crate::tmpl::ResolveError;

// Re-export commonly used types
pub use base::BaseController;
pub use readonly::ReadOnlyController;
pub use readwrite::{CycleOutcome, ReadWriteController};
pub use store::EventStore;
pub use unit::Unit;

/// Errors surfaced by the controllers.
///
/// Per-cycle failures carry the task name; `Cancelled` is propagated
/// verbatim and never wrapped as a failure.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("could not initialize controller: {0}")]
    Init(String),

    #[error("could not fetch template dependencies for task {task}: {source}")]
    Resolve {
        task: String,
        #[source]
        source: ResolveError,
    },

    #[error("could not render template for task {task}: {source}")]
    Render {
        task: String,
        #[source]
        source: ResolveError,
    },

    #[error("could not inspect task {task}: {source}")]
    Inspect {
        task: String,
        #[source]
        source: DriverError,
    },

    #[error("could not apply changes for task {task}: {source}")]
    Apply {
        task: String,
        #[source]
        source: DriverError,
    },

    #[error("error watching template dependencies: {0}")]
    Watch(#[source] ResolveError),

    #[error("context cancelled")]
    Cancelled,
}

impl ControllerError {
    /// Whether this outcome is a shutdown rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Compute the status read models for an HTTP layer to serialize
pub fn status_report(tasks: &[Task], store: &EventStore) -> (OverallStatus, Vec<TaskStatus>) {
    let statuses: Vec<TaskStatus> = tasks
        .iter()
        .map(|task| TaskStatus::new(task, store.task_events(&task.name)))
        .collect();
    let overall = OverallStatus::from_task_statuses(&statuses);
    (overall, statuses)
}
