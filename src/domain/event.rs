//! Execution-history events.
//!
//! Each event records the outcome of one completed convergence attempt for
//! a task. Events are append-only; the store never rewrites them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::TaskSnapshot;

/// Recorded outcome of one convergence attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this event
    pub id: Uuid,

    /// The task this event belongs to
    pub task_name: String,

    /// When the convergence attempt started
    pub start_time: DateTime<Utc>,

    /// When the convergence attempt finished
    pub end_time: DateTime<Utc>,

    /// Whether both the pre-apply step and the apply succeeded
    pub success: bool,

    /// Error message if the attempt failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Task configuration at the time of the attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<TaskSnapshot>,
}

impl Event {
    /// Begin an event at the start of a convergence attempt.
    ///
    /// `end_time` is set to the start time until [`Event::finish`] is called.
    pub fn begin(task_name: impl Into<String>, config: Option<TaskSnapshot>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task_name: task_name.into(),
            start_time: now,
            end_time: now,
            success: false,
            error: None,
            config,
        }
    }

    /// Finish the event with the outcome of the attempt
    pub fn finish<E: std::fmt::Display>(mut self, result: &Result<(), E>) -> Self {
        self.end_time = Utc::now();
        match result {
            Ok(()) => self.success = true,
            Err(e) => {
                self.success = false;
                self.error = Some(e.to_string());
            }
        }
        self
    }
}
