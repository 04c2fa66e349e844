//! Status read models.
//!
//! Computed on demand from the unit set and the event store, never
//! persisted. An HTTP layer serializes these as-is.

use serde::{Deserialize, Serialize};

use super::event::Event;
use super::task::Task;

/// Health of a task (or the whole controller) derived from its history
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Every recorded attempt succeeded
    Successful,

    /// Latest attempt succeeded but some earlier attempts failed
    Degraded,

    /// Latest attempt failed
    Critical,

    /// No history yet
    Undetermined,
}

/// Controller-wide status rollup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallStatus {
    pub status: HealthStatus,
}

/// Per-task status with optional event history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_name: String,
    pub status: HealthStatus,
    pub providers: Vec<String>,
    pub services: Vec<String>,
    pub events_url: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub events: Vec<Event>,
}

impl HealthStatus {
    /// Derive a task's health from its events, newest last
    pub fn from_events(events: &[Event]) -> Self {
        let Some(latest) = events.last() else {
            return Self::Undetermined;
        };
        if !latest.success {
            return Self::Critical;
        }
        if events.iter().any(|e| !e.success) {
            return Self::Degraded;
        }
        Self::Successful
    }
}

impl OverallStatus {
    /// Roll task statuses up into the worst observed health
    pub fn from_task_statuses<'a, I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = &'a TaskStatus>,
    {
        let mut overall: Option<HealthStatus> = None;
        for ts in statuses {
            let worst = match (overall, ts.status) {
                (None, s) => s,
                // Undetermined never outranks real history
                (Some(cur), HealthStatus::Undetermined) => cur,
                (Some(HealthStatus::Undetermined), s) => s,
                (Some(cur), s) => cur.max(s),
            };
            overall = Some(worst);
        }
        Self {
            status: overall.unwrap_or(HealthStatus::Undetermined),
        }
    }
}

impl TaskStatus {
    /// Build the status read model for one task
    pub fn new(task: &Task, events: Vec<Event>) -> Self {
        let status = HealthStatus::from_events(&events);
        let events_url = if events.is_empty() {
            String::new()
        } else {
            format!("/v1/status/tasks/{}?include=events", task.name)
        };
        Self {
            task_name: task.name.clone(),
            status,
            providers: task.providers.clone(),
            services: task.services.clone(),
            events_url,
            events,
        }
    }
}
