//! Task configuration identity.
//!
//! A Task is read-only input owned by the configuration subsystem. The
//! controller never mutates it after construction.

use serde::{Deserialize, Serialize};

/// A configured unit of infrastructure automation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task name
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Module source for the automation (e.g. a Terraform module path)
    pub source: String,

    /// Module version pin
    #[serde(default)]
    pub version: Option<String>,

    /// Names of registry services this task depends on
    pub services: Vec<String>,

    /// Names of infrastructure providers this task configures
    #[serde(default)]
    pub providers: Vec<String>,
}

impl Task {
    /// Snapshot of the task configuration for embedding in events
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            source: self.source.clone(),
            services: self.services.clone(),
            providers: self.providers.clone(),
        }
    }
}

/// The configuration snapshot recorded with each event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Module source at the time of the event
    pub source: String,

    /// Service selectors at the time of the event
    pub services: Vec<String>,

    /// Provider selectors at the time of the event
    pub providers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task {
            name: "web-lb".to_string(),
            description: "automate services for X to do Y".to_string(),
            source: "./modules/load-balancer".to_string(),
            version: Some("v1".to_string()),
            services: vec!["api".to_string(), "web".to_string()],
            providers: vec!["local".to_string()],
        }
    }

    #[test]
    fn test_snapshot_captures_selectors() {
        let snap = task().snapshot();
        assert_eq!(snap.source, "./modules/load-balancer");
        assert_eq!(snap.services, vec!["api", "web"]);
        assert_eq!(snap.providers, vec!["local"]);
    }

    #[test]
    fn test_task_serialization() {
        let json = serde_json::to_string(&task()).unwrap();
        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, task());
    }
}
