//! Domain types for the driftsync controller.
//!
//! This module contains the core data structures:
//! - Task: configured unit of infrastructure automation
//! - Event: immutable record of one convergence attempt
//! - Status: read models derived from task history

pub mod event;
pub mod status;
pub mod task;

// Re-export commonly used types
pub use event::Event;
pub use status::{HealthStatus, OverallStatus, TaskStatus};
pub use task::{Task, TaskSnapshot};
