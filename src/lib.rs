//! driftsync - registry-driven infrastructure sync controller
//!
//! Continuously reconciles externally-managed infrastructure configuration
//! with the live state of a dynamic service registry. When service topology
//! changes, affected automation tasks are re-rendered and re-applied.
//!
//! # Architecture
//!
//! The system is built around per-task convergence loops:
//! - Each configured task becomes a [`core::Unit`] binding a template and
//!   an exclusively-owned [`driver::Driver`]
//! - A watch/resolve engine supplies change notification and incremental
//!   template rendering
//! - Completed convergence attempts are recorded in the
//!   [`core::EventStore`]; status read models are derived on demand
//!
//! # Modules
//!
//! - `core`: controllers, units, event store
//! - `driver`: the backend capability trait and the Terraform CLI backend
//! - `tmpl`: template/watch/resolve collaborators and the registry engine
//! - `domain`: data structures (Task, Event, status read models)
//! - `config`, `cli`: configuration and the command-line surface
//!
//! # Usage
//!
//! ```bash
//! # Converge continuously
//! driftsync sync --config driftsync.yaml
//!
//! # Plan every task once, read-only
//! driftsync inspect --config driftsync.yaml
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod driver;
pub mod tmpl;

// Re-export main types at crate root for convenience
pub use crate::core::{
    BaseController, ControllerError, EventStore, ReadOnlyController, ReadWriteController, Unit,
};
pub use domain::{Event, HealthStatus, OverallStatus, Task, TaskStatus};
pub use driver::{Driver, DriverError, GeneratedFile};
pub use tmpl::{RenderEvent, ResolveError, Resolver, Template, WatchSubscription, Watcher};
