//! Driver capability for infrastructure backends.
//!
//! A driver owns one task's workspace and performs the actual convergence.
//! Backends are polymorphic over this trait; the controllers never know
//! which technology sits behind it.

pub mod terraform;

use async_trait::async_trait;
use thiserror::Error;

pub use terraform::{TerraformDriver, TerraformSettings};

/// Errors from a driver backend
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("backend binary `{path}` is not usable: {message}")]
    BinaryUnavailable { path: String, message: String },

    #[error("`{command}` failed with exit code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {seconds}s")]
    CommandTimeout { command: String, seconds: u64 },

    #[error("workspace error for task {task}: {message}")]
    Workspace { task: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file the file-generation collaborator hands the driver to materialize
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    /// File name relative to the task workspace
    pub name: String,

    /// Opaque file contents
    pub contents: Vec<u8>,
}

/// Stateful handle to one task's infrastructure workspace.
///
/// Exclusively owned by its unit; the loop topology serializes every call,
/// so methods take `&mut self` and implementations need no internal locking.
///
/// Any method failure is terminal for the current cycle only. The
/// controller wraps it with the task name, reports it, and waits for the
/// next trigger.
#[async_trait]
pub trait Driver: Send {
    /// One-time backend setup; idempotent
    async fn init(&mut self) -> Result<(), DriverError>;

    /// Materialize the task workspace, optionally replacing existing
    /// generated files
    async fn init_task(&mut self, force_overwrite: bool) -> Result<(), DriverError>;

    /// Prepare the execution context (working directory / workspace
    /// selection)
    async fn init_worker(&mut self) -> Result<(), DriverError>;

    /// Read-only convergence check; never mutates external state
    async fn inspect_task(&mut self) -> Result<(), DriverError>;

    /// Pre-apply step that must succeed before [`Driver::apply_work`]
    async fn init_work(&mut self) -> Result<(), DriverError>;

    /// Execute the convergence; the only call that changes external
    /// infrastructure state
    async fn apply_work(&mut self) -> Result<(), DriverError>;
}
