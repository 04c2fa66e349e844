//! Template, watch, and resolve collaborators.
//!
//! The controller treats dependency watching and template rendering as
//! external capabilities behind traits:
//! - [`Watcher`]: hands out per-subscriber registry change subscriptions
//! - [`Resolver`]: advances a template's dependency graph one step
//! - [`Template`]: materializes rendered bytes into a task workspace
//!
//! `RenderEvent.complete` is only `true` once every dynamic value the
//! template depends on has been fetched. First population may take several
//! watch cycles; the controller must not render or converge before then.

pub mod registry;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

pub use registry::{RegistryEngine, RegistrySnapshot, ServiceInstance, WorkspaceTemplate};

/// Errors from watch/resolve collaborators
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("registry snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    #[error("template {template} failed to render: {message}")]
    Render { template: String, message: String },

    #[error("watch channel closed")]
    WatchClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result of one dependency-graph evaluation step.
///
/// Transient; never persisted.
#[derive(Debug, Clone, Default)]
pub struct RenderEvent {
    /// Whether every dependency has been fully fetched
    pub complete: bool,

    /// Rendered contents, meaningful only when `complete` is true
    pub contents: Vec<u8>,
}

/// A template handle bound to one task's workspace
#[async_trait]
pub trait Template: Send + Sync {
    /// Identifier used in logs
    fn id(&self) -> &str;

    /// Registry service names this template depends on
    fn services(&self) -> &[String] {
        &[]
    }

    /// Write rendered contents into the task workspace
    async fn render(&self, contents: &[u8]) -> Result<(), ResolveError>;
}

/// Per-subscriber handle onto the registry change signal.
///
/// Tracks the last change version this subscriber observed, so a change
/// that lands while the subscriber is busy elsewhere is still seen by its
/// very next [`WatchSubscription::wait`].
pub struct WatchSubscription {
    version: watch::Receiver<u64>,
}

impl WatchSubscription {
    pub fn new(version: watch::Receiver<u64>) -> Self {
        Self { version }
    }

    /// Wait until the registry changed since this subscription last looked.
    ///
    /// Cancellation is handled by the caller selecting against a shutdown
    /// signal; `wait` itself only fails if the watch engine is gone.
    pub async fn wait(&mut self) -> Result<(), ResolveError> {
        self.version
            .changed()
            .await
            .map_err(|_| ResolveError::WatchClosed)
    }
}

/// Source of registry change notifications
pub trait Watcher: Send + Sync {
    /// Open a subscription; changes after this call are never missed
    fn subscribe(&self) -> WatchSubscription;
}

/// Advances a template's dependency graph one evaluation step
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, template: &dyn Template) -> Result<RenderEvent, ResolveError>;
}
