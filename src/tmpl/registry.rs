//! File-backed registry watch/resolve engine.
//!
//! The service registry is observed through a snapshot file that an external
//! agent keeps current (one JSON document mapping service names to their
//! instances). [`RegistryEngine`] watches that file with a debounced
//! filesystem watcher and resolves templates against the latest snapshot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{watch, Mutex};
use tracing::{debug, trace, warn};

use super::{RenderEvent, ResolveError, Resolver, Template, WatchSubscription, Watcher};

/// One registered service instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A point-in-time view of the registry.
///
/// Service names map to their current instances. A name that is absent has
/// not been populated yet, which is different from a name mapped to an
/// empty instance list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub services: BTreeMap<String, Vec<ServiceInstance>>,
}

impl RegistrySnapshot {
    /// Load a snapshot from disk; `Ok(None)` when the file does not exist yet
    pub async fn load(path: &Path) -> Result<Option<Self>, ResolveError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let snapshot = serde_json::from_slice(&bytes)?;
                Ok(Some(snapshot))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Template handle that renders registry data into a task workspace.
///
/// Rendered bytes land in `services.auto.tfvars.json` inside the workspace.
/// A rewrite with byte-identical contents is skipped so file mtimes only
/// move on real changes; whether the *change* is a semantic no-op stays the
/// driver's problem.
pub struct WorkspaceTemplate {
    task_name: String,
    services: Vec<String>,
    dest: PathBuf,
    last_hash: Mutex<Option<String>>,
}

impl WorkspaceTemplate {
    pub fn new(task_name: impl Into<String>, services: Vec<String>, workspace: &Path) -> Self {
        Self {
            task_name: task_name.into(),
            services,
            dest: workspace.join("services.auto.tfvars.json"),
            last_hash: Mutex::new(None),
        }
    }

    /// Destination file inside the workspace
    pub fn dest(&self) -> &Path {
        &self.dest
    }
}

fn content_hash(contents: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents);
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl Template for WorkspaceTemplate {
    fn id(&self) -> &str {
        &self.task_name
    }

    fn services(&self) -> &[String] {
        &self.services
    }

    async fn render(&self, contents: &[u8]) -> Result<(), ResolveError> {
        let hash = content_hash(contents);

        let mut last = self.last_hash.lock().await;
        if last.as_deref() == Some(hash.as_str()) {
            debug!(template = %self.task_name, %hash, "rendered contents unchanged, skipping write");
            return Ok(());
        }

        tokio::fs::write(&self.dest, contents)
            .await
            .map_err(|e| ResolveError::Render {
                template: self.task_name.clone(),
                message: format!("write {}: {}", self.dest.display(), e),
            })?;
        *last = Some(hash);

        debug!(template = %self.task_name, dest = %self.dest.display(), "template rendered");
        Ok(())
    }
}

/// Watch/resolve engine over a registry snapshot file.
///
/// Implements both [`Watcher`] (debounced change subscriptions) and
/// [`Resolver`] (one evaluation step against the current snapshot).
/// Each debounced filesystem event bumps a version counter that every
/// subscription tracks independently, so a change that fires while a unit
/// is mid-cycle is seen by that unit's next wait instead of being lost.
pub struct RegistryEngine {
    snapshot_path: PathBuf,
    version: watch::Sender<u64>,
    // Held so the filesystem watch stays registered for our lifetime
    _debouncer: std::sync::Mutex<Debouncer<notify::RecommendedWatcher>>,
}

impl RegistryEngine {
    /// Start watching the snapshot file's directory.
    ///
    /// The parent directory is watched rather than the file itself so that
    /// atomic rename-into-place updates are observed.
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Result<Self, ResolveError> {
        let snapshot_path = snapshot_path.into();
        let (version, _) = watch::channel(0u64);

        let notifier = version.clone();
        let mut debouncer = new_debouncer(
            Duration::from_millis(250),
            move |res: DebounceEventResult| match res {
                Ok(_events) => notifier.send_modify(|v| *v += 1),
                Err(e) => warn!("registry watch error: {}", e),
            },
        )
        .map_err(|e| ResolveError::SnapshotUnavailable(e.to_string()))?;

        let watch_dir = snapshot_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        debouncer
            .watcher()
            .watch(watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| ResolveError::SnapshotUnavailable(e.to_string()))?;

        debug!(path = %snapshot_path.display(), "watching registry snapshot");

        Ok(Self {
            snapshot_path,
            version,
            _debouncer: std::sync::Mutex::new(debouncer),
        })
    }

    /// Path of the snapshot file being watched
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }
}

impl Watcher for RegistryEngine {
    fn subscribe(&self) -> WatchSubscription {
        WatchSubscription::new(self.version.subscribe())
    }
}

#[async_trait]
impl Resolver for RegistryEngine {
    async fn resolve(&self, template: &dyn Template) -> Result<RenderEvent, ResolveError> {
        let Some(snapshot) = RegistrySnapshot::load(&self.snapshot_path).await? else {
            trace!(template = %template.id(), "registry snapshot not present yet");
            return Ok(RenderEvent::default());
        };

        let mut selected: BTreeMap<&str, &[ServiceInstance]> = BTreeMap::new();
        for name in template.services() {
            match snapshot.services.get(name) {
                Some(instances) => {
                    selected.insert(name.as_str(), instances.as_slice());
                }
                // Dependency not populated yet: keep waiting.
                None => {
                    trace!(template = %template.id(), service = %name, "dependency pending");
                    return Ok(RenderEvent::default());
                }
            }
        }

        let rendered = serde_json::json!({ "services": selected });
        let contents = serde_json::to_vec_pretty(&rendered)?;

        Ok(RenderEvent {
            complete: true,
            contents,
        })
    }
}
