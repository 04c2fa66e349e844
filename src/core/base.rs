//! Controller bootstrap.
//!
//! Turns validated configuration into runnable units and initializes every
//! driver before any watch/render/apply cycle starts. Any failure here
//! aborts startup; recovery is a process restart.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::domain::Task;
use crate::driver::{Driver, GeneratedFile, TerraformDriver};
use crate::tmpl::{RegistryEngine, Resolver, Watcher, WorkspaceTemplate};

use super::store::EventStore;
use super::unit::Unit;
use super::ControllerError;

/// Builds one driver per task; injectable for tests
pub type DriverFactory =
    Box<dyn Fn(&Task, Vec<GeneratedFile>) -> Box<dyn Driver> + Send + Sync>;

/// Supplies the generated workspace files for a task; injectable for tests
pub type FileSource = Box<dyn Fn(&Task) -> std::io::Result<Vec<GeneratedFile>> + Send + Sync>;

/// Shared bootstrap for both controller variants
pub struct BaseController {
    pub(crate) tasks: Vec<Task>,
    pub(crate) workspace_root: PathBuf,
    pub(crate) overwrite_generated: bool,
    pub(crate) watcher: Arc<dyn Watcher>,
    pub(crate) resolver: Arc<dyn Resolver>,
    pub(crate) store: Arc<EventStore>,
    pub(crate) driver_factory: DriverFactory,
    pub(crate) file_source: FileSource,
    pub(crate) units: Vec<Unit>,
}

impl BaseController {
    /// Wire up the real collaborators from finalized configuration
    pub fn new(config: &Config) -> Result<Self, ControllerError> {
        let engine = Arc::new(
            RegistryEngine::new(&config.registry_snapshot)
                .map_err(|e| ControllerError::Init(format!("could not watch registry: {}", e)))?,
        );

        let settings = config.terraform.clone();
        let driver_factory: DriverFactory = Box::new(move |task, files| {
            Box::new(TerraformDriver::new(settings.clone(), &task.name, files))
        });

        let store = match config.event_retention {
            Some(n) => EventStore::with_retention(n),
            None => EventStore::new(),
        };

        Ok(Self {
            tasks: config.tasks.clone(),
            workspace_root: config.terraform.working_dir.clone(),
            overwrite_generated: config.overwrite_generated,
            watcher: engine.clone(),
            resolver: engine,
            store: Arc::new(store),
            driver_factory,
            file_source: Box::new(|task| Ok(default_task_files(task))),
            units: Vec::new(),
        })
    }

    /// Construct a controller from explicit collaborators.
    ///
    /// This is the seam the integration tests use to substitute mock
    /// drivers, watchers, and resolvers.
    #[allow(clippy::too_many_arguments)]
    pub fn with_collaborators(
        tasks: Vec<Task>,
        workspace_root: PathBuf,
        overwrite_generated: bool,
        watcher: Arc<dyn Watcher>,
        resolver: Arc<dyn Resolver>,
        store: Arc<EventStore>,
        driver_factory: DriverFactory,
        file_source: FileSource,
    ) -> Self {
        Self {
            tasks,
            workspace_root,
            overwrite_generated,
            watcher,
            resolver,
            store,
            driver_factory,
            file_source,
            units: Vec::new(),
        }
    }

    /// The shared event store
    pub fn store(&self) -> Arc<EventStore> {
        Arc::clone(&self.store)
    }

    /// Build one unit per task and run every driver's init chain.
    ///
    /// Workspaces are materialized on disk here and owned by their drivers
    /// from then on.
    pub async fn init(&mut self) -> Result<(), ControllerError> {
        info!(tasks = self.tasks.len(), "initializing units");

        for task in &self.tasks {
            let files = (self.file_source)(task).map_err(|e| {
                ControllerError::Init(format!(
                    "could not generate files for task {}: {}",
                    task.name, e
                ))
            })?;

            let mut driver = (self.driver_factory)(task, files);

            driver.init().await.map_err(|e| {
                ControllerError::Init(format!("driver init failed for task {}: {}", task.name, e))
            })?;
            driver
                .init_task(self.overwrite_generated)
                .await
                .map_err(|e| {
                    ControllerError::Init(format!(
                        "task init failed for task {}: {}",
                        task.name, e
                    ))
                })?;
            driver.init_worker().await.map_err(|e| {
                ControllerError::Init(format!(
                    "worker init failed for task {}: {}",
                    task.name, e
                ))
            })?;

            let workspace = self.workspace_root.join(&task.name);
            let template = Box::new(WorkspaceTemplate::new(
                &task.name,
                task.services.clone(),
                &workspace,
            ));

            debug!(task = %task.name, workspace = %workspace.display(), "unit ready");
            self.units.push(Unit::new(task.clone(), template, driver));
        }

        Ok(())
    }
}

/// Default file-generation collaborator: a module stub wiring the rendered
/// registry variables into the task's module source.
pub fn default_task_files(task: &Task) -> Vec<GeneratedFile> {
    let module_label = task.name.replace('-', "_");
    let version = task
        .version
        .as_deref()
        .map(|v| format!("  version  = \"{}\"\n", v))
        .unwrap_or_default();

    let main_tf = format!(
        r#"# Generated for task "{name}". Do not edit by hand.

variable "services" {{
  description = "Current registry state, rendered on change"
  type        = any
  default     = {{}}
}}

module "{label}" {{
  source   = "{source}"
{version}  services = var.services
}}
"#,
        name = task.name,
        label = module_label,
        source = task.source,
        version = version,
    );

    vec![GeneratedFile {
        name: "main.tf".to_string(),
        contents: main_tf.into_bytes(),
    }]
}
