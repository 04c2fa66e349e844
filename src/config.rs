//! Configuration for driftsync.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (DRIFTSYNC_CONFIG, DRIFTSYNC_HOME)
//! 2. Config file (driftsync.yaml)
//! 3. Defaults (~/.driftsync)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::Task;
use crate::driver::TerraformSettings;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub registry: RegistryConfig,

    #[serde(default)]
    pub driver: DriverConfig,

    pub tasks: Vec<Task>,

    /// Events retained per task
    #[serde(default)]
    pub event_retention: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Registry snapshot file kept current by an external agent
    pub snapshot_path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub terraform: TerraformConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TerraformConfig {
    /// Path to the terraform binary
    pub path: Option<String>,

    /// Directory under which task workspaces are created
    pub working_dir: Option<PathBuf>,

    /// Log backend stdout at info level
    #[serde(default)]
    pub log: bool,

    /// Per-command timeout in seconds
    pub command_timeout_secs: Option<u64>,

    /// Replace existing generated files during task init
    pub overwrite_generated: Option<bool>,
}

/// Finalized configuration with defaults applied and tasks validated
#[derive(Debug, Clone)]
pub struct Config {
    pub registry_snapshot: PathBuf,
    pub terraform: TerraformSettings,
    pub overwrite_generated: bool,
    pub tasks: Vec<Task>,
    pub event_retention: Option<usize>,
}

impl Config {
    /// Load and finalize configuration from a YAML file.
    ///
    /// Falls back to `$DRIFTSYNC_CONFIG`, then `./driftsync.yaml`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => std::env::var("DRIFTSYNC_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("driftsync.yaml")),
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let file: ConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Self::finalize(file)
    }

    /// Apply defaults and validate the parsed file
    pub fn finalize(file: ConfigFile) -> Result<Self> {
        let tf = file.driver.terraform;

        let working_dir = match tf.working_dir {
            Some(dir) => dir,
            None => default_home()?.join("workspaces"),
        };

        let config = Self {
            registry_snapshot: file.registry.snapshot_path,
            terraform: TerraformSettings {
                bin_path: tf.path.unwrap_or_else(|| "terraform".to_string()),
                working_dir,
                log_output: tf.log,
                command_timeout_secs: tf.command_timeout_secs.unwrap_or(600),
            },
            overwrite_generated: tf.overwrite_generated.unwrap_or(true),
            tasks: file.tasks,
            event_retention: file.event_retention,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            anyhow::bail!("no tasks configured");
        }

        let mut seen = std::collections::HashSet::new();
        for task in &self.tasks {
            if task.name.is_empty() {
                anyhow::bail!("task with empty name");
            }
            if !seen.insert(task.name.as_str()) {
                anyhow::bail!("duplicate task name: {}", task.name);
            }
            if task.services.is_empty() {
                anyhow::bail!("task {} watches no services", task.name);
            }
            if task.source.is_empty() {
                anyhow::bail!("task {} has no module source", task.name);
            }
        }
        Ok(())
    }
}

/// The driftsync home directory ($DRIFTSYNC_HOME or ~/.driftsync)
pub fn default_home() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("DRIFTSYNC_HOME") {
        return Ok(PathBuf::from(home));
    }
    Ok(dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".driftsync"))
}
