//! Terraform CLI driver.
//!
//! Shells out to the `terraform` binary in the task's workspace directory.
//! One driver instance per task; the workspace is created by `init_task`
//! and owned by the driver from then on.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use super::{Driver, DriverError, GeneratedFile};

/// Environment variable selecting the Terraform workspace
const WORKSPACE_ENV: &str = "TF_WORKSPACE";

/// Default per-command timeout
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 600;

/// Settings shared by every Terraform driver instance
#[derive(Debug, Clone)]
pub struct TerraformSettings {
    /// Path to the terraform binary
    pub bin_path: String,

    /// Directory under which task workspaces are created
    pub working_dir: PathBuf,

    /// Whether to log backend stdout at info level
    pub log_output: bool,

    /// Per-command timeout in seconds
    pub command_timeout_secs: u64,
}

impl Default for TerraformSettings {
    fn default() -> Self {
        Self {
            bin_path: "terraform".to_string(),
            working_dir: PathBuf::from("."),
            log_output: false,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }
}

/// Driver backend wrapping the Terraform CLI
pub struct TerraformDriver {
    settings: TerraformSettings,
    task_name: String,
    workspace: PathBuf,
    files: Vec<GeneratedFile>,
    env: HashMap<String, String>,
    worker_ready: bool,
}

impl TerraformDriver {
    /// Create a driver for one task.
    ///
    /// `files` are the collaborator-generated workspace contents; the
    /// driver treats them as opaque bytes.
    pub fn new(
        settings: TerraformSettings,
        task_name: impl Into<String>,
        files: Vec<GeneratedFile>,
    ) -> Self {
        let task_name = task_name.into();
        let workspace = settings.working_dir.join(&task_name);
        Self {
            settings,
            task_name,
            workspace,
            files,
            env: HashMap::new(),
            worker_ready: false,
        }
    }

    /// The task workspace directory
    pub fn workspace(&self) -> &PathBuf {
        &self.workspace
    }

    /// Run one terraform subcommand inside the workspace
    async fn run(&self, args: &[&str]) -> Result<(), DriverError> {
        let command = format!("{} {}", self.settings.bin_path, args.join(" "));
        debug!(task = %self.task_name, %command, "running backend command");

        let child = Command::new(&self.settings.bin_path)
            .args(args)
            .current_dir(&self.workspace)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DriverError::BinaryUnavailable {
                path: self.settings.bin_path.clone(),
                message: e.to_string(),
            })?;

        let seconds = self.settings.command_timeout_secs;
        let output = timeout(Duration::from_secs(seconds), child.wait_with_output())
            .await
            .map_err(|_| DriverError::CommandTimeout {
                command: command.clone(),
                seconds,
            })??;

        if self.settings.log_output {
            for line in String::from_utf8_lossy(&output.stdout).lines() {
                info!(task = %self.task_name, "{}", line);
            }
        }

        if !output.status.success() {
            return Err(DriverError::CommandFailed {
                command,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Driver for TerraformDriver {
    async fn init(&mut self) -> Result<(), DriverError> {
        // Verify the binary before any workspace exists; run from the
        // parent working dir since the workspace may not be created yet.
        let output = Command::new(&self.settings.bin_path)
            .arg("version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DriverError::BinaryUnavailable {
                path: self.settings.bin_path.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(DriverError::BinaryUnavailable {
                path: self.settings.bin_path.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(
            task = %self.task_name,
            version = %String::from_utf8_lossy(&output.stdout).lines().next().unwrap_or(""),
            "backend available"
        );
        Ok(())
    }

    async fn init_task(&mut self, force_overwrite: bool) -> Result<(), DriverError> {
        tokio::fs::create_dir_all(&self.workspace).await?;

        for file in &self.files {
            let path = self.workspace.join(&file.name);
            if path.exists() && !force_overwrite {
                debug!(task = %self.task_name, file = %file.name, "keeping existing generated file");
                continue;
            }
            tokio::fs::write(&path, &file.contents).await?;
            debug!(task = %self.task_name, file = %file.name, "wrote generated file");
        }

        Ok(())
    }

    async fn init_worker(&mut self) -> Result<(), DriverError> {
        if !self.workspace.is_dir() {
            return Err(DriverError::Workspace {
                task: self.task_name.clone(),
                message: format!("workspace {} does not exist", self.workspace.display()),
            });
        }

        self.env
            .insert(WORKSPACE_ENV.to_string(), self.task_name.clone());
        self.worker_ready = true;
        Ok(())
    }

    async fn inspect_task(&mut self) -> Result<(), DriverError> {
        self.run(&["plan", "-no-color", "-input=false"]).await
    }

    async fn init_work(&mut self) -> Result<(), DriverError> {
        if !self.worker_ready {
            return Err(DriverError::Workspace {
                task: self.task_name.clone(),
                message: "worker not initialized".to_string(),
            });
        }
        self.run(&["init", "-no-color", "-input=false"]).await
    }

    async fn apply_work(&mut self) -> Result<(), DriverError> {
        self.run(&["apply", "-auto-approve", "-no-color", "-input=false"])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> TerraformSettings {
        TerraformSettings {
            bin_path: "terraform".to_string(),
            working_dir: dir.path().to_path_buf(),
            log_output: false,
            command_timeout_secs: 5,
        }
    }

    fn files() -> Vec<GeneratedFile> {
        vec![GeneratedFile {
            name: "main.tf".to_string(),
            contents: b"# generated".to_vec(),
        }]
    }

    #[tokio::test]
    async fn test_init_task_materializes_workspace() {
        let temp = TempDir::new().unwrap();
        let mut driver = TerraformDriver::new(settings(&temp), "web-lb", files());

        driver.init_task(false).await.unwrap();

        let main_tf = temp.path().join("web-lb").join("main.tf");
        assert_eq!(std::fs::read(&main_tf).unwrap(), b"# generated");
    }

    #[tokio::test]
    async fn test_init_task_respects_existing_files_unless_forced() {
        let temp = TempDir::new().unwrap();
        let mut driver = TerraformDriver::new(settings(&temp), "web-lb", files());

        driver.init_task(false).await.unwrap();
        let main_tf = temp.path().join("web-lb").join("main.tf");
        std::fs::write(&main_tf, b"# hand edited").unwrap();

        driver.init_task(false).await.unwrap();
        assert_eq!(std::fs::read(&main_tf).unwrap(), b"# hand edited");

        driver.init_task(true).await.unwrap();
        assert_eq!(std::fs::read(&main_tf).unwrap(), b"# generated");
    }

    #[tokio::test]
    async fn test_init_worker_requires_workspace() {
        let temp = TempDir::new().unwrap();
        let mut driver = TerraformDriver::new(settings(&temp), "web-lb", files());

        let err = driver.init_worker().await.unwrap_err();
        assert!(matches!(err, DriverError::Workspace { .. }));

        driver.init_task(false).await.unwrap();
        driver.init_worker().await.unwrap();
        assert_eq!(driver.env.get(WORKSPACE_ENV), Some(&"web-lb".to_string()));
    }

    #[tokio::test]
    async fn test_init_fails_for_missing_binary() {
        let temp = TempDir::new().unwrap();
        let mut s = settings(&temp);
        s.bin_path = "/nonexistent/terraform".to_string();
        let mut driver = TerraformDriver::new(s, "web-lb", vec![]);

        let err = driver.init().await.unwrap_err();
        assert!(matches!(err, DriverError::BinaryUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_init_work_requires_worker() {
        let temp = TempDir::new().unwrap();
        let mut driver = TerraformDriver::new(settings(&temp), "web-lb", files());
        driver.init_task(false).await.unwrap();

        let err = driver.init_work().await.unwrap_err();
        assert!(matches!(err, DriverError::Workspace { .. }));
    }
}
