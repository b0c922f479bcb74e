//! Container executor use case
//!
//! Runs one tool invocation against one source snapshot:
//!
//! 1. Materialize a [`WorkArea`] with the source and the tool's helper bundle
//! 2. Render the invocation template
//! 3. Start a container with the work area bind-mounted
//! 4. Wait up to the timeout; a timeout yields `exit_code = None`
//! 5. Collect the log stream and, when declared, the structured-output archive
//! 6. Tear down the container and the work area on every path
//!
//! Runtime failures never escape: they are logged and reported as the empty
//! outcome `(None, [], None)`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use verifix_core::config::ContainerConfig;
use verifix_core::domain::{ExecutionOutcome, ToolConfig};

use crate::application::template::{TemplateContext, render_command};
use crate::application::workspace::{BIN_DIR_NAME, WorkArea};
use crate::domain::traits::{ContainerId, ContainerRuntime, ContainerSpec, SandboxResult};

/// Knobs applied to every container the executor starts
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub mount_point: String,
    pub source_filename: String,
    pub network_mode: String,
    pub user: Option<String>,
    pub environment: BTreeMap<String, String>,
    pub memory_limit_bytes: Option<u64>,
    pub cpu_limit: Option<f64>,
    pub stop_grace: Duration,
    pub pull_missing_images: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from(&ContainerConfig::default())
    }
}

impl From<&ContainerConfig> for ExecutorSettings {
    fn from(config: &ContainerConfig) -> Self {
        Self {
            mount_point: config.mount_point.trim_end_matches('/').to_string(),
            source_filename: config.source_filename.clone(),
            network_mode: config.network_mode.clone(),
            user: Some("root".to_string()),
            environment: config.environment.clone(),
            memory_limit_bytes: config.memory_limit_bytes,
            cpu_limit: config.cpu_limit,
            stop_grace: config.stop_grace(),
            pull_missing_images: config.pull_missing_images,
        }
    }
}

impl ExecutorSettings {
    fn in_container(&self, relative: &str) -> String {
        format!("{}/{}", self.mount_point, relative)
    }
}

/// Executes analysis tools inside isolated containers
pub struct ContainerExecutor {
    runtime: Arc<dyn ContainerRuntime>,
    settings: ExecutorSettings,
}

impl ContainerExecutor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, settings: ExecutorSettings) -> Self {
        Self { runtime, settings }
    }

    /// Get the name of the active runtime backend
    pub fn runtime_name(&self) -> &'static str {
        self.runtime.name()
    }

    /// Check that the container engine answers
    pub async fn ping(&self) -> SandboxResult<()> {
        self.runtime.ping().await
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Run `tool` against `source`, waiting at most `timeout` for it to finish
    #[instrument(skip(self, source, tool), fields(tool = %tool.id, image = %tool.image))]
    pub async fn execute(
        &self,
        source: &str,
        tool: &ToolConfig,
        timeout: Duration,
    ) -> ExecutionOutcome {
        let start = std::time::Instant::now();
        match self.try_execute(source, tool, timeout).await {
            Ok(outcome) => {
                debug!(
                    exit_code = ?outcome.exit_code,
                    log_lines = outcome.log_lines.len(),
                    has_output = outcome.output.is_some(),
                    elapsed = ?start.elapsed(),
                    "Tool container finished"
                );
                outcome
            }
            Err(e) => {
                warn!(error = %e, "Tool execution failed");
                ExecutionOutcome::empty()
            }
        }
    }

    async fn try_execute(
        &self,
        source: &str,
        tool: &ToolConfig,
        timeout: Duration,
    ) -> SandboxResult<ExecutionOutcome> {
        let work_area = WorkArea::create(source, &self.settings.source_filename, tool.bin.as_deref())?;

        let command = render_command(
            &tool.command,
            &TemplateContext {
                filename: self.settings.in_container(&self.settings.source_filename),
                timeout,
                bin_dir: self.settings.in_container(BIN_DIR_NAME),
            },
        );
        debug!(command = %command, "Rendered invocation");

        if self.settings.pull_missing_images {
            self.runtime.ensure_image(&tool.image).await?;
        }

        let spec = ContainerSpec {
            name: format!("verifix-{}-{}", sanitize_name(&tool.id), Uuid::new_v4().simple()),
            image: tool.image.clone(),
            command: vec!["/bin/sh".to_string(), "-c".to_string(), command],
            host_dir: work_area.path().to_path_buf(),
            mount_point: self.settings.mount_point.clone(),
            working_dir: self.settings.mount_point.clone(),
            user: self.settings.user.clone(),
            network_mode: self.settings.network_mode.clone(),
            environment: self.settings.environment.clone(),
            memory_limit_bytes: self.settings.memory_limit_bytes,
            cpu_limit: self.settings.cpu_limit,
        };

        // a failed or cancelled `start` can leave a created container behind,
        // reachable only through its name until the id is known
        let mut guard = ContainerGuard::new(
            Arc::clone(&self.runtime),
            ContainerId(spec.name.clone()),
        );
        let id = match self.runtime.start(&spec).await {
            Ok(id) => id,
            Err(e) => {
                guard.teardown().await;
                return Err(e);
            }
        };
        info!(container = %id, "Started tool container");
        guard.retarget(id.clone());

        let collected = self.collect(&id, tool, timeout).await;
        guard.teardown().await;
        drop(work_area);

        collected
    }

    async fn collect(
        &self,
        id: &ContainerId,
        tool: &ToolConfig,
        timeout: Duration,
    ) -> SandboxResult<ExecutionOutcome> {
        let exit_code = self.runtime.wait(id, timeout).await?;
        if exit_code.is_none() {
            warn!(container = %id, timeout = ?timeout, "Tool timed out, stopping container");
            if let Err(e) = self.runtime.stop(id, self.settings.stop_grace).await {
                warn!(container = %id, error = %e, "Failed to stop timed-out container");
            }
        }

        let log_lines = ExecutionOutcome::lines_from_bytes(&self.runtime.logs(id).await?);

        let output = match tool.output.as_deref() {
            Some(path) => {
                let archive = self.runtime.copy_out(id, path).await?;
                if archive.is_none() {
                    debug!(container = %id, path, "Declared output path not present");
                }
                archive
            }
            None => None,
        };

        Ok(ExecutionOutcome::new(exit_code, log_lines, output))
    }
}

/// Container names only allow `[a-zA-Z0-9_.-]`
fn sanitize_name(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Removes the container when dropped before an explicit teardown.
///
/// Armed with the container name before `start` and retargeted to the id once
/// known. If the executing future is cancelled before teardown, removal is
/// spawned onto the current runtime.
struct ContainerGuard {
    runtime: Arc<dyn ContainerRuntime>,
    id: ContainerId,
    armed: bool,
}

impl ContainerGuard {
    fn new(runtime: Arc<dyn ContainerRuntime>, id: ContainerId) -> Self {
        Self {
            runtime,
            id,
            armed: true,
        }
    }

    fn retarget(&mut self, id: ContainerId) {
        self.id = id;
    }

    async fn teardown(&mut self) {
        self.armed = false;
        match self.runtime.remove(&self.id).await {
            Ok(()) => debug!(container = %self.id, "Removed tool container"),
            Err(e) => warn!(container = %self.id, error = %e, "Failed to remove tool container"),
        }
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let runtime = Arc::clone(&self.runtime);
        let id = self.id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = runtime.remove(&id).await {
                        warn!(container = %id, error = %e, "Deferred container removal failed");
                    }
                });
            }
            Err(_) => warn!(container = %id, "No runtime available to remove abandoned container"),
        }
    }
}
