//! Docker-compatible CLI backend
//!
//! Drives `docker` (or `podman`, which accepts the same verbs) through
//! `tokio::process`. Every invocation carries its own timeout and is killed
//! if the awaiting future is dropped.

use std::ffi::OsString;
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use verifix_core::config::ContainerConfig;

use crate::domain::traits::{
    ContainerId, ContainerRuntime, ContainerSpec, SandboxError, SandboxResult,
};

/// Default budget for `pull`, which can legitimately take minutes
const DEFAULT_PULL_TIMEOUT_SECS: u64 = 600;

/// Stderr fragments meaning "that path is not in the container"
const MISSING_PATH_MARKERS: [&str; 3] = [
    "No such container:path",
    "Could not find the file",
    "no such file or directory",
];

/// Container runtime backed by the Docker CLI
pub struct DockerCliRuntime {
    binary: String,
    command_timeout: Duration,
    pull_timeout: Duration,
}

impl DockerCliRuntime {
    pub fn new(binary: impl Into<String>, command_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            command_timeout,
            pull_timeout: Duration::from_secs(DEFAULT_PULL_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &ContainerConfig) -> Self {
        Self::new(config.docker_binary.clone(), config.command_timeout())
    }

    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }

    /// Check whether the CLI binary can be found at all
    pub fn is_installed(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    /// Run one CLI command, returning its output whatever the exit status
    async fn output(&self, args: &[OsString], timeout: Duration) -> SandboxResult<Output> {
        let command_line = self.display(args);
        debug!(command = %command_line, "Running runtime command");

        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SandboxError::RuntimeUnavailable(format!("'{}' not found: {}", self.binary, e))
                } else {
                    SandboxError::Io(e)
                }
            })?;

        tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| SandboxError::CommandTimeout {
                command: command_line,
                timeout,
            })?
            .map_err(SandboxError::from)
    }

    /// Run one CLI command and require a zero exit status
    async fn checked(&self, args: &[OsString], timeout: Duration) -> SandboxResult<Output> {
        let output = self.output(args, timeout).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(SandboxError::CommandFailed {
                command: self.display(args),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn display(&self, args: &[OsString]) -> String {
        // the trailing `sh -c` payload can be long; only show the verb and first operands
        let shown: Vec<_> = args.iter().take(3).map(|a| a.to_string_lossy()).collect();
        format!("{} {}", self.binary, shown.join(" "))
    }

    /// Arguments for `run -d` from a container spec
    fn run_args(spec: &ContainerSpec) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            spec.name.clone().into(),
            "--network".into(),
            spec.network_mode.clone().into(),
            "-v".into(),
            {
                let mut volume = spec.host_dir.clone().into_os_string();
                volume.push(format!(":{}:rw", spec.mount_point));
                volume
            },
            "-w".into(),
            spec.working_dir.clone().into(),
        ];

        if let Some(user) = &spec.user {
            args.push("--user".into());
            args.push(user.clone().into());
        }
        for (key, value) in &spec.environment {
            args.push("-e".into());
            args.push(format!("{key}={value}").into());
        }
        if let Some(bytes) = spec.memory_limit_bytes {
            args.push("--memory".into());
            args.push(bytes.to_string().into());
        }
        if let Some(cpus) = spec.cpu_limit {
            args.push("--cpus".into());
            args.push(cpus.to_string().into());
        }

        args.push(spec.image.clone().into());
        args.extend(spec.command.iter().map(OsString::from));
        args
    }
}

fn os_args<const N: usize>(args: [&str; N]) -> Vec<OsString> {
    args.into_iter().map(OsString::from).collect()
}

#[async_trait]
impl ContainerRuntime for DockerCliRuntime {
    fn name(&self) -> &'static str {
        "docker-cli"
    }

    async fn ping(&self) -> SandboxResult<()> {
        if !self.is_installed() {
            return Err(SandboxError::RuntimeUnavailable(format!(
                "'{}' is not installed or not on PATH",
                self.binary
            )));
        }
        self.checked(
            &os_args(["version", "--format", "{{.Server.Version}}"]),
            self.command_timeout,
        )
        .await
        .map(|output| {
            debug!(
                server_version = %String::from_utf8_lossy(&output.stdout).trim(),
                "Container engine reachable"
            );
        })
        .map_err(|e| SandboxError::RuntimeUnavailable(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn ensure_image(&self, image: &str) -> SandboxResult<()> {
        let inspect = self
            .output(&os_args(["image", "inspect", image]), self.command_timeout)
            .await?;
        if inspect.status.success() {
            return Ok(());
        }

        info!(image, "Pulling image");
        self.checked(&os_args(["pull", image]), self.pull_timeout)
            .await
            .map(|_| ())
            .map_err(|e| SandboxError::ImageUnavailable {
                image: image.to_string(),
                reason: e.to_string(),
            })
    }

    async fn start(&self, spec: &ContainerSpec) -> SandboxResult<ContainerId> {
        let output = self
            .checked(&Self::run_args(spec), self.command_timeout)
            .await
            .map_err(|e| SandboxError::CreationFailed(e.to_string()))?;
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            return Err(SandboxError::UnexpectedResponse(
                "`run -d` printed no container id".to_string(),
            ));
        }
        Ok(ContainerId(id))
    }

    async fn wait(&self, id: &ContainerId, timeout: Duration) -> SandboxResult<Option<i32>> {
        let args = os_args(["wait", &id.0]);
        let output = match self.checked(&args, timeout).await {
            Ok(output) => output,
            Err(SandboxError::CommandTimeout { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let text = String::from_utf8_lossy(&output.stdout);
        text.trim()
            .lines()
            .last()
            .and_then(|line| line.trim().parse::<i32>().ok())
            .map(Some)
            .ok_or_else(|| {
                SandboxError::UnexpectedResponse(format!("`wait` printed '{}'", text.trim()))
            })
    }

    async fn stop(&self, id: &ContainerId, grace: Duration) -> SandboxResult<()> {
        let grace_secs = grace.as_secs().to_string();
        self.checked(
            &os_args(["stop", "-t", &grace_secs, &id.0]),
            self.command_timeout + grace,
        )
        .await
        .map(|_| ())
    }

    async fn logs(&self, id: &ContainerId) -> SandboxResult<Vec<u8>> {
        let output = self
            .checked(&os_args(["logs", &id.0]), self.command_timeout)
            .await?;
        // `logs` replays the container's stderr on our stderr
        let mut combined = output.stdout;
        if !output.stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with(b"\n") {
                combined.push(b'\n');
            }
            combined.extend_from_slice(&output.stderr);
        }
        Ok(combined)
    }

    async fn copy_out(&self, id: &ContainerId, path: &str) -> SandboxResult<Option<Vec<u8>>> {
        let source = format!("{}:{}", id.0, path);
        let args = os_args(["cp", &source, "-"]);
        let output = self.output(&args, self.command_timeout).await?;
        if output.status.success() {
            return Ok(Some(output.stdout));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if MISSING_PATH_MARKERS
            .iter()
            .any(|marker| stderr.contains(marker))
        {
            return Ok(None);
        }
        Err(SandboxError::CommandFailed {
            command: self.display(&args),
            stderr: stderr.trim().to_string(),
        })
    }

    async fn remove(&self, id: &ContainerId) -> SandboxResult<()> {
        let output = self
            .output(&os_args(["rm", "-f", &id.0]), self.command_timeout)
            .await?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() || stderr.contains("No such container") {
            Ok(())
        } else {
            Err(SandboxError::CommandFailed {
                command: format!("{} rm -f {}", self.binary, id),
                stderr: stderr.trim().to_string(),
            })
        }
    }
}
