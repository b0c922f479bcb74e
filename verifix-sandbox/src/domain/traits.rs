//! Container runtime trait and error types

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Result type for sandbox operations
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Errors that can occur while driving the container runtime
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The runtime binary is missing or the engine does not answer
    #[error("Container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// Image could not be found locally nor pulled
    #[error("Image '{image}' unavailable: {reason}")]
    ImageUnavailable { image: String, reason: String },

    /// Failed to create or start a container
    #[error("Failed to create container: {0}")]
    CreationFailed(String),

    /// A runtime command exited unsuccessfully
    #[error("Runtime command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// A runtime command exceeded its own time budget
    #[error("Runtime command `{command}` timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    /// The runtime answered with something we could not interpret
    #[error("Unexpected runtime response: {0}")]
    UnexpectedResponse(String),

    /// I/O error while preparing the working area or spawning the runtime
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle of a container: its id, or its name before the id is known
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(pub String);

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // short form, like `docker ps`
        let short = self.0.get(..12).unwrap_or(&self.0);
        f.write_str(short)
    }
}

/// Everything needed to start one tool container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Full argv handed to the image, e.g. `["/bin/sh", "-c", "<command>"]`
    pub command: Vec<String>,
    /// Host directory bind-mounted read-write at `mount_point`
    pub host_dir: PathBuf,
    pub mount_point: String,
    pub working_dir: String,
    pub user: Option<String>,
    pub network_mode: String,
    pub environment: BTreeMap<String, String>,
    pub memory_limit_bytes: Option<u64>,
    pub cpu_limit: Option<f64>,
}

/// Trait for container engine implementations
///
/// Every method maps onto one engine operation so that the executor owns the
/// lifecycle (and its guaranteed teardown) while backends stay thin.
///
/// Note: This trait is dyn-compatible for runtime polymorphism.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Get the backend name for logging/debugging
    fn name(&self) -> &'static str;

    /// Check that the engine is reachable
    async fn ping(&self) -> SandboxResult<()>;

    /// Make sure `image` is present locally, pulling it when missing
    async fn ensure_image(&self, image: &str) -> SandboxResult<()>;

    /// Create and start a detached container
    async fn start(&self, spec: &ContainerSpec) -> SandboxResult<ContainerId>;

    /// Wait for the container to exit. `Ok(None)` means `timeout` elapsed first.
    async fn wait(&self, id: &ContainerId, timeout: Duration) -> SandboxResult<Option<i32>>;

    /// Ask the container to stop, killing it after `grace`
    async fn stop(&self, id: &ContainerId, grace: Duration) -> SandboxResult<()>;

    /// Combined stdout/stderr of the container
    async fn logs(&self, id: &ContainerId) -> SandboxResult<Vec<u8>>;

    /// Tar archive of `path` inside the container, `None` when the path does not exist
    async fn copy_out(&self, id: &ContainerId, path: &str) -> SandboxResult<Option<Vec<u8>>>;

    /// Kill (if still running) and remove the container. Must accept a
    /// container name as well as an id, and treat a missing container as
    /// already removed.
    async fn remove(&self, id: &ContainerId) -> SandboxResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SandboxError::CommandTimeout {
            command: "docker pull".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert!(err.to_string().contains("docker pull"));
        assert!(err.to_string().contains("30"));

        let err = SandboxError::ImageUnavailable {
            image: "smartbugs/slither:0.10.4".to_string(),
            reason: "manifest unknown".to_string(),
        };
        assert!(err.to_string().contains("smartbugs/slither"));
    }

    #[test]
    fn test_container_id_display_is_short() {
        let id = ContainerId("0123456789abcdef0123".to_string());
        assert_eq!(id.to_string(), "0123456789ab");
        assert_eq!(ContainerId("abc".to_string()).to_string(), "abc");
    }
}
