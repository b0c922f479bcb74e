//! Verifix Sandbox - isolated container execution for analysis tools
//!
//! Each tool invocation gets its own temporary working area and its own
//! container. Both are torn down on every exit path, including timeouts and
//! runtime errors, so long fix-verify sessions cannot leak either.
//!
//! # Architecture
//!
//! | Layer | Type | Role |
//! |-------|------|------|
//! | domain | [`ContainerRuntime`] | Thin async seam over one container engine |
//! | application | [`ContainerExecutor`] | Owns the per-tool lifecycle and its teardown |
//! | infrastructure | [`DockerCliRuntime`] | Docker-compatible CLI backend |
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use verifix_sandbox::{ContainerExecutor, DockerCliRuntime, ExecutorSettings};
//!
//! let runtime = Arc::new(DockerCliRuntime::from_config(&config.container));
//! let executor = ContainerExecutor::new(runtime, ExecutorSettings::from(&config.container));
//!
//! let outcome = executor.execute(source, &tool, Duration::from_secs(120)).await;
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::executor::{ContainerExecutor, ExecutorSettings};
pub use application::template::{TemplateContext, render_command};
pub use application::workspace::WorkArea;
pub use domain::traits::{
    ContainerId, ContainerRuntime, ContainerSpec, SandboxError, SandboxResult,
};
pub use infrastructure::docker::DockerCliRuntime;
