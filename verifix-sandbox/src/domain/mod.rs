//! Sandbox domain types

pub mod traits;

pub use traits::{ContainerId, ContainerRuntime, ContainerSpec, SandboxError, SandboxResult};
