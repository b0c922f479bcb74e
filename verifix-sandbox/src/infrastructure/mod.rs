//! Container runtime backends

pub mod docker;

pub use docker::DockerCliRuntime;
