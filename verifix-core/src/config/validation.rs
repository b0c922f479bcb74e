//! Configuration validation module

use crate::config::{AnalysisConfig, ContainerConfig, FixLoopConfig, LoggingConfig};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Logging configuration error: {message}")]
    Logging { message: String },

    #[error("Container configuration error: {message}")]
    Container { message: String },

    #[error("Analysis configuration error: {message}")]
    Analysis { message: String },

    #[error("Fix loop configuration error: {message}")]
    FixLoop { message: String },
}

impl ValidationError {
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }

    pub fn container(message: impl Into<String>) -> Self {
        Self::Container {
            message: message.into(),
        }
    }

    pub fn analysis(message: impl Into<String>) -> Self {
        Self::Analysis {
            message: message.into(),
        }
    }

    pub fn fix_loop(message: impl Into<String>) -> Self {
        Self::FixLoop {
            message: message.into(),
        }
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.format.as_str() {
            "json" | "pretty" | "compact" => {}
            other => {
                return Err(ValidationError::logging(format!(
                    "unknown log format '{}' (expected json, pretty or compact)",
                    other
                )));
            }
        }
        if self.level.trim().is_empty() {
            return Err(ValidationError::logging("log level cannot be empty"));
        }
        Ok(())
    }
}

impl Validate for ContainerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.docker_binary.trim().is_empty() {
            return Err(ValidationError::container("docker_binary cannot be empty"));
        }
        if !self.mount_point.starts_with('/') {
            return Err(ValidationError::container(format!(
                "mount_point must be an absolute container path, got '{}'",
                self.mount_point
            )));
        }
        if self.source_filename.is_empty() || self.source_filename.contains('/') {
            return Err(ValidationError::container(
                "source_filename must be a bare file name",
            ));
        }
        if self.command_timeout_secs == 0 {
            return Err(ValidationError::container("command_timeout_secs must be > 0"));
        }
        if self.cpu_limit.is_some_and(|cpus| cpus <= 0.0) {
            return Err(ValidationError::container("cpu_limit must be > 0"));
        }
        if self.memory_limit_bytes == Some(0) {
            return Err(ValidationError::container("memory_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

impl Validate for AnalysisConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.tool_timeout_secs == 0 {
            return Err(ValidationError::analysis("tool_timeout_secs must be > 0"));
        }
        if self.max_concurrent_tools == 0 {
            return Err(ValidationError::analysis("max_concurrent_tools must be > 0"));
        }
        if self.default_tools.iter().any(|id| id.trim().is_empty()) {
            return Err(ValidationError::analysis("default_tools contains an empty id"));
        }
        Ok(())
    }
}

impl Validate for FixLoopConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        // CRITICAL and HIGH must always qualify for remediation
        if self.severity_floor == crate::domain::Severity::Critical {
            return Err(ValidationError::fix_loop(
                "severity_floor must include HIGH (use HIGH or a lower severity)",
            ));
        }
        Ok(())
    }
}
