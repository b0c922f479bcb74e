//! Configuration management

pub mod validation;

pub use validation::{Validate, ValidationError};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::Severity;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub container: ContainerConfig,
    pub analysis: AnalysisConfig,
    pub fix_loop: FixLoopConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// `json`, `pretty` or `compact`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Container runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Docker-compatible CLI (`docker`, `podman`, or an absolute path)
    pub docker_binary: String,
    /// Where the working area is mounted inside every container
    pub mount_point: String,
    /// File name the source snapshot is written under
    pub source_filename: String,
    pub network_mode: String,
    pub memory_limit_bytes: Option<u64>,
    pub cpu_limit: Option<f64>,
    /// Upper bound for auxiliary runtime commands (pull, logs, cp, rm)
    pub command_timeout_secs: u64,
    /// Grace period given to `stop` before the container is killed
    pub stop_grace_secs: u64,
    pub pull_missing_images: bool,
    /// Extra environment passed to every tool container
    pub environment: BTreeMap<String, String>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        let environment = [
            ("SOLC_SELECT_DISABLED", "1"),
            ("MYTHRIL_DISABLE_SOLC_DOWNLOAD", "1"),
            ("SOLC_VERSION", "0.8.20"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            docker_binary: "docker".to_string(),
            mount_point: "/sb".to_string(),
            source_filename: "contract.sol".to_string(),
            network_mode: "bridge".to_string(),
            memory_limit_bytes: None,
            cpu_limit: None,
            command_timeout_secs: 60,
            stop_grace_secs: 10,
            pull_missing_images: true,
            environment,
        }
    }
}

impl ContainerConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

/// Analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Directory of `<id>/config.yaml` declarations overlaying the built-in catalog
    pub tools_dir: Option<PathBuf>,
    pub default_tools: Vec<String>,
    pub tool_timeout_secs: u64,
    pub max_concurrent_tools: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            tools_dir: None,
            default_tools: ["slither", "mythril", "semgrep", "solhint"]
                .into_iter()
                .map(String::from)
                .collect(),
            tool_timeout_secs: 120,
            max_concurrent_tools: 4,
        }
    }
}

impl AnalysisConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Fix-verify loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixLoopConfig {
    pub max_iterations: u32,
    /// Issues at or above this severity are sent to the patch service
    #[serde(deserialize_with = "severity_any_case")]
    pub severity_floor: Severity,
    /// Run the initial analysis only, never patch
    pub analysis_only: bool,
}

impl Default for FixLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2,
            severity_floor: Severity::High,
            analysis_only: false,
        }
    }
}

const SEVERITY_NAMES: &[&str] = &["CRITICAL", "HIGH", "MEDIUM", "LOW", "INFO"];

/// Severity names in any letter case, so `VERIFIX__FIX_LOOP__SEVERITY_FLOOR=high` loads
fn severity_any_case<'de, D>(deserializer: D) -> Result<Severity, D::Error>
where
    D: Deserializer<'de>,
{
    let label = String::deserialize(deserializer)?;
    Severity::ALL
        .into_iter()
        .find(|severity| severity.as_str().eq_ignore_ascii_case(label.trim()))
        .ok_or_else(|| serde::de::Error::unknown_variant(&label, SEVERITY_NAMES))
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        self.logging.validate()?;
        self.container.validate()?;
        self.analysis.validate()?;
        self.fix_loop.validate()?;
        Ok(())
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::load_from(Path::new("."))
    }

    /// Load configuration rooted at `base` (expects an optional `config/` directory)
    pub fn load_from(base: &Path) -> Result<Self, ConfigLoadError> {
        let config_dir = base.join("config");
        let file = |name: &str| {
            config::File::with_name(&config_dir.join(name).to_string_lossy()).required(false)
        };

        let mut builder = config::Config::builder().add_source(file("default"));

        // Add environment-specific config if ENV is set
        if let Ok(env) = std::env::var("ENV") {
            builder = builder.add_source(file(&env));
        }

        // Add local config and environment variables last (highest priority)
        builder = builder.add_source(file("local")).add_source(
            config::Environment::with_prefix("VERIFIX")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("analysis.default_tools")
                .try_parsing(true),
        );

        let config: Config = builder.build()?.try_deserialize()?;

        // Validate the loaded configuration
        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}
