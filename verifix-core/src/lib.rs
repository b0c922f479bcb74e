//! Verifix Core - shared foundation for the verifix analysis engine
//!
//! # Modules
//!
//! - [`domain`] - Issue model, severity taxonomy, analysis and session results, tool declarations
//! - [`config`] - Strongly-typed configuration with file and environment variable support
//! - [`logging`] - Structured logging with tracing
//!
//! # Configuration
//!
//! ```rust,ignore
//! use verifix_core::Config;
//!
//! let config = Config::load()?;
//! ```
//!
//! Environment variables use the `VERIFIX__` prefix with double underscore separators:
//!
//! ```bash
//! VERIFIX__CONTAINER__DOCKER_BINARY=podman
//! VERIFIX__ANALYSIS__DEFAULT_TOOLS=slither,solhint
//! VERIFIX__FIX_LOOP__MAX_ITERATIONS=3
//! ```

pub mod config;
pub mod domain;
pub mod logging;

pub use config::Config;
pub use domain::{
    AnalysisResult, FixAttempt, FixSession, SecurityIssue, Severity, StopReason, ToolConfig,
};
pub use logging::init_tracing;
