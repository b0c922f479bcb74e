//! Verifix - container-driven smart contract security analysis
//!
//! Runs third-party analysis tools in isolated containers, normalizes their
//! reports into one issue model and drives an analyze, patch, re-analyze
//! loop until nothing at or above a severity floor remains.
//!
//! ```rust,ignore
//! use verifix::{Engine, init_tracing};
//!
//! let engine = Engine::load()?;
//! init_tracing(&engine.config().logging)?;
//!
//! let result = engine.analyze(source, "Bank").await;
//! let session = engine.run_fix_loop(source, "Bank", None, patcher).await;
//! ```

mod app;

pub use app::{Engine, EngineError};
pub use verifix_core::domain::{
    AnalysisResult, FixAttempt, FixSession, SecurityIssue, Severity, StopReason, ToolConfig,
};
pub use verifix_core::{Config, init_tracing};
pub use verifix_orchestrator::{PatchError, PatchService};

// Re-export for convenience
pub use verifix_core;
pub use verifix_orchestrator;
pub use verifix_parsers;
pub use verifix_sandbox;
