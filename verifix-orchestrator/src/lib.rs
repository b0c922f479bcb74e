//! Verifix Orchestrator - tool registry, analyzer and fix-verify loop
//!
//! # Components
//!
//! - [`ToolRegistry`]: immutable tool declarations (embedded catalog plus an optional tools directory), alias resolution
//! - [`ToolAnalyzer`]: runs each tool in its own container, routes output to its parser, merges results
//! - [`FixVerifyLoop`]: analyze, patch, re-analyze until nothing above the severity floor remains
//!
//! Per-tool failures never abort an analysis. They surface as marked tool
//! ids (`-partial`, `-failed`, `-error`) and warnings on the
//! [`AnalysisResult`](verifix_core::domain::AnalysisResult).

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::analyzer::ToolAnalyzer;
pub use application::fix_loop::{FixVerifyLoop, LoopSettings, strip_code_fences};
pub use domain::{Analyzer, PatchError, PatchService};
pub use infrastructure::{RegistryError, ToolRegistry};
