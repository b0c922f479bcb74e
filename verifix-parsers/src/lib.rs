//! Verifix Parsers - normalization of analysis tool output
//!
//! Each tool reports in its own format. A [`ToolParser`] turns one tool's raw
//! [`ExecutionOutcome`](verifix_core::domain::ExecutionOutcome) into
//! canonical [`SecurityIssue`](verifix_core::domain::SecurityIssue)s plus
//! residual diagnostics:
//!
//! - `errors`: the tool itself reported a failure
//! - `fails`: the infrastructure around the tool failed (timeout, crash, unparseable output)
//! - `infos`: non-fatal notices
//!
//! # Output shapes
//!
//! | Shape | Tools | Recovery |
//! |-------|-------|----------|
//! | [`OutputShape::ArchiveJson`] | slither | tar member lookup with path variants, then log fallback |
//! | [`OutputShape::StreamJson`] | mythril, semgrep | balanced-brace extraction, control-character escaping |
//! | [`OutputShape::LineGrammar`] | solhint, oyente, smartcheck | per-line or per-block regex grammar |

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::registry::{ParserRegistry, benign_exit_codes, parse_outcome};
pub use domain::{OutputShape, ParseContext, ParseResult, ToolParser};
pub use infrastructure::diagnostics::errors_fails;
pub use infrastructure::json::{JsonRecoveryError, recover_json};
