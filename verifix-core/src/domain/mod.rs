//! Domain model shared by every verifix crate

pub mod analysis;
pub mod execution;
pub mod issue;
pub mod session;
pub mod severity;
pub mod tool;

pub use analysis::{AnalysisResult, AnalysisSummary, SeverityCounts, ToolRunStatus};
pub use execution::ExecutionOutcome;
pub use issue::{IssueSignature, Location, SecurityIssue};
pub use session::{FixAttempt, FixSession, StopReason};
pub use severity::Severity;
pub use tool::ToolConfig;
