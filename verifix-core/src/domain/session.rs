//! Result of a complete fix-verify session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::AnalysisResult;

/// One completed analyze, patch, re-analyze round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixAttempt {
    pub iteration: u32,
    /// Issues at or above the severity floor before the patch
    pub issues_before: usize,
    /// Issues at or above the severity floor after the patch
    pub issues_after: usize,
    pub total_before: usize,
    pub total_after: usize,
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The first analysis produced no result at all
    InitialAnalysisFailed,
    /// Patching was disabled for this session
    AnalysisOnly,
    /// No issue at or above the severity floor remains
    Converged,
    /// The iteration budget ran out
    BudgetExhausted,
    /// The patch service returned the source unchanged
    NoProgress,
    /// The patch service failed; treated like an unchanged source
    PatchFailed,
    /// Re-analysis of a patched source failed; the patch was discarded
    ReanalysisFailed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            StopReason::InitialAnalysisFailed => "initial analysis failed",
            StopReason::AnalysisOnly => "analysis only",
            StopReason::Converged => "converged",
            StopReason::BudgetExhausted => "iteration budget exhausted",
            StopReason::NoProgress => "patch made no progress",
            StopReason::PatchFailed => "patch service failed",
            StopReason::ReanalysisFailed => "re-analysis failed",
        };
        f.write_str(text)
    }
}

/// Output of the iterative loop. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixSession {
    pub session_id: Uuid,
    pub contract_name: String,
    pub original_source: String,
    pub final_source: String,
    pub iterations: u32,
    pub initial_analysis: AnalysisResult,
    pub final_analysis: Option<AnalysisResult>,
    pub fix_attempts: Vec<FixAttempt>,
    /// `len(initial.issues) - len(final.issues)`; negative when patches added issues
    pub issues_resolved: i64,
    pub stop_reason: StopReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_metadata: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl FixSession {
    pub fn issues_resolved_between(
        initial: &AnalysisResult,
        final_analysis: Option<&AnalysisResult>,
    ) -> i64 {
        match final_analysis {
            Some(last) => initial.issues.len() as i64 - last.issues.len() as i64,
            None => 0,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }

    /// True when the final analysis has nothing at or above HIGH
    pub fn is_clean(&self) -> bool {
        self.final_analysis
            .as_ref()
            .is_some_and(|analysis| analysis.success && analysis.get_critical_high().is_empty())
    }
}
