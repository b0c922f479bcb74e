//! Seams between the loop, the analyzer and the external patch service

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use verifix_core::domain::{AnalysisResult, SecurityIssue};

/// Runs a tool set against one source snapshot.
///
/// Never fails: per-tool failures and an unreachable runtime are reported
/// inside the returned [`AnalysisResult`].
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        source: &str,
        contract_name: &str,
        tool_ids: &[String],
        timeout: Duration,
    ) -> AnalysisResult;
}

/// External service that rewrites a contract to address a set of issues
#[async_trait]
pub trait PatchService: Send + Sync {
    /// Return the revised source. `generation_metadata` is forwarded untouched.
    async fn patch(
        &self,
        source: &str,
        issues: &[SecurityIssue],
        contract_name: &str,
        generation_metadata: Option<&Value>,
    ) -> Result<String, PatchError>;
}

/// Patch service error
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("Patch service unavailable: {0}")]
    Unavailable(String),

    #[error("Patch service timed out after {0:?}")]
    Timeout(Duration),

    #[error("Patch rejected: {0}")]
    Rejected(String),

    #[error("Other error: {0}")]
    Other(String),
}
