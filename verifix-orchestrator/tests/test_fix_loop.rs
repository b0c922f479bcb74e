//! Fix-verify loop against scripted analyzer and patch service doubles

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use verifix_core::domain::{AnalysisResult, SecurityIssue, Severity, StopReason};
use verifix_orchestrator::{Analyzer, FixVerifyLoop, LoopSettings, PatchError, PatchService};

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Returns queued results in order and records every analyzed source
struct ScriptedAnalyzer {
    results: Mutex<VecDeque<AnalysisResult>>,
    sources: Mutex<Vec<String>>,
}

impl ScriptedAnalyzer {
    fn new(results: Vec<AnalysisResult>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            sources: Mutex::new(Vec::new()),
        })
    }

    async fn sources(&self) -> Vec<String> {
        self.sources.lock().await.clone()
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn analyze(
        &self,
        source: &str,
        contract_name: &str,
        _tool_ids: &[String],
        _timeout: Duration,
    ) -> AnalysisResult {
        self.sources.lock().await.push(source.to_string());
        self.results
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| AnalysisResult::failed(contract_name, "script exhausted"))
    }
}

/// Returns queued replies in order and records what it was asked to fix
struct ScriptedPatcher {
    replies: Mutex<VecDeque<Result<String, PatchError>>>,
    requests: Mutex<Vec<(String, usize, Option<Value>)>>,
}

impl ScriptedPatcher {
    fn new(replies: Vec<Result<String, PatchError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    async fn requests(&self) -> Vec<(String, usize, Option<Value>)> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PatchService for ScriptedPatcher {
    async fn patch(
        &self,
        source: &str,
        issues: &[SecurityIssue],
        _contract_name: &str,
        generation_metadata: Option<&Value>,
    ) -> Result<String, PatchError> {
        self.requests
            .lock()
            .await
            .push((source.to_string(), issues.len(), generation_metadata.cloned()));
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(PatchError::Other("script exhausted".to_string())))
    }
}

fn analysis(severities: &[Severity]) -> AnalysisResult {
    AnalysisResult {
        contract_name: "Bank".to_string(),
        tools_used: vec!["slither".to_string()],
        issues: severities
            .iter()
            .enumerate()
            .map(|(i, s)| {
                SecurityIssue::new("slither", *s, format!("finding-{i}"), "desc")
                    .with_line(i as u32 + 1)
            })
            .collect(),
        success: true,
        error: None,
        warnings: Vec::new(),
    }
}

fn high(n: usize) -> AnalysisResult {
    analysis(&vec![Severity::High; n])
}

fn settings(max_iterations: u32) -> LoopSettings {
    LoopSettings {
        max_iterations,
        severity_floor: Severity::High,
        analysis_only: false,
        tool_ids: vec!["slither".to_string()],
        tool_timeout: Duration::from_secs(5),
    }
}

const SOURCE: &str = "contract Bank { function withdraw() public {} }\n";

// ── Termination ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_zero_budget_returns_initial_as_final() {
    let analyzer = ScriptedAnalyzer::new(vec![high(3)]);
    let patcher = ScriptedPatcher::new(vec![]);
    let fix_loop = FixVerifyLoop::new(analyzer.clone(), patcher.clone(), settings(0));

    let session = fix_loop.run(SOURCE, "Bank", None).await;

    assert_eq!(session.iterations, 0);
    assert_eq!(session.final_analysis.as_ref(), Some(&session.initial_analysis));
    assert_eq!(session.final_source, SOURCE);
    assert_eq!(session.stop_reason, StopReason::BudgetExhausted);
    assert_eq!(session.issues_resolved, 0);
    assert!(patcher.requests().await.is_empty());
}

#[tokio::test]
async fn test_failed_initial_analysis_stops_immediately() {
    let analyzer = ScriptedAnalyzer::new(vec![AnalysisResult::failed("Bank", "runtime down")]);
    let patcher = ScriptedPatcher::new(vec![]);
    let fix_loop = FixVerifyLoop::new(analyzer.clone(), patcher.clone(), settings(3));

    let session = fix_loop.run(SOURCE, "Bank", None).await;

    assert_eq!(session.iterations, 0);
    assert!(session.final_analysis.is_none());
    assert_eq!(session.stop_reason, StopReason::InitialAnalysisFailed);
    assert_eq!(session.issues_resolved, 0);
    assert!(patcher.requests().await.is_empty());
}

#[tokio::test]
async fn test_analysis_only_never_patches() {
    let analyzer = ScriptedAnalyzer::new(vec![high(2)]);
    let patcher = ScriptedPatcher::new(vec![Ok("changed".to_string())]);
    let mut settings = settings(3);
    settings.analysis_only = true;
    let fix_loop = FixVerifyLoop::new(analyzer.clone(), patcher.clone(), settings);

    let session = fix_loop.run(SOURCE, "Bank", None).await;

    assert_eq!(session.stop_reason, StopReason::AnalysisOnly);
    assert_eq!(session.iterations, 0);
    assert_eq!(session.final_analysis.as_ref(), Some(&session.initial_analysis));
    assert!(patcher.requests().await.is_empty());
}

#[tokio::test]
async fn test_nothing_above_floor_converges_without_patching() {
    let analyzer = ScriptedAnalyzer::new(vec![analysis(&[Severity::Medium, Severity::Low])]);
    let patcher = ScriptedPatcher::new(vec![]);
    let fix_loop = FixVerifyLoop::new(analyzer.clone(), patcher.clone(), settings(2));

    let session = fix_loop.run(SOURCE, "Bank", None).await;

    assert_eq!(session.stop_reason, StopReason::Converged);
    assert_eq!(session.iterations, 0);
    assert!(patcher.requests().await.is_empty());
}

#[tokio::test]
async fn test_unchanged_patch_stops_without_reanalysis() {
    // iteration 1 takes 5 issues down to 2, iteration 2 returns its input
    let analyzer = ScriptedAnalyzer::new(vec![high(5), high(2)]);
    let patcher = ScriptedPatcher::new(vec![
        Ok("contract Bank { /* v2 */ }\n".to_string()),
        Ok("contract Bank { /* v2 */ }\n".to_string()),
    ]);
    let fix_loop = FixVerifyLoop::new(analyzer.clone(), patcher.clone(), settings(2));

    let session = fix_loop.run(SOURCE, "Bank", None).await;

    assert_eq!(session.iterations, 1);
    assert_eq!(session.stop_reason, StopReason::NoProgress);
    assert_eq!(session.final_analysis.as_ref().map(|a| a.issues.len()), Some(2));
    assert_eq!(session.issues_resolved, 3);
    assert_eq!(session.final_source, "contract Bank { /* v2 */ }\n");
    assert_eq!(session.fix_attempts.len(), 1);
    assert_eq!(session.fix_attempts[0].iteration, 1);
    assert_eq!(session.fix_attempts[0].issues_before, 5);
    assert_eq!(session.fix_attempts[0].issues_after, 2);

    // initial analysis plus one re-analysis, nothing for the no-op patch
    assert_eq!(analyzer.sources().await.len(), 2);
    assert_eq!(patcher.requests().await.len(), 2);
}

#[tokio::test]
async fn test_fenced_echo_of_source_without_trailing_newline_is_a_no_op() {
    let source = "contract Bank { function withdraw() public {} }";
    let analyzer = ScriptedAnalyzer::new(vec![high(2)]);
    let patcher = ScriptedPatcher::new(vec![Ok(format!("```solidity\n{source}\n```"))]);
    let fix_loop = FixVerifyLoop::new(analyzer.clone(), patcher.clone(), settings(2));

    let session = fix_loop.run(source, "Bank", None).await;

    assert_eq!(session.stop_reason, StopReason::NoProgress);
    assert_eq!(session.iterations, 0);
    assert_eq!(session.final_source, source);
    assert_eq!(analyzer.sources().await.len(), 1);
}

#[tokio::test]
async fn test_budget_bounds_iterations() {
    let analyzer = ScriptedAnalyzer::new(vec![high(4), high(3), high(2), high(1)]);
    let patcher = ScriptedPatcher::new(vec![
        Ok("v1".to_string()),
        Ok("v2".to_string()),
        Ok("v3".to_string()),
    ]);
    let fix_loop = FixVerifyLoop::new(analyzer.clone(), patcher.clone(), settings(2));

    let session = fix_loop.run(SOURCE, "Bank", None).await;

    assert_eq!(session.iterations, 2);
    assert_eq!(session.stop_reason, StopReason::BudgetExhausted);
    assert_eq!(session.final_source, "v2");
    assert_eq!(session.issues_resolved, 2);
    assert_eq!(patcher.requests().await.len(), 2);
}

#[tokio::test]
async fn test_convergence_after_patch() {
    let analyzer = ScriptedAnalyzer::new(vec![
        analysis(&[Severity::Critical, Severity::Low]),
        analysis(&[Severity::Low]),
    ]);
    let patcher = ScriptedPatcher::new(vec![Ok("fixed".to_string())]);
    let fix_loop = FixVerifyLoop::new(analyzer.clone(), patcher.clone(), settings(5));

    let session = fix_loop.run(SOURCE, "Bank", None).await;

    assert_eq!(session.stop_reason, StopReason::Converged);
    assert_eq!(session.iterations, 1);
    assert_eq!(session.fix_attempts[0].issues_before, 1);
    assert_eq!(session.fix_attempts[0].issues_after, 0);
    assert_eq!(session.fix_attempts[0].total_before, 2);
    assert_eq!(session.fix_attempts[0].total_after, 1);
    assert!(session.is_clean());
}

// ── Failure handling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_patch_error_is_a_no_op() {
    let analyzer = ScriptedAnalyzer::new(vec![high(1)]);
    let patcher = ScriptedPatcher::new(vec![Err(PatchError::Unavailable("503".to_string()))]);
    let fix_loop = FixVerifyLoop::new(analyzer.clone(), patcher.clone(), settings(3));

    let session = fix_loop.run(SOURCE, "Bank", None).await;

    assert_eq!(session.stop_reason, StopReason::PatchFailed);
    assert_eq!(session.iterations, 0);
    assert_eq!(session.final_source, SOURCE);
    assert_eq!(analyzer.sources().await.len(), 1);
}

#[tokio::test]
async fn test_failed_reanalysis_reverts_patch() {
    let analyzer = ScriptedAnalyzer::new(vec![
        high(3),
        high(1),
        AnalysisResult::failed("Bank", "runtime down"),
    ]);
    let patcher = ScriptedPatcher::new(vec![Ok("v1".to_string()), Ok("v2".to_string())]);
    let fix_loop = FixVerifyLoop::new(analyzer.clone(), patcher.clone(), settings(5));

    let session = fix_loop.run(SOURCE, "Bank", None).await;

    assert_eq!(session.stop_reason, StopReason::ReanalysisFailed);
    assert_eq!(session.iterations, 1);
    assert_eq!(session.final_source, "v1");
    assert_eq!(session.final_analysis.as_ref().map(|a| a.issues.len()), Some(1));
    assert_eq!(session.issues_resolved, 2);
    assert_eq!(analyzer.sources().await, vec![SOURCE, "v1", "v2"]);
}

#[tokio::test]
async fn test_negative_progress_is_reported() {
    let analyzer = ScriptedAnalyzer::new(vec![high(1), high(3)]);
    let patcher = ScriptedPatcher::new(vec![Ok("v1".to_string()), Ok("v1".to_string())]);
    let fix_loop = FixVerifyLoop::new(analyzer.clone(), patcher.clone(), settings(5));

    let session = fix_loop.run(SOURCE, "Bank", None).await;

    assert_eq!(session.iterations, 1);
    assert_eq!(session.issues_resolved, -2);
}

// ── Patch service contract ───────────────────────────────────────────────────

#[tokio::test]
async fn test_fenced_reply_and_metadata_forwarding() {
    let analyzer = ScriptedAnalyzer::new(vec![high(2), high(0)]);
    let patcher = ScriptedPatcher::new(vec![Ok("```solidity\ncontract Bank {}\n```".to_string())]);
    let fix_loop = FixVerifyLoop::new(analyzer.clone(), patcher.clone(), settings(2));
    let metadata = json!({"model": "generator-v3", "prompt_id": 17});

    let session = fix_loop.run(SOURCE, "Bank", Some(metadata.clone())).await;

    assert_eq!(session.final_source, "contract Bank {}\n");
    assert_eq!(session.generation_metadata.as_ref(), Some(&metadata));
    let requests = patcher.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, SOURCE);
    assert_eq!(requests[0].1, 2);
    assert_eq!(requests[0].2.as_ref(), Some(&metadata));
}

#[tokio::test]
async fn test_severity_floor_widens_selection() {
    let analyzer = ScriptedAnalyzer::new(vec![
        analysis(&[Severity::High, Severity::Medium, Severity::Low]),
        analysis(&[Severity::Low]),
    ]);
    let patcher = ScriptedPatcher::new(vec![Ok("v1".to_string())]);
    let mut settings = settings(1);
    settings.severity_floor = Severity::Medium;
    let fix_loop = FixVerifyLoop::new(analyzer.clone(), patcher.clone(), settings);

    let session = fix_loop.run(SOURCE, "Bank", None).await;

    assert_eq!(patcher.requests().await[0].1, 2);
    assert_eq!(session.stop_reason, StopReason::Converged);
}
