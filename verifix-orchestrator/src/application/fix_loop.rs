//! Fix-verify convergence loop

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use verifix_core::config::{AnalysisConfig, FixLoopConfig};
use verifix_core::domain::{
    AnalysisResult, FixAttempt, FixSession, SecurityIssue, Severity, StopReason,
};

use crate::domain::{Analyzer, PatchService};

/// Knobs for one fix-verify session
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Iteration budget `N`
    pub max_iterations: u32,
    pub severity_floor: Severity,
    pub analysis_only: bool,
    pub tool_ids: Vec<String>,
    pub tool_timeout: Duration,
}

impl LoopSettings {
    pub fn from_config(fix_loop: &FixLoopConfig, analysis: &AnalysisConfig) -> Self {
        Self {
            max_iterations: fix_loop.max_iterations,
            severity_floor: fix_loop.severity_floor,
            analysis_only: fix_loop.analysis_only,
            tool_ids: analysis.default_tools.clone(),
            tool_timeout: analysis.tool_timeout(),
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&FixLoopConfig::default(), &AnalysisConfig::default())
    }
}

/// Strip one surrounding Markdown code fence (```` ```lang ```` ... ```` ``` ````)
pub fn strip_code_fences(reply: &str) -> String {
    let trimmed = reply.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return reply.to_string();
    };
    // the opening fence line may carry a language tag
    let body = after_open.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    let body = body.strip_suffix("```").unwrap_or(body);
    let body = body.trim_end_matches(['\n', '\r']);
    format!("{body}\n")
}

/// Whether a patch reproduces `current`, ignoring trailing line breaks
fn same_source(patched: &str, current: &str) -> bool {
    patched.trim_end_matches(['\n', '\r']) == current.trim_end_matches(['\n', '\r'])
}

/// Analyze, patch, re-analyze until converged or out of budget
pub struct FixVerifyLoop {
    analyzer: Arc<dyn Analyzer>,
    patcher: Arc<dyn PatchService>,
    settings: LoopSettings,
}

impl FixVerifyLoop {
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        patcher: Arc<dyn PatchService>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            analyzer,
            patcher,
            settings,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.settings.max_iterations = max_iterations;
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    async fn analyze(&self, source: &str, contract_name: &str) -> AnalysisResult {
        self.analyzer
            .analyze(
                source,
                contract_name,
                &self.settings.tool_ids,
                self.settings.tool_timeout,
            )
            .await
    }

    fn selection(&self, analysis: &AnalysisResult) -> Vec<SecurityIssue> {
        analysis
            .at_or_above(self.settings.severity_floor)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Run one session. Every path returns a complete [`FixSession`].
    #[instrument(skip(self, source, generation_metadata), fields(contract = %contract_name, budget = self.settings.max_iterations))]
    pub async fn run(
        &self,
        source: &str,
        contract_name: &str,
        generation_metadata: Option<Value>,
    ) -> FixSession {
        let started_at = Utc::now();
        let initial = self.analyze(source, contract_name).await;

        let mut session = FixSession {
            session_id: Uuid::new_v4(),
            contract_name: contract_name.to_string(),
            original_source: source.to_string(),
            final_source: source.to_string(),
            iterations: 0,
            initial_analysis: initial.clone(),
            final_analysis: None,
            fix_attempts: Vec::new(),
            issues_resolved: 0,
            stop_reason: StopReason::InitialAnalysisFailed,
            generation_metadata,
            started_at,
            completed_at: started_at,
        };

        if !initial.success {
            warn!(error = ?initial.error, "Initial analysis failed");
            session.completed_at = Utc::now();
            return session;
        }
        if self.settings.analysis_only {
            return self.finish(session, initial, StopReason::AnalysisOnly);
        }

        let mut current = initial;
        let stop_reason = loop {
            let selected = self.selection(&current);
            if selected.is_empty() {
                break StopReason::Converged;
            }
            if session.iterations >= self.settings.max_iterations {
                break StopReason::BudgetExhausted;
            }
            let iteration = session.iterations + 1;
            info!(iteration, selected = selected.len(), "Requesting patch");

            let patched = match self
                .patcher
                .patch(
                    &session.final_source,
                    &selected,
                    contract_name,
                    session.generation_metadata.as_ref(),
                )
                .await
            {
                Ok(reply) => strip_code_fences(&reply),
                Err(e) => {
                    warn!(iteration, error = %e, "Patch service failed");
                    break StopReason::PatchFailed;
                }
            };
            if same_source(&patched, &session.final_source) {
                info!(iteration, "Patch left the source unchanged");
                break StopReason::NoProgress;
            }

            let reanalysis = self.analyze(&patched, contract_name).await;
            if !reanalysis.success {
                warn!(iteration, error = ?reanalysis.error, "Re-analysis failed, discarding patch");
                break StopReason::ReanalysisFailed;
            }

            let attempt = FixAttempt {
                iteration,
                issues_before: selected.len(),
                issues_after: reanalysis.at_or_above(self.settings.severity_floor).len(),
                total_before: current.issues.len(),
                total_after: reanalysis.issues.len(),
            };
            info!(
                iteration,
                issues_before = attempt.issues_before,
                issues_after = attempt.issues_after,
                total_after = attempt.total_after,
                "Iteration completed"
            );
            session.fix_attempts.push(attempt);
            session.iterations = iteration;
            session.final_source = patched;
            current = reanalysis;
        };

        self.finish(session, current, stop_reason)
    }

    fn finish(
        &self,
        mut session: FixSession,
        final_analysis: AnalysisResult,
        stop_reason: StopReason,
    ) -> FixSession {
        session.issues_resolved =
            FixSession::issues_resolved_between(&session.initial_analysis, Some(&final_analysis));
        session.final_analysis = Some(final_analysis);
        session.stop_reason = stop_reason;
        session.completed_at = Utc::now();
        info!(
            iterations = session.iterations,
            issues_resolved = session.issues_resolved,
            stop_reason = %stop_reason,
            "Fix-verify session finished"
        );
        session
    }
}
