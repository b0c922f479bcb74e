//! Multi-tool analyzer

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use verifix_core::domain::{AnalysisResult, SecurityIssue, ToolConfig, ToolRunStatus};
use verifix_parsers::{ParseResult, ParserRegistry, parse_outcome};
use verifix_sandbox::ContainerExecutor;

use crate::domain::Analyzer;
use crate::infrastructure::ToolRegistry;

/// What one tool contributed to the merged result
#[derive(Debug)]
struct ToolOutcome {
    marker: String,
    issues: Vec<SecurityIssue>,
    warning: Option<String>,
}

impl ToolOutcome {
    fn error(tool_id: &str, warning: String) -> Self {
        Self {
            marker: ToolRunStatus::Error.mark(tool_id),
            issues: Vec::new(),
            warning: Some(warning),
        }
    }

    /// Partial credit: issues survive even when the run had fails
    fn from_parse(tool_id: &str, parsed: ParseResult) -> Self {
        let Some(first_fail) = parsed.fails.iter().next() else {
            return Self {
                marker: ToolRunStatus::Completed.mark(tool_id),
                issues: parsed.issues,
                warning: None,
            };
        };
        let status = if parsed.issues.is_empty() {
            ToolRunStatus::Failed
        } else {
            ToolRunStatus::Partial
        };
        Self {
            marker: status.mark(tool_id),
            warning: Some(format!("{tool_id}: parsing issues - {first_fail}")),
            issues: parsed.issues,
        }
    }
}

/// Runs each requested tool in its own container and merges the parsed results
pub struct ToolAnalyzer {
    tools: Arc<ToolRegistry>,
    parsers: Arc<ParserRegistry>,
    executor: Arc<ContainerExecutor>,
    max_concurrent: usize,
}

impl ToolAnalyzer {
    pub fn new(
        tools: Arc<ToolRegistry>,
        parsers: Arc<ParserRegistry>,
        executor: Arc<ContainerExecutor>,
    ) -> Self {
        Self {
            tools,
            parsers,
            executor,
            max_concurrent: 1,
        }
    }

    /// Allow up to `max_concurrent` tool containers at once
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    async fn run_tool(
        executor: Arc<ContainerExecutor>,
        parsers: Arc<ParserRegistry>,
        tool: ToolConfig,
        source: Arc<str>,
        timeout: Duration,
    ) -> ToolOutcome {
        let Some(parser) = parsers.get(&tool.parser) else {
            warn!(tool = %tool.id, parser = %tool.parser, "No parser registered for tool");
            return ToolOutcome::error(&tool.id, format!("{}: no parser available", tool.id));
        };

        let outcome = executor.execute(&source, &tool, timeout).await;
        let parsed = parse_outcome(parser.as_ref(), &tool, &outcome);
        debug!(
            tool = %tool.id,
            issues = parsed.issues.len(),
            errors = ?parsed.errors,
            fails = ?parsed.fails,
            infos = ?parsed.infos,
            "Parsed tool output"
        );
        ToolOutcome::from_parse(&tool.id, parsed)
    }
}

#[async_trait]
impl Analyzer for ToolAnalyzer {
    #[instrument(skip(self, source), fields(contract = %contract_name, tools = ?tool_ids))]
    async fn analyze(
        &self,
        source: &str,
        contract_name: &str,
        tool_ids: &[String],
        timeout: Duration,
    ) -> AnalysisResult {
        if let Err(e) = self.executor.ping().await {
            warn!(runtime = self.executor.runtime_name(), error = %e, "Container runtime unreachable");
            return AnalysisResult::failed(
                contract_name,
                format!(
                    "Container runtime '{}' not available: {e}",
                    self.executor.runtime_name()
                ),
            );
        }

        let tools = match self.tools.load(tool_ids) {
            Ok(tools) => tools,
            Err(e) => {
                warn!(error = %e, "Tool declarations could not be resolved");
                return AnalysisResult::failed(contract_name, format!("Tool configuration error: {e}"));
            }
        };
        if tools.is_empty() {
            return AnalysisResult::failed(
                contract_name,
                "No tools available. Check the requested tool ids and the tool declarations",
            );
        }

        info!(tool_count = tools.len(), "Running analysis tools");
        let source: Arc<str> = Arc::from(source);
        let mut outcomes: Vec<(usize, ToolOutcome)> = stream::iter(tools.into_iter().enumerate().map(
            |(index, tool)| {
                let executor = self.executor.clone();
                let parsers = self.parsers.clone();
                let source = source.clone();
                async move {
                    let tool_id = tool.id.clone();
                    let handle = tokio::spawn(Self::run_tool(executor, parsers, tool, source, timeout));
                    let outcome = match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            warn!(tool = %tool_id, error = %e, "Tool task aborted");
                            ToolOutcome::error(&tool_id, format!("{tool_id}: {e}"))
                        }
                    };
                    (index, outcome)
                }
            },
        ))
        .buffer_unordered(self.max_concurrent)
        .collect()
        .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let mut result = AnalysisResult {
            contract_name: contract_name.to_string(),
            tools_used: Vec::with_capacity(outcomes.len()),
            issues: Vec::new(),
            success: false,
            error: None,
            warnings: Vec::new(),
        };
        for (_, outcome) in outcomes {
            info!(tool = %outcome.marker, issues = outcome.issues.len(), "Tool finished");
            result.tools_used.push(outcome.marker);
            result.issues.extend(outcome.issues);
            result.warnings.extend(outcome.warning);
        }
        result.success = !result.tools_used.is_empty();

        let counts = result.count_by_severity();
        info!(
            total = counts.total,
            critical = counts.critical,
            high = counts.high,
            warnings = result.warnings.len(),
            "Analysis completed"
        );
        result
    }
}
