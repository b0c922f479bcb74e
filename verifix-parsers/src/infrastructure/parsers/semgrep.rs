//! Semgrep parser
//!
//! Semgrep prints its JSON report (`--json`) on stdout, sometimes surrounded
//! by progress text. Exit code 1 means findings were reported.

use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;

use verifix_core::domain::{SecurityIssue, Severity};

use super::{GENERIC_RECOMMENDATION, REENTRANCY_RECOMMENDATION, decode_document};
use crate::domain::{OutputShape, ParseContext, ParseResult, ToolParser};
use crate::infrastructure::diagnostics::errors_fails;
use crate::infrastructure::json;

/// Root Semgrep JSON output
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SemgrepOutput {
    results: Vec<SemgrepResult>,
    errors: Vec<SemgrepOutputError>,
}

/// A single Semgrep result (finding)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SemgrepResult {
    check_id: String,
    path: String,
    start: Position,
    end: Position,
    extra: SemgrepResultExtra,
    /// Older exports put these at top level instead of under `extra`
    severity: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Position {
    line: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SemgrepResultExtra {
    message: Option<String>,
    severity: Option<String>,
    metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SemgrepOutputError {
    #[serde(rename = "type")]
    kind: Option<serde_json::Value>,
    message: Option<String>,
}

fn to_severity(label: &str) -> Severity {
    match label {
        "ERROR" => Severity::High,
        "WARNING" => Severity::Medium,
        _ => Severity::Info,
    }
}

fn recommendation(check_name: &str) -> &'static str {
    let name = check_name.to_lowercase();
    if name.contains("reentrancy") {
        REENTRANCY_RECOMMENDATION
    } else if name.contains("unchecked") {
        "Check return values or use SafeERC20"
    } else if name.contains("tx-origin") || name.contains("txorigin") {
        "Replace tx.origin with msg.sender"
    } else if name.contains("access-control") {
        "Add proper access control modifiers"
    } else if name.contains("timestamp") {
        "Avoid using block.timestamp for critical logic"
    } else {
        GENERIC_RECOMMENDATION
    }
}

fn to_issue(tool_id: &str, raw: &SemgrepResult) -> SecurityIssue {
    let check_name = raw.check_id.rsplit('.').next().unwrap_or(&raw.check_id);
    let severity = raw
        .extra
        .severity
        .as_deref()
        .or(raw.severity.as_deref())
        .map(to_severity)
        .unwrap_or(Severity::Info);
    let message = raw
        .extra
        .message
        .as_deref()
        .or(raw.message.as_deref())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{check_name} detected"));

    let mut issue = SecurityIssue::new(tool_id, severity, check_name, message)
        .with_recommendation(recommendation(check_name));
    if !raw.path.is_empty() {
        issue.location.filename = Some(raw.path.clone());
    }
    issue.location.line = raw.start.line;
    issue.location.line_end = raw.end.line.filter(|end| Some(*end) != raw.start.line);
    if let Some(cwe) = raw.extra.metadata.get("cwe") {
        issue.description.push_str(&format!("\nCWE: {}", compact(cwe)));
    }
    issue
}

fn compact(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items.iter().map(compact).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

pub struct SemgrepParser;

impl ToolParser for SemgrepParser {
    fn id(&self) -> &'static str {
        "semgrep"
    }

    fn shape(&self) -> OutputShape {
        OutputShape::StreamJson
    }

    fn default_benign_exit_codes(&self) -> BTreeSet<i32> {
        BTreeSet::from([1])
    }

    fn parse(&self, ctx: &ParseContext<'_>) -> ParseResult {
        let (errors, fails) = errors_fails(
            ctx.outcome.exit_code,
            &ctx.outcome.log_lines,
            ctx.benign_exit_codes,
            true,
        );
        let mut result = ParseResult::with_diagnostics(errors, fails);

        let text = ctx.outcome.log_text();
        if text.trim().is_empty() {
            return result;
        }

        // a clean exit without any JSON simply means nothing was found
        let clean_exit = ctx.outcome.exit_code == Some(0);
        if clean_exit && !json::has_object_start(&text) {
            return result;
        }

        let mut scratch = ParseResult::default();
        let output = match decode_document::<SemgrepOutput>(&text, &mut scratch) {
            Some(output) => output,
            None => {
                result.fail("error parsing JSON output");
                return result;
            }
        };

        for error in &output.errors {
            let kind = error.kind.as_ref().map(compact).unwrap_or_else(|| "error".to_string());
            match &error.message {
                Some(message) => result.info(format!("semgrep {kind}: {}", super::truncate(message, 80))),
                None => result.info(format!("semgrep {kind}")),
            }
        }
        result.issues = output
            .results
            .iter()
            .map(|raw| to_issue(ctx.tool_id, raw))
            .collect();
        result
    }
}
