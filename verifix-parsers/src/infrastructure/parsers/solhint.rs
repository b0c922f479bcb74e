//! Solhint parser
//!
//! Reads the `unix` formatter output, one finding per line:
//! `file:line:col: message [Level/rule-name]`. Exit code 1 means findings.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use verifix_core::domain::{SecurityIssue, Severity};

use crate::domain::{OutputShape, ParseContext, ParseResult, ToolParser};
use crate::infrastructure::diagnostics::{errors_fails, strip_ansi};

static REPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<filename>[^:]*):(?P<line>\d+):(?P<column>\d+):\s*(?P<message>.*?)\s*\[(?P<level>[^\[/\]]*)/(?P<name>[^\[/\]]*)\]$",
    )
    .expect("valid regex")
});

fn to_severity(level: &str) -> Severity {
    match level.to_lowercase().as_str() {
        "error" => Severity::High,
        "warning" => Severity::Medium,
        "info" => Severity::Low,
        _ => Severity::Info,
    }
}

pub struct SolhintParser;

impl ToolParser for SolhintParser {
    fn id(&self) -> &'static str {
        "solhint"
    }

    fn shape(&self) -> OutputShape {
        OutputShape::LineGrammar
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

        for line in &ctx.outcome.log_lines {
            let line = strip_ansi(line);
            let Some(caps) = REPORT.captures(line.trim_end()) else {
                continue;
            };
            let name = &caps["name"];
            let mut issue = SecurityIssue::new(
                ctx.tool_id,
                to_severity(&caps["level"]),
                name,
                &caps["message"],
            )
            .with_recommendation(format!("Rule: {name}"));
            issue.location.line = caps["line"].parse().ok();
            if !caps["filename"].is_empty() {
                issue.location.filename = Some(caps["filename"].to_string());
            }
            result.issues.push(issue);
        }

        result
    }
}
