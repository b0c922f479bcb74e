//! SmartCheck parser
//!
//! SmartCheck reports findings as multi-line blocks:
//!
//! ```text
//! ruleId: SOLIDITY_TX_ORIGIN
//! patternId: 12e802
//! severity: 2
//! line: 14
//! column: 16
//! content: tx.origin
//! ```
//!
//! `ruleId:` opens a block and the `line:` location marker closes it. Lines
//! that belong to no block (banners, progress) are ignored.

use once_cell::sync::Lazy;
use regex::Regex;

use verifix_core::domain::{SecurityIssue, Severity};

use super::{GENERIC_RECOMMENDATION, REENTRANCY_RECOMMENDATION};
use crate::domain::{OutputShape, ParseContext, ParseResult, ToolParser};
use crate::infrastructure::diagnostics::{errors_fails, strip_ansi};

static FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(ruleId|severity|line|content):\s*(.*?)\s*$").expect("valid regex"));

fn to_severity(level: &str) -> Severity {
    match level {
        "3" => Severity::High,
        "2" => Severity::Medium,
        "1" => Severity::Low,
        _ => Severity::Info,
    }
}

fn recommendation(rule: &str) -> &'static str {
    match rule {
        "SOLIDITY_TX_ORIGIN" => "Replace tx.origin with msg.sender",
        "SOLIDITY_CALL_WITHOUT_DATA" | "SOLIDITY_UNCHECKED_CALL" => {
            "Check return values from external calls"
        }
        "SOLIDITY_REENTRANCY" => REENTRANCY_RECOMMENDATION,
        "SOLIDITY_EXACT_TIME" => "Avoid using block.timestamp for critical logic",
        "SOLIDITY_LOCKED_MONEY" => "Add withdrawal function or make contract payable",
        "SOLIDITY_PRAGMAS_VERSION" => "Pin the compiler version",
        _ => GENERIC_RECOMMENDATION,
    }
}

/// Block being read, between `ruleId:` and `line:`
struct OpenBlock {
    rule: String,
    severity: Option<String>,
}

pub struct SmartCheckParser;

impl ToolParser for SmartCheckParser {
    fn id(&self) -> &'static str {
        "smartcheck"
    }

    fn shape(&self) -> OutputShape {
        OutputShape::LineGrammar
    }

    fn parse(&self, ctx: &ParseContext<'_>) -> ParseResult {
        let (errors, fails) = errors_fails(
            ctx.outcome.exit_code,
            &ctx.outcome.log_lines,
            ctx.benign_exit_codes,
            true,
        );
        let mut result = ParseResult::with_diagnostics(errors, fails);
        let mut open: Option<OpenBlock> = None;
        // index of the issue a trailing `content:` line belongs to
        let mut last_closed: Option<usize> = None;

        for raw in &ctx.outcome.log_lines {
            let line = strip_ansi(raw);
            let Some(caps) = FIELD.captures(&line) else {
                continue;
            };
            let value = caps[2].to_string();
            match &caps[1] {
                "ruleId" => {
                    open = Some(OpenBlock {
                        rule: value,
                        severity: None,
                    });
                    last_closed = None;
                }
                "severity" => {
                    if let Some(block) = open.as_mut() {
                        block.severity = Some(value);
                    }
                }
                "line" => {
                    let Some(block) = open.take() else {
                        continue;
                    };
                    let severity = to_severity(block.severity.as_deref().unwrap_or_default());
                    let mut issue = SecurityIssue::new(
                        ctx.tool_id,
                        severity,
                        block.rule.clone(),
                        format!("SmartCheck rule {} matched", block.rule),
                    )
                    .with_recommendation(recommendation(&block.rule));
                    issue.location.line = value.parse().ok();
                    result.issues.push(issue);
                    last_closed = Some(result.issues.len() - 1);
                }
                "content" => {
                    if let Some(issue) = last_closed.and_then(|i| result.issues.get_mut(i)) {
                        issue.description.push_str(&format!(": {value}"));
                    }
                    last_closed = None;
                }
                _ => {}
            }
        }

        if open.is_some() {
            result.info("trailing SmartCheck block without location");
        }
        result
    }
}
