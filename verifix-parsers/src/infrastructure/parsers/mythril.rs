//! Mythril parser
//!
//! Mythril prints its JSON report (`-o json`) on the last line of its
//! output. Exit code 1 means issues were found.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;

use verifix_core::domain::{SecurityIssue, Severity};

use super::{GENERIC_RECOMMENDATION, REENTRANCY_RECOMMENDATION, decode_document};
use crate::domain::{OutputShape, ParseContext, ParseResult, ToolParser};
use crate::infrastructure::diagnostics::errors_fails;

const ABORTED: &str = "Exception occurred, aborting analysis.";

/// Mythril attributes compiler-generated code to this pseudo file
const UTILITY_YUL_SUFFIX: &str = "#utility.yul";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MythrilOutput {
    error: Option<String>,
    issues: Vec<MythrilIssue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MythrilIssue {
    title: Option<String>,
    severity: Option<String>,
    description: String,
    #[serde(rename = "swc-id")]
    swc_id: Option<Value>,
    filename: Option<String>,
    lineno: Option<u32>,
    contract: Option<String>,
    function: Option<String>,
}

fn to_severity(label: &str) -> Severity {
    match label {
        "High" => Severity::High,
        "Medium" => Severity::Medium,
        "Low" => Severity::Low,
        _ => Severity::Info,
    }
}

fn recommendation(title: &str, swc_id: Option<&str>) -> &'static str {
    if let Some(swc) = swc_id {
        return match swc {
            "107" => "Validate external call targets and use checks-effects-interactions",
            "104" => "Check return values from external calls",
            "105" => "Add access control to withdrawal functions",
            "106" => "Add access control to selfdestruct",
            "112" => "Validate delegatecall targets",
            "115" => "Replace tx.origin with msg.sender",
            "116" => "Avoid using block.timestamp for randomness",
            "120" => "Avoid using block.number for randomness",
            _ => "Review SWC documentation",
        };
    }

    let title = title.to_lowercase();
    if title.contains("reentrancy") {
        REENTRANCY_RECOMMENDATION
    } else if title.contains("unchecked") {
        "Check return values or use SafeERC20"
    } else if title.contains("tx.origin") || title.contains("tx-origin") {
        "Replace tx.origin with msg.sender"
    } else {
        GENERIC_RECOMMENDATION
    }
}

/// SWC ids show up as strings or numbers depending on the version
fn swc_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn to_issue(tool_id: &str, raw: &MythrilIssue) -> SecurityIssue {
    let swc = raw.swc_id.as_ref().and_then(swc_string);
    let mut title = raw.title.clone().unwrap_or_else(|| "Mythril Finding".to_string());
    let mut description = raw.description.clone();
    let advice = recommendation(&title, swc.as_deref());
    if let Some(swc) = &swc {
        title = format!("{title} (SWC {swc})");
        description.push_str(&format!("\nClassification: SWC-{swc}"));
    }

    let severity = to_severity(raw.severity.as_deref().unwrap_or_default());
    let mut issue = SecurityIssue::new(tool_id, severity, title, description).with_recommendation(advice);

    let in_utility = raw
        .filename
        .as_deref()
        .is_some_and(|f| f.ends_with(UTILITY_YUL_SUFFIX));
    if !in_utility {
        issue.location.filename = raw.filename.clone().filter(|f| !f.is_empty());
        issue.location.line = raw.lineno;
    }
    issue.contract = raw.contract.clone();
    issue.function = raw.function.clone();
    issue
}

pub struct MythrilParser;

impl ToolParser for MythrilParser {
    fn id(&self) -> &'static str {
        "mythril"
    }

    fn shape(&self) -> OutputShape {
        OutputShape::StreamJson
    }

    fn default_benign_exit_codes(&self) -> BTreeSet<i32> {
        BTreeSet::from([1])
    }

    fn parse(&self, ctx: &ParseContext<'_>) -> ParseResult {
        let log = &ctx.outcome.log_lines;
        let (errors, fails) = errors_fails(ctx.outcome.exit_code, log, ctx.benign_exit_codes, true);
        let mut result = ParseResult::with_diagnostics(errors, fails);

        if log.iter().any(|line| line.contains(ABORTED)) {
            result.info("analysis incomplete");
            if result.fails.is_empty() && result.errors.is_empty() {
                result.fail("execution failed");
            }
        }

        // the report is normally the last line; fall back to scanning everything
        let last_line = log
            .iter()
            .rev()
            .map(|line| line.trim())
            .find(|line| !line.is_empty());
        let Some(last_line) = last_line else {
            return result;
        };
        let from_last_line = last_line
            .starts_with('{')
            .then(|| serde_json::from_str::<MythrilOutput>(last_line).ok())
            .flatten();
        let output = match from_last_line {
            Some(output) => output,
            None => match decode_document::<MythrilOutput>(&ctx.outcome.log_text(), &mut result) {
                Some(output) => output,
                None => return result,
            },
        };

        if let Some(error) = output.error.as_deref().filter(|e| !e.is_empty()) {
            let first_sentence = error.split('.').next().unwrap_or(error);
            result.error(first_sentence.to_string());
        }
        result.issues = output
            .issues
            .iter()
            .map(|raw| to_issue(ctx.tool_id, raw))
            .collect();

        result
    }
}
