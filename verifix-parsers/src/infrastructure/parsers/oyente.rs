//! Oyente parser
//!
//! Oyente prints a results summary (`Integer Overflow: True`) followed by
//! located warnings (`contract.sol:12:5: Warning: Integer Overflow.`). Located
//! warnings are preferred; a summary flag only becomes an issue when no
//! located warning exists for that category.

use once_cell::sync::Lazy;
use regex::Regex;

use verifix_core::domain::{SecurityIssue, Severity};

use crate::domain::{OutputShape, ParseContext, ParseResult, ToolParser};
use crate::infrastructure::diagnostics::{errors_fails, strip_ansi};

struct Category {
    title: &'static str,
    keywords: &'static [&'static str],
    severity: Severity,
    recommendation: &'static str,
}

const CATEGORIES: [Category; 7] = [
    Category {
        title: "Reentrancy",
        keywords: &["reentrancy", "re-entrancy"],
        severity: Severity::High,
        recommendation: super::REENTRANCY_RECOMMENDATION,
    },
    Category {
        title: "Timestamp Dependency",
        keywords: &["timestamp dependency"],
        severity: Severity::Medium,
        recommendation: "Avoid using block.timestamp for critical logic",
    },
    Category {
        title: "Transaction Ordering",
        keywords: &["transaction ordering", "transaction-ordering"],
        severity: Severity::Medium,
        recommendation: "Use commit-reveal scheme or other mitigation",
    },
    Category {
        title: "Integer Overflow",
        keywords: &["integer overflow"],
        severity: Severity::High,
        recommendation: "Use SafeMath or Solidity 0.8+ built-in checks",
    },
    Category {
        title: "Integer Underflow",
        keywords: &["integer underflow"],
        severity: Severity::High,
        recommendation: "Use SafeMath or Solidity 0.8+ built-in checks",
    },
    Category {
        title: "Callstack Depth",
        keywords: &["callstack depth"],
        severity: Severity::Low,
        recommendation: "Limit call depth or use alternative patterns",
    },
    Category {
        title: "Parity Multisig Bug",
        keywords: &["parity multisig"],
        severity: Severity::High,
        recommendation: "Review multisig implementation carefully",
    },
];

/// `file:line:col:` prefix of a located warning
static LOCATED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s|:)([^\s:]+\.sol):(\d+):(\d+):").expect("valid regex"));
static LINE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)line\s+(\d+)").expect("valid regex"));
/// Summary flag such as `Integer Overflow:   True`
static FLAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i):\s*(true|false)\s*$").expect("valid regex"));
/// Header of the witness block printed under a located warning
static OCCURS_IF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)occurs if:\s*$").expect("valid regex"));
static COVERAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)EVM Code Coverage:\s*([0-9.]+%)").expect("valid regex"));

fn category_of(line: &str) -> Option<&'static Category> {
    let lower = line.to_lowercase();
    CATEGORIES
        .iter()
        .find(|c| c.keywords.iter().any(|k| lower.contains(k)))
}

fn issue_for(tool_id: &str, category: &Category, line: &str) -> SecurityIssue {
    let description = line
        .split_once("symExec:")
        .map(|(_, rest)| rest)
        .unwrap_or(line)
        .trim();
    SecurityIssue::new(tool_id, category.severity, category.title, description)
        .with_recommendation(category.recommendation)
}

pub struct OyenteParser;

impl ToolParser for OyenteParser {
    fn id(&self) -> &'static str {
        "oyente"
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
        let mut flagged: Vec<(&'static Category, String)> = Vec::new();

        for raw in &ctx.outcome.log_lines {
            let line = strip_ansi(raw);
            let line = line.trim();

            if let Some(caps) = COVERAGE.captures(line) {
                result.info(format!("coverage {}", &caps[1]));
                continue;
            }
            if OCCURS_IF.is_match(line) {
                continue;
            }
            let Some(category) = category_of(line) else {
                continue;
            };

            if let Some(flag) = FLAG.captures(line) {
                if flag[1].eq_ignore_ascii_case("true") {
                    flagged.push((category, line.to_string()));
                }
                continue;
            }

            let mut issue = issue_for(ctx.tool_id, category, line);
            if let Some(caps) = LOCATED.captures(line) {
                issue.location.filename = Some(super::base_name(&caps[1]).to_string());
                issue.location.line = caps[2].parse().ok();
            } else if let Some(caps) = LINE_WORD.captures(line) {
                issue.location.line = caps[1].parse().ok();
            }
            result.issues.push(issue);
        }

        for (category, line) in flagged {
            let located = result.issues.iter().any(|i| i.title == category.title);
            if !located {
                result.issues.push(issue_for(ctx.tool_id, category, &line));
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_keywords() {
        assert_eq!(
            category_of("Re-Entrancy Vulnerability: False").map(|c| c.title),
            Some("Reentrancy")
        );
        assert_eq!(
            category_of("Transaction-Ordering Dependence (TOD): True").map(|c| c.title),
            Some("Transaction Ordering")
        );
        assert!(category_of("============ Results ===========").is_none());
    }
}
