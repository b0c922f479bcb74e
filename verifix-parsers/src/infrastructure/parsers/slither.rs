//! Slither parser
//!
//! Slither writes its JSON report to a file (`--json /output.json`) which is
//! retrieved as an archive; the log stream is only used when that file is
//! missing. Exit code 255 means "detectors fired".

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use verifix_core::domain::{Location, SecurityIssue, Severity};

use super::{GENERIC_RECOMMENDATION, REENTRANCY_RECOMMENDATION, archived_output, base_name, decode_document};
use crate::domain::{OutputShape, ParseContext, ParseResult, ToolParser};
use crate::infrastructure::diagnostics::errors_fails;

/// `contract.sol#12` or `contract.sol#12-20` inside a detector description
static LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([^\s(#]+)#(\d+)(?:-(\d+))?").expect("valid regex")
});

/// Error texts slither uses when it has nothing more specific to say
const GENERIC_ERRORS: [&str; 2] = ["Slither execution failed", "analysis unsuccessful"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SlitherOutput {
    success: bool,
    error: Option<String>,
    results: SlitherResults,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SlitherResults {
    detectors: Vec<Detector>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Detector {
    check: String,
    impact: String,
    description: String,
    elements: Vec<Element>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Element {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    source_mapping: Option<SourceMapping>,
    type_specific_fields: Option<TypeSpecificFields>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SourceMapping {
    lines: Vec<u32>,
    filename_absolute: Option<String>,
    filename_short: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TypeSpecificFields {
    parent: Option<Parent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Parent {
    #[serde(rename = "type")]
    kind: String,
    name: String,
}

fn impact_to_severity(impact: &str) -> Severity {
    match impact {
        "High" => Severity::High,
        "Medium" => Severity::Medium,
        "Low" => Severity::Low,
        _ => Severity::Info,
    }
}

fn recommendation(check: &str) -> &'static str {
    match check {
        "reentrancy-eth" | "reentrancy-no-eth" => REENTRANCY_RECOMMENDATION,
        "unchecked-transfer" | "unchecked-send" => "Check return value or use SafeERC20",
        "tx-origin" => "Replace tx.origin with msg.sender",
        "arbitrary-send-eth" => "Add access control and input validation",
        "suicidal" => "Add access control to selfdestruct",
        "locked-ether" => "Add withdrawal function or make contract payable",
        _ => GENERIC_RECOMMENDATION,
    }
}

fn detector_to_issue(tool_id: &str, detector: &Detector) -> SecurityIssue {
    let mut location = Location::default();
    if let Some(caps) = LOCATION.captures(&detector.description) {
        location.filename = Some(base_name(&caps[1]).to_string());
        location.line = caps[2].parse().ok();
        location.line_end = caps.get(3).and_then(|m| m.as_str().parse().ok());
    }

    let mut contract = None;
    let mut function = None;
    for element in &detector.elements {
        if element.kind == "function" {
            function = Some(element.name.clone());
            if let Some(parent) = element
                .type_specific_fields
                .as_ref()
                .and_then(|fields| fields.parent.as_ref())
                .filter(|parent| parent.kind == "contract")
            {
                contract = Some(parent.name.clone());
            }
        } else if element.kind == "contract" && contract.is_none() {
            contract = Some(element.name.clone());
        }

        if let Some(mapping) = &element.source_mapping {
            let mut lines = mapping.lines.clone();
            lines.sort_unstable();
            if location.line.is_none() {
                location.line = lines.first().copied();
            }
            if location.line_end.is_none() && lines.len() > 1 {
                location.line_end = lines.last().copied();
            }
            if location.filename.is_none() {
                location.filename = mapping
                    .filename_absolute
                    .as_deref()
                    .or(mapping.filename_short.as_deref())
                    .filter(|name| !name.is_empty())
                    .map(|name| base_name(name).to_string());
            }
        }
    }

    let title = if detector.check.is_empty() {
        "Slither Finding".to_string()
    } else {
        detector.check.clone()
    };
    let description = if detector.description.is_empty() {
        format!("{title} detected")
    } else {
        detector.description.trim_end().to_string()
    };

    let mut issue = SecurityIssue::new(tool_id, impact_to_severity(&detector.impact), title, description)
        .with_location(location)
        .with_recommendation(recommendation(&detector.check));
    issue.contract = contract;
    issue.function = function;
    issue
}

pub struct SlitherParser;

impl ToolParser for SlitherParser {
    fn id(&self) -> &'static str {
        "slither"
    }

    fn shape(&self) -> OutputShape {
        OutputShape::ArchiveJson
    }

    fn default_benign_exit_codes(&self) -> BTreeSet<i32> {
        BTreeSet::from([255])
    }

    fn parse(&self, ctx: &ParseContext<'_>) -> ParseResult {
        let mut result = ParseResult::default();
        let archived = archived_output(ctx, &mut result);

        let (errors, fails) = errors_fails(
            ctx.outcome.exit_code,
            &ctx.outcome.log_lines,
            ctx.benign_exit_codes,
            archived.is_none(),
        );
        result.errors.extend(errors);
        result.fails.extend(fails);

        let text = archived.unwrap_or_else(|| ctx.outcome.log_text());
        if text.trim().is_empty() {
            result.fail("no output received");
            return result;
        }
        let Some(output) = decode_document::<SlitherOutput>(&text, &mut result) else {
            return result;
        };

        let detectors = &output.results.detectors;
        result.issues = detectors
            .iter()
            .map(|detector| detector_to_issue(ctx.tool_id, detector))
            .collect();

        let specific_error = output
            .error
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty() && !GENERIC_ERRORS.contains(&e));

        if !output.success {
            if !detectors.is_empty() {
                result.info("slither found detectors despite success=false");
            } else if let Some(error) = specific_error {
                result.info(format!("slither reported: {error}"));
            }
        }
        if let Some(error) = specific_error.filter(|_| detectors.is_empty()) {
            result.error(format!("slither error: {}", super::truncate(error, 50)));
        }

        result
    }
}
