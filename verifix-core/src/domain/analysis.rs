//! Aggregate result of one tool-set run against one source snapshot

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::issue::{IssueSignature, SecurityIssue};
use super::severity::Severity;

/// How a single tool run ended, as encoded in `AnalysisResult::tools_used`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolRunStatus {
    /// Parsed cleanly
    Completed,
    /// Infrastructure failures were detected but some issues were still extracted
    Partial,
    /// Nothing usable came out of the run
    Failed,
    /// Orchestrating the run itself went wrong
    Error,
}

impl ToolRunStatus {
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            ToolRunStatus::Completed => None,
            ToolRunStatus::Partial => Some("-partial"),
            ToolRunStatus::Failed => Some("-failed"),
            ToolRunStatus::Error => Some("-error"),
        }
    }

    /// Render the `tools_used` entry for `tool_id`
    pub fn mark(self, tool_id: &str) -> String {
        match self.suffix() {
            Some(suffix) => format!("{tool_id}{suffix}"),
            None => tool_id.to_string(),
        }
    }

    /// Split a `tools_used` entry back into tool id and status
    pub fn parse_marker(marker: &str) -> (&str, ToolRunStatus) {
        for status in [
            ToolRunStatus::Partial,
            ToolRunStatus::Failed,
            ToolRunStatus::Error,
        ] {
            if let Some(id) = status.suffix().and_then(|s| marker.strip_suffix(s)) {
                return (id, status);
            }
        }
        (marker, ToolRunStatus::Completed)
    }

    pub fn is_degraded(self) -> bool {
        matches!(self, ToolRunStatus::Failed | ToolRunStatus::Error)
    }
}

/// Per-severity issue counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub total: usize,
}

impl SeverityCounts {
    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a SecurityIssue>) -> Self {
        let mut counts = Self::default();
        for issue in issues {
            match issue.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => counts.info += 1,
            }
            counts.total += 1;
        }
        counts
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }
}

/// Output of one full analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub contract_name: String,
    /// Attempted tool ids, suffixed with a status marker when degraded
    pub tools_used: Vec<String>,
    pub issues: Vec<SecurityIssue>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl AnalysisResult {
    /// A run that produced nothing at all
    pub fn failed(contract_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            contract_name: contract_name.into(),
            tools_used: Vec::new(),
            issues: Vec::new(),
            success: false,
            error: Some(error.into()),
            warnings: Vec::new(),
        }
    }

    pub fn count_by_severity(&self) -> SeverityCounts {
        SeverityCounts::from_issues(&self.issues)
    }

    pub fn get_by_severity(&self, severity: Severity) -> Vec<&SecurityIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .collect()
    }

    /// Issues of severity CRITICAL or HIGH
    pub fn get_critical_high(&self) -> Vec<&SecurityIssue> {
        self.at_or_above(Severity::High)
    }

    pub fn at_or_above(&self, floor: Severity) -> Vec<&SecurityIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity.at_or_above(floor))
            .collect()
    }

    pub fn signatures(&self) -> BTreeSet<IssueSignature> {
        self.issues.iter().map(SecurityIssue::signature).collect()
    }

    /// Status of each attempted tool, decoded from `tools_used`
    pub fn tool_statuses(&self) -> Vec<(&str, ToolRunStatus)> {
        self.tools_used
            .iter()
            .map(|marker| ToolRunStatus::parse_marker(marker))
            .collect()
    }

    pub fn summary(&self) -> AnalysisSummary {
        let statuses = self.tool_statuses();
        AnalysisSummary {
            contract_name: self.contract_name.clone(),
            success: self.success,
            counts: self.count_by_severity(),
            tools_attempted: statuses.len(),
            tools_degraded: statuses
                .iter()
                .filter(|(_, status)| status.is_degraded())
                .count(),
        }
    }
}

/// Compact view of an analysis for result consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub contract_name: String,
    pub success: bool,
    pub counts: SeverityCounts,
    pub tools_attempted: usize,
    pub tools_degraded: usize,
}
