//! Normalized security finding

use serde::{Deserialize, Serialize};

use super::severity::Severity;

/// Source location of a finding
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub filename: Option<String>,
    pub line: Option<u32>,
    pub line_end: Option<u32>,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.filename.is_none() && self.line.is_none() && self.line_end.is_none()
    }
}

/// Deduplication key: (tool, title, contract, function, line)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IssueSignature {
    pub tool: String,
    pub title: String,
    pub contract: Option<String>,
    pub function: Option<String>,
    pub line: Option<u32>,
}

/// One finding reported by one tool, normalized into the shared vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityIssue {
    pub tool: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Location::is_empty")]
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl SecurityIssue {
    pub fn new(
        tool: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            severity,
            title: title.into(),
            description: description.into(),
            location: Location::default(),
            contract: None,
            function: None,
            recommendation: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.location.filename = Some(filename.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.location.line = Some(line);
        self
    }

    pub fn with_line_end(mut self, line_end: u32) -> Self {
        self.location.line_end = Some(line_end);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn with_contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = Some(contract.into());
        self
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    /// Key identifying "the same reported defect" across runs
    pub fn signature(&self) -> IssueSignature {
        IssueSignature {
            tool: self.tool.clone(),
            title: self.title.clone(),
            contract: self.contract.clone(),
            function: self.function.clone(),
            line: self.location.line,
        }
    }
}
