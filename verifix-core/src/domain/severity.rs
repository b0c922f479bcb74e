//! Canonical severity taxonomy

use serde::{Deserialize, Serialize};

/// Finding severity
///
/// Variants are declared from most to least severe, so the derived ordering
/// has `Critical < High < Medium < Low < Info`. Use [`Severity::at_or_above`]
/// for floor comparisons instead of the raw operators.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    #[default]
    Info,
}

impl Severity {
    /// Every severity, most severe first
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Map an arbitrary tool-reported level onto the canonical taxonomy.
    ///
    /// An exact (case-insensitive) name match wins. Otherwise the label is
    /// searched for keywords: "critical" or "high" give `High`, "medium"
    /// gives `Medium`, "low" gives `Low`, and anything else is `Info`.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "CRITICAL" => return Severity::Critical,
            "HIGH" => return Severity::High,
            "MEDIUM" => return Severity::Medium,
            "LOW" => return Severity::Low,
            "INFO" => return Severity::Info,
            _ => {}
        }

        if normalized.contains("CRITICAL") || normalized.contains("HIGH") {
            Severity::High
        } else if normalized.contains("MEDIUM") {
            Severity::Medium
        } else if normalized.contains("LOW") {
            Severity::Low
        } else {
            Severity::Info
        }
    }

    /// True when `self` is as severe as `floor` or more
    pub fn at_or_above(self, floor: Severity) -> bool {
        self <= floor
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Severity::from_label(s))
    }
}
