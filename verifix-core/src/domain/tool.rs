//! Declarative description of one pluggable analysis tool

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Placeholder replaced with the in-container path of the source file
pub const PLACEHOLDER_FILENAME: &str = "$FILENAME";
/// Placeholder replaced with the timeout in seconds
pub const PLACEHOLDER_TIMEOUT: &str = "$TIMEOUT";
/// Placeholder replaced with the in-container helper-bundle directory
pub const PLACEHOLDER_BIN: &str = "$BIN";
/// Placeholder replaced with `0` (no main-contract selection)
pub const PLACEHOLDER_MAIN: &str = "$MAIN";

/// A resolved tool declaration. Loaded once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Canonical id (aliases resolve to the id of their target)
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub image: String,
    /// Invocation template, run via `/bin/sh -c`
    pub command: String,
    /// Host directory copied into the working area as the helper bundle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<PathBuf>,
    /// Path inside the container where the tool writes structured output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Id of the parser that understands this tool's output
    pub parser: String,
    /// Exit codes that mean "findings reported" rather than "tool failed".
    /// `None` defers to the parser's empirical defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benign_exit_codes: Option<BTreeSet<i32>>,
}

impl ToolConfig {
    pub fn new(id: impl Into<String>, image: impl Into<String>, command: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            parser: id.clone(),
            id,
            version: String::new(),
            image: image.into(),
            command: command.into(),
            bin: None,
            output: None,
            benign_exit_codes: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_bin(mut self, bin: impl Into<PathBuf>) -> Self {
        self.bin = Some(bin.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_parser(mut self, parser: impl Into<String>) -> Self {
        self.parser = parser.into();
        self
    }

    pub fn with_benign_exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.benign_exit_codes = Some(codes.into_iter().collect());
        self
    }
}
