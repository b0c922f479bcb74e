//! Parser contract and result types

use std::collections::BTreeSet;

use verifix_core::domain::{ExecutionOutcome, SecurityIssue};

/// Structural shape of a tool's report, fixed per parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputShape {
    /// JSON written to a file inside the container, retrieved as a tar archive
    ArchiveJson,
    /// JSON printed somewhere in the log stream
    StreamJson,
    /// One finding per matched line or block of text
    LineGrammar,
}

/// Everything a parser may look at for one tool run
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// Canonical tool id, stamped onto every issue
    pub tool_id: &'a str,
    pub outcome: &'a ExecutionOutcome,
    /// Declared structured-output path inside the container
    pub output_path: Option<&'a str>,
    /// Exit codes that mean "findings reported", not "tool failed"
    pub benign_exit_codes: &'a BTreeSet<i32>,
}

/// Normalized issues plus the residual diagnostics of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseResult {
    pub issues: Vec<SecurityIssue>,
    /// The tool reported a failure through its own conventions
    pub errors: BTreeSet<String>,
    /// The infrastructure around the tool failed
    pub fails: BTreeSet<String>,
    /// Non-fatal notices
    pub infos: BTreeSet<String>,
}

impl ParseResult {
    pub fn with_diagnostics(errors: BTreeSet<String>, fails: BTreeSet<String>) -> Self {
        Self {
            errors,
            fails,
            ..Default::default()
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.fails.insert(message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.insert(message.into());
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.infos.insert(message.into());
    }

    pub fn has_fails(&self) -> bool {
        !self.fails.is_empty()
    }
}

/// One implementation per analysis tool
pub trait ToolParser: Send + Sync {
    /// Parser id referenced by `ToolConfig::parser`
    fn id(&self) -> &'static str;

    fn shape(&self) -> OutputShape;

    /// Exit codes this tool uses to signal findings, used when the tool
    /// declaration does not list its own
    fn default_benign_exit_codes(&self) -> BTreeSet<i32> {
        BTreeSet::new()
    }

    fn parse(&self, ctx: &ParseContext<'_>) -> ParseResult;
}
