//! Raw result of running one tool in one container

use serde::{Deserialize, Serialize};

/// What a container run handed back.
///
/// `exit_code == None` means the tool did not finish (timeout, or the
/// runtime could not drive the container at all). It is a soft failure, not
/// a crash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub exit_code: Option<i32>,
    pub log_lines: Vec<String>,
    /// Tar archive of the tool's structured-output path, when it existed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<u8>>,
}

impl ExecutionOutcome {
    /// The `(null, [], null)` outcome
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(exit_code: Option<i32>, log_lines: Vec<String>, output: Option<Vec<u8>>) -> Self {
        Self {
            exit_code,
            log_lines,
            output,
        }
    }

    /// Split raw log bytes into lines, replacing invalid UTF-8
    pub fn lines_from_bytes(bytes: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(bytes)
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.exit_code.is_none() && self.log_lines.is_empty() && self.output.is_none()
    }

    pub fn log_text(&self) -> String {
        self.log_lines.join("\n")
    }
}
