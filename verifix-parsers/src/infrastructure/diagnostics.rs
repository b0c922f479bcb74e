//! Exit-code and log classification shared by every parser

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

static ANSI: Lazy<Regex> = Lazy::new(|| Regex::new("\x1b\\[[^m]*m").expect("valid regex"));

const TRACEBACK: &str = "Traceback (most recent call last):";

static EXCEPTIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^.*line [0-9: ]*(Segmentation fault|Killed)",
        r#"^Exception in thread "[^"]*" (.*)"#,
        r"^(?:[a-zA-Z0-9]+\.)+[a-zA-Z0-9]*Exception: (.*)$",
        r"^thread '[^']*' panicked at '([^']*)'",
        r"^thread '[^']*' panicked at (\S+:\d+:\d+):?$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Named failures for exit codes produced by the container engine
fn docker_code(code: i32) -> Option<&'static str> {
    match code {
        125 => Some("DOCKER_INVOCATION_PROBLEM"),
        126 => Some("DOCKER_CMD_NOT_EXECUTABLE"),
        127 => Some("DOCKER_CMD_NOT_FOUND"),
        137 => Some("DOCKER_KILL_OOM"),
        139 => Some("DOCKER_SEGV"),
        143 => Some("DOCKER_TERM"),
        _ => None,
    }
}

/// Remove ANSI colour sequences
pub fn strip_ansi(line: &str) -> String {
    ANSI.replace_all(line, "").into_owned()
}

pub fn strip_ansi_lines(lines: &[String]) -> Vec<String> {
    lines.iter().map(|line| strip_ansi(line)).collect()
}

/// Uncaught exceptions visible in the log, as `exception (<text>)`
pub fn exceptions(lines: &[String]) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut in_traceback = false;
    for line in lines {
        if in_traceback {
            // the first unindented line after a traceback names the exception
            if !line.is_empty() && !line.starts_with(' ') {
                found.insert(format!("exception ({line})"));
                in_traceback = false;
            }
        } else if line.ends_with(TRACEBACK) {
            in_traceback = true;
        } else if let Some(text) = EXCEPTIONS
            .iter()
            .find_map(|re| re.captures(line).and_then(|c| c.get(1)))
        {
            found.insert(format!("exception ({})", text.as_str()));
        }
    }
    found
}

/// Classify an exit code and log into `(errors, fails)`.
///
/// - `None` is a timeout, recorded as the fail `DOCKER_TIMEOUT`
/// - codes in `benign` are findings, not failures
/// - container-engine codes and signals (128..=192) are fails
/// - every other non-zero code is an error `EXIT_CODE_<n>`
///
/// When `log_expected` is set, an empty log with no other fail is itself the
/// fail `execution failed`.
pub fn errors_fails(
    exit_code: Option<i32>,
    log: &[String],
    benign: &BTreeSet<i32>,
    log_expected: bool,
) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut errors = BTreeSet::new();
    let mut fails = BTreeSet::new();

    match exit_code {
        None => {
            fails.insert("DOCKER_TIMEOUT".to_string());
        }
        Some(0) => {}
        Some(code) if benign.contains(&code) => {}
        Some(code) => {
            if let Some(name) = docker_code(code) {
                fails.insert(name.to_string());
            } else if (128..=192).contains(&code) {
                fails.insert(format!("DOCKER_RECEIVED_SIGNAL_{}", code - 128));
            } else {
                errors.insert(format!("EXIT_CODE_{code}"));
            }
        }
    }

    if log.iter().any(|line| !line.trim().is_empty()) {
        fails.extend(exceptions(&strip_ansi_lines(log)));
    } else if log_expected && fails.is_empty() {
        fails.insert("execution failed".to_string());
    }

    (errors, fails)
}
