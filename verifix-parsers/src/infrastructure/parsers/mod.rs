//! One parser per analysis tool

pub mod mythril;
pub mod oyente;
pub mod semgrep;
pub mod slither;
pub mod smartcheck;
pub mod solhint;

pub use mythril::MythrilParser;
pub use oyente::OyenteParser;
pub use semgrep::SemgrepParser;
pub use slither::SlitherParser;
pub use smartcheck::SmartCheckParser;
pub use solhint::SolhintParser;

use tracing::warn;

use crate::domain::{ParseContext, ParseResult};
use crate::infrastructure::archive;
use crate::infrastructure::json::{self, JsonRecoveryError};

const GENERIC_RECOMMENDATION: &str = "Review and apply security best practices";
const REENTRANCY_RECOMMENDATION: &str = "Use ReentrancyGuard and checks-effects-interactions pattern";

/// Content of the declared output file, if the run produced one
fn archived_output(ctx: &ParseContext<'_>, result: &mut ParseResult) -> Option<String> {
    let (bytes, path) = (ctx.outcome.output.as_deref()?, ctx.output_path?);
    match archive::extract_output(bytes, path) {
        Ok(content) => content,
        Err(e) => {
            warn!(tool = ctx.tool_id, error = %e, "Falling back to log stream");
            result.info(format!("output archive unreadable: {e}"));
            None
        }
    }
}

/// Decode a JSON document, recording a fail when none can be recovered
fn decode_document<T: serde::de::DeserializeOwned>(
    text: &str,
    result: &mut ParseResult,
) -> Option<T> {
    let value = match json::recover_json(text) {
        Ok(value) => value,
        Err(JsonRecoveryError::NoObject) => {
            result.fail("no JSON output found");
            return None;
        }
        Err(e) => {
            result.fail(format!("error parsing JSON output: {}", truncate(&e.to_string(), 100)));
            return None;
        }
    };
    match serde_json::from_value(value) {
        Ok(document) => Some(document),
        Err(e) => {
            result.fail(format!("unexpected JSON structure: {}", truncate(&e.to_string(), 100)));
            None
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Base name of a path as printed by a tool
fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
