//! Invocation template rendering

use std::time::Duration;

use verifix_core::domain::tool::{
    PLACEHOLDER_BIN, PLACEHOLDER_FILENAME, PLACEHOLDER_MAIN, PLACEHOLDER_TIMEOUT,
};

/// Values substituted into a tool's invocation template
#[derive(Debug, Clone)]
pub struct TemplateContext {
    /// In-container path of the source snapshot
    pub filename: String,
    pub timeout: Duration,
    /// In-container path of the helper bundle
    pub bin_dir: String,
}

/// Substitute placeholders in `template`.
///
/// Quoted forms (`'$FILENAME'`) are replaced first so that their quotes
/// survive around the substituted value, then bare occurrences.
pub fn render_command(template: &str, ctx: &TemplateContext) -> String {
    let timeout = ctx.timeout.as_secs().to_string();
    let substitutions = [
        (PLACEHOLDER_FILENAME, ctx.filename.as_str()),
        (PLACEHOLDER_TIMEOUT, timeout.as_str()),
        (PLACEHOLDER_BIN, ctx.bin_dir.as_str()),
        (PLACEHOLDER_MAIN, "0"),
    ];

    let mut command = template.to_string();
    for (placeholder, value) in substitutions {
        command = command.replace(&format!("'{placeholder}'"), &format!("'{value}'"));
    }
    for (placeholder, value) in substitutions {
        command = command.replace(placeholder, value);
    }
    command
}
