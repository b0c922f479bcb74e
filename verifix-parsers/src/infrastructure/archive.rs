//! Extraction of structured output from the tar archive a container hands back

use std::io::{Cursor, Read};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("unreadable tar archive: {0}")]
    Io(#[from] std::io::Error),
}

/// Archive member names under which `output_path` may appear.
///
/// `docker cp` stores a single file under its base name, other engines keep
/// the relative or absolute path.
fn path_variants(output_path: &str) -> Vec<String> {
    let clean = output_path.trim_start_matches('/');
    let mut variants = vec![clean.to_string(), format!("/{clean}")];
    let base = clean.rsplit('/').next().unwrap_or(clean);
    if !variants.iter().any(|v| v == base) {
        variants.push(base.to_string());
    }
    variants
}

fn looks_like_output(name: &str) -> bool {
    name.ends_with(".json") || name.to_ascii_lowercase().contains("output")
}

/// Read the member matching `output_path` from `archive`.
///
/// Falls back to the first regular file that looks like JSON output.
/// `Ok(None)` means the archive is valid but holds nothing usable.
pub fn extract_output(archive: &[u8], output_path: &str) -> Result<Option<String>, ArchiveError> {
    let variants = path_variants(output_path);
    let mut exact = None;
    let mut fallback = None;

    let mut tar = tar::Archive::new(Cursor::new(archive));
    for entry in tar.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().into_owned();
        let is_exact = variants.iter().any(|v| *v == name);
        if !is_exact && (fallback.is_some() || !looks_like_output(&name)) {
            continue;
        }

        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        if is_exact {
            exact = Some(content);
            break;
        }
        debug!(member = %name, "Using fallback archive member");
        fallback = Some(content);
    }

    Ok(exact.or(fallback))
}
