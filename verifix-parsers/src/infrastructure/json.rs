//! Recovery of JSON documents embedded in noisy tool output

use serde_json::Value;
use thiserror::Error;

/// How many top-level objects are tried before giving up
const MAX_CANDIDATES: usize = 16;

#[derive(Debug, Error)]
pub enum JsonRecoveryError {
    #[error("no JSON object found")]
    NoObject,

    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Byte range of the balanced `{...}` span starting at `start`.
///
/// Braces inside string literals are ignored. Returns `None` when the span
/// never closes.
fn balanced_span(text: &str, start: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Whether the `{` at `start` can open a JSON object (`{"` or `{}`)
fn opens_object(text: &str, start: usize) -> bool {
    matches!(
        text[start + 1..].trim_start().chars().next(),
        Some('"') | Some('}')
    )
}

/// Whether `text` contains anything that starts like a JSON object
pub fn has_object_start(text: &str) -> bool {
    text.match_indices('{').any(|(start, _)| opens_object(text, start))
}

/// First balanced `{...}` span in `text`
pub fn find_balanced_object(text: &str) -> Option<&str> {
    candidates(text).into_iter().next()
}

/// Top-level object spans in order of appearance.
///
/// Braces nested in an earlier span are never candidates of their own. An
/// object that never closes ends the scan, since everything after it belongs
/// to the truncated document.
fn candidates(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut resume = 0;

    for (start, _) in text.match_indices('{') {
        if start < resume || !opens_object(text, start) {
            continue;
        }
        if spans.len() == MAX_CANDIDATES {
            break;
        }
        match balanced_span(text, start) {
            Some(span) => {
                resume = start + span.len();
                spans.push(span);
            }
            None => break,
        }
    }
    spans
}

/// Escape raw control characters that appear inside string literals
pub fn escape_control_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() && (c as u32) < 0x20 => {
                    out.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }
    out
}

/// Last resort: every line terminator and tab becomes an escape sequence
pub fn escape_all_line_breaks(text: &str) -> String {
    text.replace("\r\n", "\\n")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Decode one candidate, escalating from strict to lenient
fn decode_candidate(candidate: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(candidate)
        .or_else(|_| serde_json::from_str(&escape_control_chars(candidate)))
        .or_else(|_| serde_json::from_str(&escape_all_line_breaks(candidate)))
}

/// Recover a JSON object from `text`.
///
/// Tries the whole text, then each top-level balanced `{...}` span in order
/// (skipping banner noise before and after), escaping control characters
/// when strict decoding fails. A truncated document yields
/// [`JsonRecoveryError::NoObject`] rather than one of its nested entries.
pub fn recover_json(text: &str) -> Result<Value, JsonRecoveryError> {
    let trimmed = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let mut last_error = None;
    for candidate in candidates(trimmed) {
        match decode_candidate(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(e) => Err(JsonRecoveryError::Malformed(e)),
        None => Err(JsonRecoveryError::NoObject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_finds_object_between_banners() {
        let text = "Mythril v0.24\n{\"a\": {\"b\": 1}}\nDone in 3s {not json";
        assert_eq!(find_balanced_object(text), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(recover_json(text).unwrap()["a"]["b"], 1);
    }

    #[test]
    fn test_braces_inside_strings_do_not_count() {
        let text = r#"noise {"msg": "a } inside", "n": 2} tail"#;
        assert_eq!(recover_json(text).unwrap()["n"], 2);
    }

    #[test]
    fn test_raw_newline_inside_string_is_escaped() {
        let text = "{\"description\": \"line one\nline two\tend\"}";
        assert!(serde_json::from_str::<Value>(text).is_err());
        let value = recover_json(text).unwrap();
        assert_eq!(value["description"], "line one\nline two\tend");
    }

    #[test]
    fn test_skips_unbalanced_prefix_candidates() {
        let text = "progress {42% \n{\"ok\": true}";
        assert_eq!(recover_json(text).unwrap()["ok"], true);
    }

    #[test]
    fn test_truncated_document_does_not_yield_nested_entry() {
        let text = r#"{"issues": [{"title": "Reentrancy", "lineno": 9}, {"title": "Unchecked"#;
        assert_eq!(find_balanced_object(text), None);
        assert!(matches!(recover_json(text), Err(JsonRecoveryError::NoObject)));
    }

    #[test]
    fn test_nested_objects_of_a_broken_document_are_not_retried() {
        let text = r#"{"a": nope, "b": {"c": 1}}"#;
        assert!(matches!(
            recover_json(text),
            Err(JsonRecoveryError::Malformed(_))
        ));
    }

    #[test]
    fn test_object_start_detection() {
        assert!(has_object_start("banner\n{ \"results\": []}"));
        assert!(has_object_start("{}"));
        assert!(!has_object_start("{ not json at all"));
        assert!(!has_object_start("Done in {3s}"));
    }

    #[test]
    fn test_no_object() {
        assert!(matches!(
            recover_json("plain text only"),
            Err(JsonRecoveryError::NoObject)
        ));
    }

    #[test]
    fn test_malformed_object() {
        assert!(matches!(
            recover_json("{\"a\": nope}"),
            Err(JsonRecoveryError::Malformed(_))
        ));
    }
}
