//! Property-based tests for JSON recovery from noisy log streams

use proptest::prelude::*;

use verifix_core::domain::{SecurityIssue, Severity};
use verifix_parsers::recover_json;

fn multiline_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,()]{0,24}(\n[a-zA-Z0-9 .,()]{0,24}){1,4}"
}

fn banner() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 :\\[\\]]{0,40}"
}

proptest! {
    /// A description carrying raw line breaks survives serialization,
    /// un-escaping and recovery
    #[test]
    fn prop_raw_newlines_in_description_recovered(description in multiline_text()) {
        let issue = SecurityIssue::new("mythril", Severity::High, "Reentrancy", description.clone());
        let strict = serde_json::to_string(&issue).unwrap();
        let raw = strict.replace("\\n", "\n");
        prop_assert!(serde_json::from_str::<serde_json::Value>(&raw).is_err());

        let value = recover_json(&raw).unwrap();
        let recovered: SecurityIssue = serde_json::from_value(value).unwrap();
        prop_assert_eq!(&recovered.description, &description);
        prop_assert_eq!(recovered, issue);
    }

    /// Banner text around the document does not get in the way
    #[test]
    fn prop_document_found_between_banners(before in banner(), after in banner(), count in 0u32..50) {
        let document = serde_json::json!({"issues": [], "count": count});
        let text = format!("{before}\n{document}\n{after}");

        let value = recover_json(&text).unwrap();
        prop_assert_eq!(value, document);
    }

    /// Text without any brace never yields an object
    #[test]
    fn prop_no_brace_no_object(text in "[^{}]{0,200}") {
        prop_assert!(recover_json(&text).is_err());
    }
}
