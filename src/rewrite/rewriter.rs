//! Placeholder substitution over response bodies.

use std::collections::HashMap;

use regex::NoExpand;

use crate::rewrite::registry::TagSnapshot;
use crate::store::ReplacementValue;

/// True when the response content type carries HTML.
pub fn is_html(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("html")
}

/// Substitute every known tag exactly once.
///
/// Tags covered by the matched rule's values receive the value data; every
/// other tag receives its default. The two sets are disjoint, so a default
/// can never overwrite a specific value. Replacement text is inserted
/// literally (no capture-group expansion), which also means a placeholder
/// cannot reappear through substitution unless a value itself contains one.
pub fn rewrite_body(body: &str, snapshot: &TagSnapshot, values: &[ReplacementValue]) -> String {
    // Later values for the same tag win, mirroring sequential application.
    let mut covered: HashMap<&str, &str> = HashMap::new();
    for value in values {
        covered.insert(value.tag.as_str(), value.data.as_str());
    }

    let mut out = body.to_string();
    for entry in &snapshot.entries {
        let replacement = covered
            .get(entry.name.as_str())
            .copied()
            .unwrap_or(entry.default_value.as_str());
        if let std::borrow::Cow::Owned(rewritten) =
            entry.pattern.replace_all(&out, NoExpand(replacement))
        {
            out = rewritten;
        }
    }
    out
}
