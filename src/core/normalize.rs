//! Key normalization for import deduplication
//!
//! These rules decide which rows collide on re-import, so they must stay
//! stable across export regenerations. The original (un-normalized) value is
//! always stored alongside for display.

/// Normalize a part's unique code: trim, uppercase, drop all whitespace
pub fn normalize_uniq(value: &str) -> String {
    value
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Normalize a part number for lookup
///
/// Uppercases, maps the letter `O` to digit `0`, and drops every character
/// that is not an ASCII letter or digit. `"ab-O1"` becomes `"AB01"`.
pub fn normalize_part_number(value: &str) -> String {
    value
        .trim()
        .to_uppercase()
        .chars()
        .map(|c| if c == 'O' { '0' } else { c })
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}

/// Normalize a material or defect name: uppercase with single-space runs
pub fn normalize_name(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Map a free-form line label onto `press`, `sewing`, or `mixed`
pub fn normalize_line(value: &str) -> &'static str {
    let text = value.trim().to_lowercase();
    if text.contains("press") {
        "press"
    } else if text.contains("sew") {
        "sewing"
    } else {
        "mixed"
    }
}

/// Lookup key for a production line code
pub fn line_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Trim a list of codes, dropping empties and keeping first occurrence order
pub fn clean_codes<'a>(values: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let trimmed = value.trim();
        if !trimmed.is_empty() && !out.iter().any(|v| v == trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}
