//! Person name normalization for gazette index lookups.
//!
//! The index matches names more reliably when they arrive accent-free and
//! title-cased, so every person lookup goes through [`normalize_for_url`].

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Normalize a human-entered person name for use as a URL path segment.
///
/// Lower-cases, strips diacritics and parentheses, then upper-cases the first
/// letter of every component (after whitespace, `-` or `'`).
/// The function is idempotent.
pub fn normalize_for_url(input: &str) -> String {
    let stripped: String = input
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c) && *c != '(' && *c != ')')
        .collect();

    let mut out = String::with_capacity(stripped.len());
    let mut at_boundary = true;
    for c in stripped.trim().chars() {
        if at_boundary && c.is_alphabetic() {
            push_upper(&mut out, c);
        } else {
            out.push(c);
        }
        at_boundary = c.is_whitespace() || c == '-' || c == '\'';
    }
    out
}

/// Push the upper-case form of `c`, keeping `c` when that form expands to
/// several characters (`ß` -> `SS` would not survive a second pass).
fn push_upper(out: &mut String, c: char) {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => out.push(u),
        _ => out.push(c),
    }
}
