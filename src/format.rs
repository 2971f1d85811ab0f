//! Pure formatting and qualifier utilities for readable-ER output.
//!
//! Everything here is independently callable: the renderer composes these,
//! and future renderer variants (or tests) can reach them directly.

use crate::model::er::LiteralValue;

/// Operand qualifiers recognized in readable-ER text.
pub const RECOGNIZED_QUALIFIERS: [&str; 4] = ["BF", "VA", "CO", "SV"];

/// Splits a leading qualifier token off `text`.
///
/// Only members of [`RECOGNIZED_QUALIFIERS`] count; any other first token
/// leaves the input unchanged with no qualifier.
pub fn split_qualifier(text: &str) -> (Option<&str>, &str) {
    if text.is_empty() {
        return (None, "");
    }

    match text.split_once(' ') {
        Some((first, rest)) if RECOGNIZED_QUALIFIERS.contains(&first) => (Some(first), rest),
        _ => (None, text),
    }
}

/// Prepends a qualifier to a value; an absent qualifier leaves the value
/// unchanged.
pub fn prefix_qualifier(qualifier: Option<&str>, value: &str) -> String {
    match qualifier {
        Some(q) if !q.is_empty() => format!("{q} {value}"),
        _ => value.to_string(),
    }
}

/// Prepends `level` tab characters.
pub fn indent_line(text: &str, level: usize) -> String {
    if level == 0 {
        return text.to_string();
    }
    format!("{}{text}", "\t".repeat(level))
}

/// Known table-I/O operation tokens and their readable forms.
const OPERATIONS: [(&str, &str); 6] = [
    ("FETCH_SINGLE", "FetchSingle"),
    ("FETCH_NEXT", "FetchNext"),
    ("SELECT", "Select"),
    ("DELETE", "Delete"),
    ("UPDATE", "Update"),
    ("INSERT", "Insert"),
];

/// Formats a raw table-I/O operation token.
///
/// Known tokens map case-insensitively to their readable forms; unknown
/// tokens keep their content with underscores stripped, case preserved.
/// A missing/blank token renders as the generic `"Operation"`.
pub fn format_file_io_operation(raw: Option<&str>) -> String {
    let trimmed = match raw {
        Some(raw) => raw.trim(),
        None => return "Operation".to_string(),
    };
    if trimmed.is_empty() {
        return "Operation".to_string();
    }

    for (token, readable) in OPERATIONS {
        if trimmed.eq_ignore_ascii_case(token) {
            return readable.to_string();
        }
    }

    trimmed.replace('_', "")
}

/// Formats a literal operand value: string literals double-quoted, numeric
/// literals as raw text, anything else as its trimmed text content.
pub fn format_literal_value(value: &LiteralValue) -> String {
    match value {
        LiteralValue::Str(text) => format!("\"{text}\""),
        LiteralValue::Number(raw) => raw.clone(),
        LiteralValue::Raw(text) => text.trim().to_string(),
    }
}

/// Business-function parameter line: `OUT` flows back (`<-`), `INOUT` both
/// ways (`<->`), everything else (including `IN`) forward (`->`).
pub fn format_business_function_param_line(copy_word: Option<&str>, left: &str, right: &str) -> String {
    match normalized_copy_word(copy_word) {
        Some("OUT") => format!("{left} <- {right}"),
        Some("INOUT") => format!("{left} <-> {right}"),
        _ => format!("{left} -> {right}"),
    }
}

/// Table-I/O parameter line: `OUT` flows back (`<-`), `IN` forward (`->`),
/// anything else is a plain binding (`=`).
pub fn format_file_io_param_line(copy_word: Option<&str>, left: &str, right: &str) -> String {
    match normalized_copy_word(copy_word) {
        Some("OUT") => format!("{left} <- {right}"),
        Some("IN") => format!("{left} -> {right}"),
        _ => format!("{left} = {right}"),
    }
}

fn normalized_copy_word(copy_word: Option<&str>) -> Option<&'static str> {
    let word = copy_word?.trim();
    for known in ["IN", "OUT", "INOUT"] {
        if word.eq_ignore_ascii_case(known) {
            return Some(known);
        }
    }
    None
}
