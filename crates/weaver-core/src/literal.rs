//! Constrained structured-value parser for worker results.
//!
//! Only data literals are accepted: numbers, strings, booleans, null, arrays
//! and objects. Nothing in the text is ever evaluated.

use serde_json::Value;

use crate::error::{Error, Result};

/// Longest excerpt of rejected text quoted back in errors.
const EXCERPT_LEN: usize = 80;

/// Parse a worker's result text into a structured value
///
/// # Errors
/// Returns [`Error::ResultParse`] if the text is empty, is not a single data
/// literal, or has trailing content
pub fn parse_literal(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::ResultParse("empty result".to_owned()));
    }

    serde_json::from_str(trimmed)
        .map_err(|err| Error::ResultParse(format!("{err} in `{}`", excerpt(trimmed))))
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_LEN {
        return text.to_owned();
    }
    let head: String = text.chars().take(EXCERPT_LEN).collect();
    format!("{head}...")
}
