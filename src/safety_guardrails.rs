//! SQL Safety Guardrails
//!
//! Keyword blocklist applied to model-generated SQL before it can reach the
//! executor. This is a coarse lexical check, not a parser: any whole-word
//! occurrence of a forbidden keyword rejects the statement, including inside
//! identifiers such as a table named `schema` or string literals.
//! Known false positives are accepted.

use lazy_static::lazy_static;
use regex::Regex;

/// Keywords that reject a statement when they appear as a whole word.
pub const FORBIDDEN_KEYWORDS: [&str; 7] =
    ["drop", "delete", "update", "insert", "alter", "system", "schema"];

lazy_static! {
    static ref FORBIDDEN_PATTERN: Regex = Regex::new(&format!(
        r"\b(?:{})\b",
        FORBIDDEN_KEYWORDS.join("|")
    ))
    .expect("forbidden keyword pattern is valid");
}

/// True when the statement contains none of [`FORBIDDEN_KEYWORDS`] as a whole word.
/// Empty input is safe.
pub fn is_safe(sql: &str) -> bool {
    forbidden_keyword(sql).is_none()
}

/// First forbidden keyword found in `sql`, lower-cased.
pub fn forbidden_keyword(sql: &str) -> Option<String> {
    let lowered = sql.to_lowercase();
    FORBIDDEN_PATTERN
        .find(&lowered)
        .map(|m| m.as_str().to_string())
}
