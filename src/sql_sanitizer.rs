//! Strips Markdown code fences from model output.
//!
//! Only wrapper syntax is removed. The enclosed statement text is kept
//! byte-for-byte apart from surrounding whitespace.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // A fence with its language tag: either the tag runs to end of line, or it is
    // one of the SQL tags written inline (```sql SELECT ...).
    static ref FENCE_WITH_TAG: Regex =
        Regex::new(r"```(?:[A-Za-z0-9_+-]*[ \t]*\r?\n|(?i:sqlite|sql)\b)?")
            .expect("fence pattern is valid");
}

/// Remove code fences (optionally language-tagged) and trim.
/// `clean(clean(x)) == clean(x)` for every input.
pub fn clean(raw: &str) -> String {
    let without_tags = FENCE_WITH_TAG.replace_all(raw, "");
    // Removing a tagged fence can butt stray backticks together.
    without_tags.replace("```", "").trim().to_string()
}
