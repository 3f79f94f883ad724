use once_cell::sync::Lazy;
use regex::Regex;

/// Letters, digits, `-` and `.`; at least one character.
static SPDX_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.\-]+$").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// Words reserved for resolution sentinels; a family key may not contain them.
const RESERVED_FAMILY_WORDS: [&str; 2] = ["conflict", "unknown"];

/// Check the syntactic shape of an SPDX license id.
///
/// Only the shape is checked; whether the id exists in the SPDX license list
/// is not.
pub fn is_valid_spdx_id(id: &str) -> bool {
    SPDX_ID.is_match(id)
}

/// Check a family key: SPDX id syntax, and none of the reserved words
/// (case-insensitive, anywhere in the key).
pub fn is_valid_family_key(family: &str) -> bool {
    if !is_valid_spdx_id(family) {
        return false;
    }
    let lower = family.to_ascii_lowercase();
    !RESERVED_FAMILY_WORDS.iter().any(|w| lower.contains(w))
}
