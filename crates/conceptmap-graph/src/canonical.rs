//! Label canonicalization.
//!
//! `canonicalize` produces the comparison key two labels must share to be
//! treated as the same concept candidate; `slugify` turns a label into an id
//! that is safe as a graph identifier and a file name. Both are Unicode-aware:
//! Japanese or Cyrillic labels survive, full-width forms fold to half-width.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

/// Maximum length (in characters) of a slug id.
pub const SLUG_MAX_CHARS: usize = 48;

// Normalization passes until a fixpoint; deleting punctuation can expose a new
// NFKC composition, so one pass is not always stable.
const MAX_PASSES: usize = 4;

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s\-]+").expect("static regex"))
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn canonical_pass(text: &str) -> String {
    let folded: String = text.nfkc().collect::<String>().to_lowercase();
    let stripped = disallowed_chars().replace_all(&folded, "");
    whitespace_runs()
        .replace_all(&stripped, " ")
        .trim()
        .to_string()
}

/// Normalize a free-text label into a comparison key.
///
/// Trims, applies NFKC, case-folds, removes everything except word characters,
/// whitespace and `-`, and collapses whitespace runs to one space.
/// Degenerate input yields an empty string.
pub fn canonicalize(text: &str) -> String {
    let mut current = canonical_pass(text);
    for _ in 1..MAX_PASSES {
        let next = canonical_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Turn a label into a graph-safe identifier.
///
/// Spaces become `_`, only word characters and `-` are kept, and the result
/// is cut to [`SLUG_MAX_CHARS`] characters. Returns an empty string when
/// nothing survives; callers substitute a hash-derived fallback.
pub fn slugify(text: &str) -> String {
    // canonicalize leaves only word characters, `-` and single spaces
    canonicalize(text)
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .take(SLUG_MAX_CHARS)
        .collect()
}

/// SHA-256 of `data` as 64 lowercase hex digits.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Lowercase hex prefix (at most 64 chars) of the SHA-256 of `text`.
pub fn short_hash(text: &str, hex_len: usize) -> String {
    let mut out = sha256_hex(text.as_bytes());
    out.truncate(hex_len.min(64));
    out
}
