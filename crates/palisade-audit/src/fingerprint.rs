//! Query-shape fingerprinting.
//!
//! A fingerprint commits to the *structure* of a query, never its content.
//! Normalization is a deliberate downgrade from SQL semantics to a shape:
//!
//!   1. String literals (`'...'`, with `''` escapes) become `S`
//!   2. Numeric literals and `$n` parameter markers become `N`
//!   3. Words in the closed keyword vocabulary are uppercased and kept
//!   4. Every other word (identifiers, schema/table/column names) becomes `ID`
//!   5. Whitespace runs collapse to a single space
//!
//! Two queries differing only in literal values, spacing, or identifier
//! case therefore share a fingerprint; a different join keyword or an extra
//! column does not. The shape is keyed through HMAC-SHA256 so audit events
//! correlate without revealing even the shape to log readers.

use std::sync::OnceLock;

use hmac::{Hmac, Mac};
use regex::Regex;
use sha2::Sha256;

use crate::secret::AuditSecret;

type HmacSha256 = Hmac<Sha256>;

/// The keyword vocabulary preserved by normalization. Closed on purpose:
/// an unknown word is an identifier, even if some SQL dialect reserves it.
const KEYWORDS: &[&str] = &[
    "SELECT", "DISTINCT", "FROM", "WHERE", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER",
    "CROSS", "ON", "AND", "OR", "NOT", "IN", "IS", "NULL", "LIKE", "BETWEEN", "AS", "ORDER",
    "BY", "ASC", "DESC", "GROUP", "HAVING", "LIMIT", "TOP", "COUNT", "SUM", "AVG", "MIN", "MAX",
    "CASE", "WHEN", "THEN", "ELSE", "END",
];

fn is_keyword(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    KEYWORDS.iter().any(|k| *k == upper)
}

fn token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Alternation order matters: literals swallow their interior before
        // the word and number branches can see it.
        Regex::new(r"'(?:[^']|'')*'|\$\d+|\b\d+(?:\.\d+)?\b|[A-Za-z_][A-Za-z0-9_]*")
            .expect("static regex")
    })
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Reduce `query` to its structural shape. Deterministic and pure.
pub(crate) fn shape(query: &str) -> String {
    let tokenized = token_pattern().replace_all(query, |caps: &regex::Captures<'_>| {
        let token = &caps[0];
        if token.starts_with('\'') {
            "S".to_string()
        } else if token.starts_with('$') || token.chars().next().is_some_and(|c| c.is_ascii_digit())
        {
            "N".to_string()
        } else if is_keyword(token) {
            token.to_ascii_uppercase()
        } else {
            "ID".to_string()
        }
    });

    whitespace()
        .replace_all(tokenized.trim(), " ")
        .into_owned()
}

/// Computes keyed fingerprints over query shapes.
pub struct QueryFingerprinter {
    secret: AuditSecret,
}

impl QueryFingerprinter {
    pub fn new(secret: AuditSecret) -> Self {
        Self { secret }
    }

    /// HMAC-SHA256 over the normalized shape, hex-encoded.
    pub fn fingerprint(&self, query: &str) -> String {
        // HMAC accepts keys of any length; new_from_slice cannot fail.
        let mut mac = HmacSha256::new_from_slice(self.secret.expose())
            .expect("HMAC-SHA256 accepts any key length");
        mac.update(shape(query).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}
