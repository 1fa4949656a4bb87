//! `Authorization: Bearer <token>` parsing.

use regex::Regex;
use std::sync::OnceLock;

fn bearer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^Bearer\s+(\S+)").expect("static bearer pattern"))
}

/// Returns the token from an `Authorization` header value, or `None` when the
/// header is not a usable bearer credential (wrong scheme, empty token).
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let captures = bearer_pattern().captures(header?)?;
    captures.get(1).map(|token| token.as_str())
}
