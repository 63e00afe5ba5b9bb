//! Log Redaction
//!
//! Scrubs bearer tokens, JWTs, and Matrix access tokens from strings before
//! they are logged.

use once_cell::sync::Lazy;
use regex::Regex;

static BEARER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Bearer\s+[A-Za-z0-9\-._~+/]+=*").expect("static regex"));
static JWT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*").expect("static regex")
});
static ACCESS_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"access_token=[^&\s]+").expect("static regex"));
static MATRIX_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"syt_[A-Za-z0-9_]+").expect("static regex"));

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let out = BEARER_RE.replace_all(input, "Bearer [REDACTED_TOKEN]");
    let out = JWT_RE.replace_all(&out, "[REDACTED_JWT]");
    let out = ACCESS_TOKEN_RE.replace_all(&out, "access_token=[REDACTED]");
    MATRIX_TOKEN_RE.replace_all(&out, "[REDACTED_TOKEN]").into_owned()
}
