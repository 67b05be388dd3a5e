//! Opaque refresh tokens and session lifetimes.

use lazy_static::lazy_static;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tracing::warn;

const REFRESH_TOKEN_BYTES: usize = 40;
const DEFAULT_SESSION_LIFETIME: Duration = Duration::days(7);

/// 40 random bytes, hex-encoded (80 chars).
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 of the raw token, hex-encoded. This is what gets persisted.
pub fn hash_refresh_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Parses `<N>s|m|h|d`.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    lazy_static! {
        static ref DURATION_RE: Regex = Regex::new(r"^(\d+)([smhd])$").unwrap();
    }
    let caps = DURATION_RE.captures(raw.trim())?;
    let value: i64 = caps[1].parse().ok()?;
    let unit: i64 = match &caps[2] {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return None,
    };
    value.checked_mul(unit).map(Duration::seconds)
}

/// Absolute expiry for a session opened at `now`.
///
/// Falls back to 7 days when the setting is unparseable or would land past
/// the representable date range.
pub fn session_expiry(now: OffsetDateTime, raw: &str) -> OffsetDateTime {
    if let Some(expiry) = parse_duration(raw).and_then(|d| now.checked_add(d)) {
        return expiry;
    }
    warn!(value = raw, "unusable session lifetime, using 7d");
    now + DEFAULT_SESSION_LIFETIME
}
