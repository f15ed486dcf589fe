//! Time-based one-time codes (RFC 6238) over HMAC-SHA1.

use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

pub const STEP_SECS: i64 = 30;
pub const DIGITS: u32 = 6;

/// HOTP value for `counter` (RFC 4226 dynamic truncation).
pub fn hotp(key: &[u8], counter: u64) -> Option<u32> {
    let mut mac = <HmacSha1 as Mac>::new_from_slice(key).ok()?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    Some(binary % 10u32.pow(DIGITS))
}

fn counter_at(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(STEP_SECS)
}

/// The zero-padded code an authenticator app shows for `secret` at `now`.
pub fn code_at(secret: &str, now: DateTime<Utc>) -> Option<String> {
    let key = BASE32_NOPAD.decode(secret.trim_end_matches('=').as_bytes()).ok()?;
    let counter = u64::try_from(counter_at(now)).ok()?;
    hotp(&key, counter).map(|code| format!("{:0width$}", code, width = DIGITS as usize))
}

/// Check `code` against the base32 `secret`, accepting `skew` steps either side.
pub fn verify(secret: &str, code: &str, now: DateTime<Utc>, skew: u8) -> bool {
    let code = code.trim();
    if code.len() != DIGITS as usize || !code.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let Ok(expected) = code.parse::<u32>() else {
        return false;
    };
    let Ok(key) = BASE32_NOPAD.decode(secret.trim_end_matches('=').as_bytes()) else {
        tracing::error!("Stored two-factor secret is not valid base32");
        return false;
    };

    let current = counter_at(now);
    let skew = i64::from(skew);
    (current - skew..=current + skew)
        .filter(|counter| *counter >= 0)
        .any(|counter| hotp(&key, counter as u64) == Some(expected))
}
