//! Opaque random tokens for state parameters and session cookies.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use orrery_shared::{Error, Result};

/// Entropy per token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// 32 OS-random bytes, base64url without padding (43 characters).
pub fn random_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::fill(&mut bytes)
        .map_err(|e| Error::internal("OS random source failed").with_cause(e))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Compares two secrets without an early exit on the first differing byte.
///
/// A length mismatch still returns early, so only the length can leak.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
