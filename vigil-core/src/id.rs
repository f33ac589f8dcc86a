//! Prefixed ID generation
//!
//! IDs carry a short type prefix (`usr_…`, `flag_…`) followed by at least
//! 96 bits of entropy encoded as URL-safe base64 without padding.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};

/// Number of random bytes in a generated ID (96 bits).
const ID_ENTROPY_BYTES: usize = 12;

/// Generate a prefixed random ID, e.g. `usr_8f1Lk3q9X2ZvT5mA`.
///
/// # Panics
///
/// Panics if the OS random number generator fails, which indicates a system
/// entropy failure no security-sensitive operation should survive.
pub fn generate_prefixed_id(prefix: &str) -> String {
    let mut bytes = [0u8; ID_ENTROPY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");

    format!("{prefix}_{}", BASE64_URL_SAFE_NO_PAD.encode(bytes))
}

/// Validate that an ID has the expected prefix and enough entropy.
pub fn validate_prefixed_id(id: &str, expected_prefix: &str) -> bool {
    let Some(random_part) = id.strip_prefix(expected_prefix) else {
        return false;
    };
    let Some(random_part) = random_part.strip_prefix('_') else {
        return false;
    };

    match BASE64_URL_SAFE_NO_PAD.decode(random_part) {
        Ok(decoded) => decoded.len() >= ID_ENTROPY_BYTES,
        Err(_) => false,
    }
}
