//! Key material for API tokens.
//!
//! A token is a public lookup key; the secret is the proof of possession. Only the SHA-256 digest
//! of the secret is stored, so a leaked database does not leak usable credentials.

use base64::{Engine as _, engine::general_purpose};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generates the public half of an API token: 16 random bytes, base64url encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);

    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates an API token secret with 256 bits of entropy.
///
/// The secret is returned to the caller once and never stored in plain form.
///
/// # Examples
///
/// ```
/// use fleetctl::crypto::generate_secret;
///
/// let secret = generate_secret();
/// assert_eq!(secret.len(), 43); // 32 bytes as unpadded base64url
/// ```
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);

    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Lowercase hex SHA-256 digest of a secret, as stored in `api_tokens.secret_hash`.
pub fn hash_secret(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    format!("{digest:x}")
}

/// Checks a presented secret against a stored digest without short-circuiting on the first
/// differing byte.
pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    constant_time_eq(hash_secret(secret).as_bytes(), stored_hash.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
