/// One-time code generation and hashing
use rand::{rngs::OsRng, Rng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Smallest and largest six-digit codes (inclusive)
const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// Generate a six-digit numeric code from the OS CSPRNG
pub fn generate_code() -> String {
    let code: u32 = OsRng.gen_range(CODE_MIN..=CODE_MAX);
    code.to_string()
}

/// SHA-256 hex digest of a code. Unsalted and deterministic.
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a submitted code against a stored digest in constant time
pub fn verify_code(code: &str, stored_hash: &str) -> bool {
    let computed = hash_code(code);
    if computed.len() != stored_hash.len() {
        return false;
    }
    computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}
