use argon2::password_hash::{rand_core::OsRng as SaltRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;

/// 256 bits of entropy per creator secret
const SECRET_BYTES: usize = 32;

/// Mint a fresh creator secret.
///
/// Returned to the creator exactly once; only the Argon2 hash is ever
/// stored.
pub fn issue_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a secret with Argon2id for storage
pub fn hash_secret(secret: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut SaltRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| format!("Failed to hash creator secret: {}", e))
}

/// Verify a presented secret against a stored hash.
///
/// Any malformed or empty input verifies to false, never to a distinct
/// error. The Argon2 verification itself compares in constant time.
pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let parsed_hash = match PasswordHash::new(stored_hash) {
        Ok(hash) => hash,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_secret_verifies_against_its_hash() {
        let secret = issue_secret();
        let hash = hash_secret(&secret).unwrap();
        assert!(verify_secret(&secret, &hash));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let hash = hash_secret(&issue_secret()).unwrap();
        assert!(!verify_secret(&issue_secret(), &hash));
    }

    #[test]
    fn empty_secret_and_malformed_hash_fail_closed() {
        let hash = hash_secret("some-secret").unwrap();
        assert!(!verify_secret("", &hash));
        assert!(!verify_secret("some-secret", "not-a-phc-string"));
    }

    #[test]
    fn secrets_are_unique_and_long_enough() {
        let a = issue_secret();
        let b = issue_secret();
        assert_ne!(a, b);
        // 32 bytes base64url without padding
        assert_eq!(a.len(), 43);
    }
}
