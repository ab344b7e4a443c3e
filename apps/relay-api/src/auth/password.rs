//! Salted password hashing for the register/login endpoints.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

const SALT_BYTES: usize = 16;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password with a random salt. Output is `<salt>$<digest>`, both
/// base64url-encoded.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_BYTES];
    rand::thread_rng().fill(&mut salt[..]);

    let digest = digest_with_salt(&salt, password);
    format!("{}${}", URL_SAFE_NO_PAD.encode(salt), URL_SAFE_NO_PAD.encode(digest))
}

/// Check a password against a stored `<salt>$<digest>` hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_part, digest_part)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = URL_SAFE_NO_PAD.decode(salt_part) else {
        return false;
    };
    let Ok(expected) = URL_SAFE_NO_PAD.decode(digest_part) else {
        return false;
    };

    digest_with_salt(&salt, password).as_slice() == expected.as_slice()
}

fn digest_with_salt(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("hunter22");
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("hunter22");
        let b = hash_password("hunter22");
        assert_ne!(a, b);
        assert!(verify_password("hunter22", &a));
        assert!(verify_password("hunter22", &b));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("x", "no-dollar-sign"));
        assert!(!verify_password("x", "!!$!!"));
    }
}
