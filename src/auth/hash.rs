use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::Rng;
use sha2::{Digest, Sha256};

const SCHEME: &str = "sha256";

/// Salted password hash in the form `sha256$<salt>$<digest>`, both parts
/// base64. A fresh random salt per call keeps equal passwords from hashing
/// equal.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::rng().random();
    encode(&salt, password)
}

fn encode(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    format!("{SCHEME}${}${}", BASE64.encode(salt), BASE64.encode(digest))
}

/// Re-derives the hash with the stored salt and compares. Anything that does
/// not parse as a stored hash simply fails verification.
pub fn verify_password(stored: &str, password: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(scheme), Some(salt), Some(_)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let Ok(salt) = BASE64.decode(salt) else {
        return false;
    };
    encode(&salt, password) == stored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let stored = hash_password("Who am I");
        assert!(verify_password(&stored, "Who am I"));
        assert!(!verify_password(&stored, "Impossible string???"));
    }

    #[test]
    fn equal_passwords_hash_differently() {
        let first = hash_password("12345678");
        let second = hash_password("12345678");
        assert_ne!(first, second);
        assert!(verify_password(&first, "12345678"));
        assert!(verify_password(&second, "12345678"));
    }

    #[test]
    fn malformed_stored_values_never_verify() {
        assert!(!verify_password("", "password"));
        assert!(!verify_password("sha256$only-two-parts", "password"));
        assert!(!verify_password("md5$c2FsdA==$ZGlnZXN0", "password"));
        assert!(!verify_password("sha256$not-base64!$ZGlnZXN0", "password"));
    }
}
