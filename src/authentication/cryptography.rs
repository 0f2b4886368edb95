use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::constants::TOKEN_BYTES;

/// Password hashing with either production or cheap (dev/test) argon2 parameters.
#[derive(Clone)]
pub struct Hasher {
    argon2: Argon2<'static>,
}

impl Hasher {
    pub fn new(fast: bool) -> Self {
        let argon2 = if fast {
            let params = Params::new(1024, 1, 1, None).unwrap_or_default();
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        } else {
            Argon2::default()
        };

        Self { argon2 }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);

        Ok(self
            .argon2
            .hash_password(password.as_bytes(), &salt)?
            .to_string())
    }

    pub fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, argon2::password_hash::Error> {
        let parsed_hash = PasswordHash::new(password_hash)?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Opaque bearer key handed to the client; only its digest is stored.
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn digest_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hasher = Hasher::new(true);
        let hash = hasher.hash_password("testpass123").unwrap();

        assert_ne!(hash, "testpass123");
        assert!(hasher.verify_password("testpass123", &hash).unwrap());
        assert!(!hasher.verify_password("wrong-pass", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(Hasher::new(true).verify_password("x", "not-a-hash").is_err());
    }

    #[test]
    fn tokens_are_unique_hex() {
        let a = generate_access_token();
        let b = generate_access_token();

        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn digest_is_stable_and_distinct_from_token() {
        let token = generate_access_token();
        assert_eq!(digest_token(&token), digest_token(&token));
        assert_ne!(digest_token(&token), token);
        assert_eq!(digest_token(&token).len(), 64);
    }
}
