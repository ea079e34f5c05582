/// Credential hashing and verification using Argon2id. PINs go through
/// the same hasher as passwords; a stored hash never reveals which kind
/// of secret produced it.
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};

use crate::error::{IdentityError, Result};

/// Hash a password or PIN for storage. Strength rules are enforced by
/// the request validators before this is reached.
pub fn hash_password(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|_| IdentityError::Internal("Failed to hash credential".to_string()))?
        .to_string();

    Ok(hash)
}

/// Verify a presented secret against a stored hash.
///
/// A malformed stored hash is an internal fault, not a caller mistake.
/// A mismatch comes back as the same undifferentiated `Unauthorized`
/// every other credential failure maps to.
pub fn verify_password(secret: &str, stored_hash: &str) -> Result<()> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|_| IdentityError::Internal("Invalid credential hash format".to_string()))?;

    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .map_err(|_| IdentityError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Secure123").unwrap();
        assert!(verify_password("Secure123", &hash).is_ok());
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let hash = hash_password("Secure123").unwrap();
        let err = verify_password("Wrong123", &hash).unwrap_err();
        assert!(matches!(err, IdentityError::Unauthorized));
    }

    #[test]
    fn test_pin_round_trip() {
        let hash = hash_password("4821").unwrap();
        assert!(verify_password("4821", &hash).is_ok());
        assert!(verify_password("4822", &hash).is_err());
    }

    #[test]
    fn test_garbage_stored_hash_is_internal() {
        let err = verify_password("Secure123", "not-a-hash").unwrap_err();
        assert!(matches!(err, IdentityError::Internal(_)));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("Secure123").unwrap();
        let b = hash_password("Secure123").unwrap();
        assert_ne!(a, b);
    }
}
