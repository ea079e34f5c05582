use constant_time_eq::constant_time_eq;
use sha2::{Digest, Sha256};

/// Compute the storage digest of an opaque secret.
///
/// SHA-256, uppercase hex. The digest is the only thing ever persisted for a
/// refresh token or phone login code; the plaintext secret never reaches the
/// database. Deterministic, so the digest doubles as the lookup key.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode_upper(hasher.finalize())
}

/// Constant-time digest comparison.
///
/// Timing-safe equality is a correctness requirement wherever a digest
/// derived from caller input is compared against a stored one.
pub fn digest_eq(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let secret = "some-opaque-secret";
        assert_eq!(hash_secret(secret), hash_secret(secret));
    }

    #[test]
    fn test_hash_is_uppercase_hex_of_sha256() {
        let digest = hash_secret("hello world");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        // SHA-256("hello world")
        assert_eq!(
            digest,
            "B94D27B9934D3E08A52E52D7DA7DABFAC484EFE37A5380EE9088F7ACE2EFCDE9"
        );
    }

    #[test]
    fn test_different_secrets_differ() {
        assert_ne!(hash_secret("a"), hash_secret("b"));
    }

    #[test]
    fn test_digest_eq() {
        let d = hash_secret("token");
        assert!(digest_eq(&d, &hash_secret("token")));
        assert!(!digest_eq(&d, &hash_secret("other")));
        assert!(!digest_eq(&d, ""));
    }
}
