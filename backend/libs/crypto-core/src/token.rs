use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

/// Bytes of entropy in an opaque secret (512 bits)
const OPAQUE_SECRET_BYTES: usize = 64;

/// Generate an opaque secret for refresh tokens.
///
/// 64 random bytes from the OS CSPRNG, base64-encoded for transport. The
/// caller is the only place the plaintext ever exists; storage keeps the
/// digest (`hash_secret`) only.
pub fn generate_opaque_secret() -> String {
    let mut bytes = [0u8; OPAQUE_SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// Generate a 6-digit numeric code, uniform over 000000..=999999.
///
/// Used for OTP display; verification of externally delivered codes happens
/// at the phone verification gateway, not here.
pub fn generate_numeric_code() -> String {
    let value: u32 = OsRng.gen_range(0..1_000_000);
    format!("{value:06}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_secret_decodes_to_64_bytes() {
        let secret = generate_opaque_secret();
        let bytes = STANDARD.decode(&secret).expect("secret is valid base64");
        assert_eq!(bytes.len(), OPAQUE_SECRET_BYTES);
    }

    #[test]
    fn test_opaque_secrets_are_unique() {
        let a = generate_opaque_secret();
        let b = generate_opaque_secret();
        assert_ne!(a, b);
    }

    #[test]
    fn test_numeric_code_shape() {
        for _ in 0..100 {
            let code = generate_numeric_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
