/// Shared cryptographic primitives for Mesa services
///
/// Provides the building blocks the identity core is made of:
/// - Opaque secret generation and one-way digests (refresh tokens, OTP codes)
/// - Access token issuance and validation (HS256 JWT)
///
/// Signing configuration is always passed in explicitly; this crate holds no
/// process-wide key state.
pub mod hash;
pub mod jwt;
pub mod token;

pub use hash::{digest_eq, hash_secret};
pub use jwt::{AccessTokenIssuer, Claims, JwtConfig};
pub use token::{generate_numeric_code, generate_opaque_secret};
