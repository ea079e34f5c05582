/// Mesa Identity Service Library
///
/// Credential and tenancy core for the Mesa back office.
///
/// ## Modules
///
/// - `config`: Service configuration
/// - `db`: Database queries (users, roles, refresh tokens, tenants, outbox)
/// - `error`: Error taxonomy
/// - `models`: Data models and request/response shapes
/// - `security`: Password and PIN hashing
/// - `services`: Auth and tenant orchestrators, phone verification, outbox dispatcher
/// - `validators`: Input validation
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod security;
pub mod services;
pub mod validators;

// Re-export commonly used types
pub use error::{IdentityError, Result};
pub use services::{AuthService, TenantService};
