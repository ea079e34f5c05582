pub mod auth;
pub mod outbox;
pub mod phone_verify;
pub mod tenants;

pub use auth::AuthService;
pub use outbox::{EventHandler, HandlerRegistry};
pub use phone_verify::PhoneVerification;
pub use tenants::TenantService;
