pub mod refresh_token;
pub mod role;
pub mod tenant;
pub mod user;

pub use refresh_token::RefreshTokenRecord;
pub use role::{Role, RoleRecord};
pub use tenant::{Branch, Tenant, TenantMembership};
pub use user::User;
