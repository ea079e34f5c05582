/// Database repositories for the identity core
///
/// Plain sqlx query modules, one per table family. All cross-request state
/// lives here; nothing is cached in memory between calls.
pub mod outbox;
pub mod password_reset;
pub mod phone_login_codes;
pub mod refresh_tokens;
pub mod roles;
pub mod tenants;
pub mod users;

/// Postgres unique-violation detection, used to map constraint hits onto the
/// `Conflict` error class.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}
