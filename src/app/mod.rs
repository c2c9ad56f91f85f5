pub mod auth;
pub mod blog;
pub mod feedback;
pub mod interactions;
pub mod query;
pub mod rate_limiter;
pub mod support;

/// Outcome of a write guarded by an ownership or role check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    Allowed(T),
    NotFound,
    Forbidden,
}
