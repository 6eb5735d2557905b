//! Database dispatch macro.
//!
//! SQLite and PostgreSQL pools are different types, but the queries used here
//! are written once in SQL both engines accept (`$N` placeholders,
//! `RETURNING`, `ON CONFLICT`). The macro expands the same body once per
//! `DbPool` variant so each copy is type-checked against its own driver.

/// Run `$body` with `$p` bound to the concrete pool inside a `DbPool`.
///
/// # Example
///
/// ```ignore
/// let count: i64 = with_pool!(&pool, |p| {
///     sqlx::query_scalar("SELECT COUNT(*) FROM pets").fetch_one(p).await?
/// });
/// ```
#[macro_export]
macro_rules! with_pool {
    ($pool:expr, |$p:ident| $body:expr) => {
        match $pool {
            $crate::db::pool::DbPool::Postgres($p) => $body,
            $crate::db::pool::DbPool::Sqlite($p) => $body,
        }
    };
}

pub use with_pool;
