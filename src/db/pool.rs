//! Connection pool construction.
//!
//! Pools are built once, after the provider has been selected. The embedded
//! provider gets a file-backed `SqlitePool`; the external provider gets a
//! `PgPool` whose connections reset their session when released.

use crate::config::PoolOptions;
use crate::error::{AppError, AppResult};
use crate::models::{ConnectionConfig, DatabaseMode};
use sqlx::{
    PgPool, SqlitePool,
    postgres::PgPoolOptions,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::Path;
use tracing::{debug, info, warn};

/// Session state cleared when a PostgreSQL connection goes back to the pool.
///
/// `DISCARD ALL` is avoided: it drops server-side prepared statements that
/// the driver keeps cached per connection.
pub const RESET_SESSION_SQL: &str =
    "RESET ALL; UNLISTEN *; SELECT pg_advisory_unlock_all(); CLOSE ALL;";

/// Database-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl DbPool {
    /// Open (creating if needed) the SQLite file at `path`.
    pub async fn connect_embedded(path: &Path, pool_opts: &PoolOptions) -> AppResult<Self> {
        pool_opts.validate().map_err(AppError::configuration)?;

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        info!(path = %path.display(), "Opening embedded database");

        let pool = SqlitePoolOptions::new()
            .min_connections(pool_opts.min_connections_or_default())
            .max_connections(pool_opts.max_connections_or_default(true))
            .acquire_timeout(pool_opts.acquire_timeout_or_default())
            .idle_timeout(Some(pool_opts.idle_timeout_or_default()))
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::provision(format!(
                    "Failed to open SQLite database {}: {}",
                    path.display(),
                    e
                ))
            })?;

        Ok(DbPool::Sqlite(pool))
    }

    /// Connect to the PostgreSQL server described by a validated configuration.
    pub async fn connect_external(
        config: &ConnectionConfig,
        pool_opts: &PoolOptions,
    ) -> AppResult<Self> {
        pool_opts.validate().map_err(AppError::configuration)?;

        for key in &config.ignored_keys {
            warn!(key = %key, "Ignoring unsupported connection string key");
        }
        info!(
            connection = %config.masked_connection_string(),
            "Connecting to external database"
        );

        let mut options = PgPoolOptions::new()
            .min_connections(pool_opts.min_connections_or_default())
            .max_connections(pool_opts.max_connections_or_default(false))
            .acquire_timeout(pool_opts.acquire_timeout_or_default())
            .idle_timeout(Some(pool_opts.idle_timeout_or_default()));

        if config.reset_on_return {
            options = options.after_release(|conn, _meta| {
                Box::pin(async move {
                    sqlx::Executor::execute(&mut *conn, RESET_SESSION_SQL).await?;
                    Ok(true)
                })
            });
        }

        let pool = options
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| AppError::provision(format!("Failed to connect to PostgreSql: {}", e)))?;

        Ok(DbPool::Postgres(pool))
    }

    /// Close the connection pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        match self {
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::Sqlite(pool) => pool.close().await,
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            DbPool::Postgres(pool) => pool.is_closed(),
            DbPool::Sqlite(pool) => pool.is_closed(),
        }
    }

    /// Provider mode this pool belongs to.
    pub fn mode(&self) -> DatabaseMode {
        match self {
            DbPool::Postgres(_) => DatabaseMode::External,
            DbPool::Sqlite(_) => DatabaseMode::Embedded,
        }
    }

    /// Get the server version from the connected database.
    pub async fn server_version(&self) -> Option<String> {
        let result = match self {
            DbPool::Postgres(pool) => {
                sqlx::query_scalar::<_, String>("SELECT version()")
                    .fetch_one(pool)
                    .await
            }
            DbPool::Sqlite(pool) => {
                sqlx::query_scalar::<_, String>("SELECT sqlite_version()")
                    .fetch_one(pool)
                    .await
            }
        };

        match result {
            Ok(version) => {
                debug!(version = %version, "Got server version");
                Some(version)
            }
            Err(e) => {
                warn!(error = %e, "Failed to get server version");
                None
            }
        }
    }
}
