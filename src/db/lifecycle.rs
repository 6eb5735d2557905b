//! Schema lifecycle: create at startup, drop at shutdown.
//!
//! The strategy is fixed when the [`SchemaLifecycle`] is built from the
//! selected provider:
//!
//! | mode     | provision                | teardown                        |
//! |----------|--------------------------|---------------------------------|
//! | disabled | no-op                    | no-op                           |
//! | embedded | create tables + seed     | close pool, delete the file     |
//! | external | create tables + seed     | drop the application's tables   |
//!
//! State moves `Uninitialized -> Provisioned -> TornDown` and never back.
//! Teardown runs its strategy at most once; later calls only log.

use crate::db::pool::DbPool;
use crate::db::schema::Schema;
use crate::error::{AppError, AppResult};
use crate::models::DatabaseMode;
use sqlx::{PgPool, SqlitePool};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Provisioned,
    TornDown,
}

/// What a call to [`SchemaLifecycle::teardown`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// The strategy ran and succeeded
    Completed,
    /// The strategy ran and failed; the error was logged
    Failed,
    /// Nothing to do: never provisioned, or already torn down
    Skipped,
}

/// Provider-specific provisioning and teardown.
pub trait LifecycleStrategy: Send + Sync {
    fn provision(&self) -> impl Future<Output = AppResult<()>> + Send;

    fn teardown(&self) -> impl Future<Output = AppResult<()>> + Send;

    /// Get the name of this strategy for logging.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Default)]
pub struct DisabledStrategy;

impl LifecycleStrategy for DisabledStrategy {
    async fn provision(&self) -> AppResult<()> {
        Ok(())
    }

    async fn teardown(&self) -> AppResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Owns the whole SQLite file.
#[derive(Debug)]
pub struct EmbeddedStrategy {
    pool: SqlitePool,
    path: PathBuf,
    schema: &'static Schema,
}

impl EmbeddedStrategy {
    pub fn new(pool: SqlitePool, path: impl Into<PathBuf>, schema: &'static Schema) -> Self {
        Self {
            pool,
            path: path.into(),
            schema,
        }
    }
}

impl LifecycleStrategy for EmbeddedStrategy {
    async fn provision(&self) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        for stmt in self.schema.create_statements(DatabaseMode::Embedded) {
            sqlx::query(stmt).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn teardown(&self) -> AppResult<()> {
        // The file cannot be removed while connections hold it open.
        self.pool.close().await;
        for path in sqlite_files(&self.path) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Removed database file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AppError::teardown(format!(
                        "Failed to remove {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "embedded"
    }
}

/// Owns only the application's tables on a shared server.
#[derive(Debug)]
pub struct ExternalStrategy {
    pool: PgPool,
    schema: &'static Schema,
}

impl ExternalStrategy {
    pub fn new(pool: PgPool, schema: &'static Schema) -> Self {
        Self { pool, schema }
    }
}

impl LifecycleStrategy for ExternalStrategy {
    async fn provision(&self) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        for stmt in self.schema.create_statements(DatabaseMode::External) {
            sqlx::query(stmt).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn teardown(&self) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        for stmt in self.schema.drop_statements() {
            sqlx::query(&stmt).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "external"
    }
}

/// The database file plus the WAL-mode companions SQLite may leave next to it.
fn sqlite_files(path: &Path) -> Vec<PathBuf> {
    let mut files = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        files.push(PathBuf::from(name));
    }
    files
}

#[derive(Debug)]
enum Strategy {
    Disabled(DisabledStrategy),
    Embedded(EmbeddedStrategy),
    External(ExternalStrategy),
}

impl Strategy {
    async fn provision(&self) -> AppResult<()> {
        match self {
            Strategy::Disabled(s) => s.provision().await,
            Strategy::Embedded(s) => s.provision().await,
            Strategy::External(s) => s.provision().await,
        }
    }

    async fn teardown(&self) -> AppResult<()> {
        match self {
            Strategy::Disabled(s) => s.teardown().await,
            Strategy::Embedded(s) => s.teardown().await,
            Strategy::External(s) => s.teardown().await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Strategy::Disabled(s) => s.name(),
            Strategy::Embedded(s) => s.name(),
            Strategy::External(s) => s.name(),
        }
    }
}

/// The process-wide schema lifecycle handle.
#[derive(Debug)]
pub struct SchemaLifecycle {
    mode: DatabaseMode,
    schema: &'static Schema,
    strategy: Strategy,
    state: Mutex<LifecycleState>,
}

impl SchemaLifecycle {
    /// Bind the strategy for the selected `mode` to its pool.
    ///
    /// Disabled mode takes no pool; the other modes require the matching one.
    pub fn new(
        mode: DatabaseMode,
        pool: Option<&DbPool>,
        sqlite_path: impl Into<PathBuf>,
        schema: &'static Schema,
    ) -> AppResult<Self> {
        let strategy = match (mode, pool) {
            (DatabaseMode::Disabled, None) => Strategy::Disabled(DisabledStrategy),
            (DatabaseMode::Embedded, Some(DbPool::Sqlite(pool))) => {
                Strategy::Embedded(EmbeddedStrategy::new(pool.clone(), sqlite_path, schema))
            }
            (DatabaseMode::External, Some(DbPool::Postgres(pool))) => {
                Strategy::External(ExternalStrategy::new(pool.clone(), schema))
            }
            (mode, pool) => {
                return Err(AppError::configuration(format!(
                    "{} mode cannot use a {} pool",
                    mode,
                    pool.map_or("missing", |p| p.mode().display_name())
                )));
            }
        };
        Ok(Self {
            mode,
            schema,
            strategy,
            state: Mutex::new(LifecycleState::Uninitialized),
        })
    }

    pub fn mode(&self) -> DatabaseMode {
        self.mode
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.lock().await
    }

    /// Create the schema. Safe to repeat while provisioned.
    ///
    /// Any failure is a [`AppError::Provision`]; the caller must not start serving.
    pub async fn provision(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if *state == LifecycleState::TornDown {
            return Err(AppError::provision("Schema lifecycle has already been torn down"));
        }

        let start = Instant::now();
        self.strategy.provision().await.map_err(|e| match e {
            AppError::Provision { .. } => e,
            other => AppError::provision(format!(
                "Failed to create schema '{}': {}",
                self.schema.name, other
            )),
        })?;
        *state = LifecycleState::Provisioned;

        info!(
            mode = %self.mode,
            strategy = self.strategy.name(),
            schema = self.schema.name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Schema provisioned"
        );
        Ok(())
    }

    /// Remove what provisioning created. Errors are logged, never returned.
    pub async fn teardown(&self) -> TeardownOutcome {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, LifecycleState::TornDown);
        if previous != LifecycleState::Provisioned {
            debug!(state = ?previous, "Schema teardown skipped");
            return TeardownOutcome::Skipped;
        }

        match self.strategy.teardown().await {
            Ok(()) => {
                info!(
                    mode = %self.mode,
                    strategy = self.strategy.name(),
                    schema = self.schema.name,
                    "Schema torn down"
                );
                TeardownOutcome::Completed
            }
            Err(e) => {
                error!(
                    mode = %self.mode,
                    schema = self.schema.name,
                    error = %e,
                    "Schema teardown failed"
                );
                TeardownOutcome::Failed
            }
        }
    }
}
