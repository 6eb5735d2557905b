//! Application bootstrap.
//!
//! Order matters: the provider is selected and the connection string checked
//! before any pool exists, and the schema is provisioned before a router is
//! built. A failure at any step returns before anything can serve requests.

use crate::apps::{self, AppState, RouterOptions};
use crate::auth::AuthConfig;
use crate::config::{AppKind, Config};
use crate::db::{DbPool, Schema, SchemaLifecycle};
use crate::error::{AppError, AppResult};
use crate::models::{ConnectionConfig, DatabaseMode};
use axum::Router;
use std::sync::Arc;
use tracing::{info, warn};

/// A provisioned application ready to be served.
pub struct Application {
    pub app: AppKind,
    pub mode: DatabaseMode,
    pub router: Router,
    pub lifecycle: Arc<SchemaLifecycle>,
    pub pool: Option<DbPool>,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("app", &self.app)
            .field("mode", &self.mode)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

/// Open the pool for the selected mode. Disabled mode has none.
pub async fn connect(mode: DatabaseMode, config: &Config) -> AppResult<Option<DbPool>> {
    let pool_opts = config.pool_options();
    match mode {
        DatabaseMode::Disabled => Ok(None),
        DatabaseMode::Embedded => {
            DbPool::connect_embedded(&config.sqlite_path(), &pool_opts)
                .await
                .map(Some)
        }
        DatabaseMode::External => {
            let connection =
                ConnectionConfig::validate(config.connection_string.as_deref().unwrap_or_default())?;
            DbPool::connect_external(&connection, &pool_opts)
                .await
                .map(Some)
        }
    }
}

/// Select the provider, open the pool, provision the schema and build the router.
pub async fn bootstrap(config: &Config) -> AppResult<Application> {
    let mode = DatabaseMode::select(config.database.as_deref())?;
    info!(app = %config.app, mode = %mode, "Database provider selected");

    let auth = AuthConfig::from_tokens(config.reader_tokens.clone(), config.writer_tokens.clone())
        .map_err(AppError::configuration)?;
    if config.app == AppKind::PetStore && auth.is_enabled() {
        info!(tokens = auth.token_count(), "Access control enabled");
    }

    let pool = connect(mode, config).await?;

    let schema = Schema::for_app(config.app);
    let lifecycle = match SchemaLifecycle::new(mode, pool.as_ref(), config.sqlite_path(), schema) {
        Ok(lifecycle) => Arc::new(lifecycle),
        Err(e) => {
            if let Some(pool) = &pool {
                pool.close().await;
            }
            return Err(e);
        }
    };
    if let Err(e) = lifecycle.provision().await {
        if let Some(pool) = &pool {
            pool.close().await;
        }
        return Err(e);
    }

    if let Some(pool) = &pool {
        if let Some(version) = pool.server_version().await {
            info!(version = %version, "Connected to database");
        }
    } else if config.app == AppKind::PetStore {
        warn!("No database configured; pet endpoints will answer 503");
    }

    let router = apps::build_router(
        config.app,
        AppState::new(pool.clone()),
        RouterOptions {
            auth,
            web_root: config.web_root(),
        },
    );

    Ok(Application {
        app: config.app,
        mode,
        router,
        lifecycle,
        pool,
    })
}
