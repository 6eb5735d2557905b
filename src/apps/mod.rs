//! HTTP applications.
//!
//! - `pet_store`: JSON API over the pets schema
//! - `views`: server-rendered person form with anti-forgery protection
//!
//! Both share [`AppState`]; only the router differs.

pub mod antiforgery;
pub mod pet_store;
pub mod views;

use crate::auth::AuthConfig;
use crate::config::AppKind;
use crate::db::DbPool;
use crate::diagnostics::DiagnosticThrottle;
use crate::error::{AppError, AppResult};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    /// `None` when the database is disabled
    pub pool: Option<DbPool>,
    pub throttle: Arc<DiagnosticThrottle>,
}

impl AppState {
    pub fn new(pool: Option<DbPool>) -> Self {
        Self {
            pool,
            throttle: Arc::new(DiagnosticThrottle::new()),
        }
    }

    pub fn with_throttle(mut self, throttle: Arc<DiagnosticThrottle>) -> Self {
        self.throttle = throttle;
        self
    }

    /// The pool, or `Unavailable` when no database is configured.
    pub fn pool(&self) -> AppResult<&DbPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| AppError::unavailable("No database is configured"))
    }
}

/// Options for building an application router.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub auth: AuthConfig,
    /// Directory served for paths no route matches (views only)
    pub web_root: PathBuf,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            auth: AuthConfig::disabled(),
            web_root: PathBuf::from("wwwroot"),
        }
    }
}

/// Build the router for `app` with request tracing.
pub fn build_router(app: AppKind, state: AppState, options: RouterOptions) -> Router {
    let routes = match app {
        AppKind::PetStore => pet_store::router(Arc::new(options.auth)),
        AppKind::Views => views::router(options.web_root),
    };

    routes
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
        .with_state(Arc::new(state))
}
