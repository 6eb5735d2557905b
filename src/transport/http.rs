//! HTTP transport for the benchmark applications.
//!
//! Shutdown sequence: a signal stops the listener and in-flight requests
//! drain. If they do not finish within the grace period, or a second signal
//! arrives, the server future is dropped. Only then is the schema torn down
//! and the pool closed.

use crate::db::{DbPool, SchemaLifecycle, TeardownOutcome};
use crate::error::{AppError, AppResult};
use crate::startup::Application;
use crate::transport::Transport;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

pub const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport serving one bootstrapped application.
pub struct HttpTransport {
    router: Router,
    lifecycle: Arc<SchemaLifecycle>,
    pool: Option<DbPool>,
    /// Host to bind to
    host: String,
    /// Port to bind to
    port: u16,
    graceful_timeout: Duration,
}

impl HttpTransport {
    pub fn new(application: Application, host: impl Into<String>, port: u16) -> Self {
        Self {
            router: application.router,
            lifecycle: application.lifecycle,
            pool: application.pool,
            host: host.into(),
            port,
            graceful_timeout: DEFAULT_GRACEFUL_TIMEOUT,
        }
    }

    pub fn with_graceful_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_timeout = timeout;
        self
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Serve on `listener` until `shutdown` resolves, then release resources.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();

        let shutdown_signal = async move {
            shutdown.await;
            shutdown_notify_clone.notify_one();
        };

        let server =
            axum::serve(listener, self.router.clone()).with_graceful_shutdown(shutdown_signal);

        let graceful_timeout = self.graceful_timeout;
        let served = tokio::select! {
            result = server => {
                match result {
                    Ok(()) => {
                        info!("HTTP server stopped");
                        Ok(())
                    }
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        Err(AppError::internal(format!("HTTP server error: {}", e)))
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = graceful_timeout.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(graceful_timeout) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => Ok(())
        };

        self.release().await;
        served
    }

    /// Tear down the schema, then close the pool.
    async fn release(&self) {
        match self.lifecycle.teardown().await {
            TeardownOutcome::Failed => warn!("Schema teardown failed; continuing shutdown"),
            TeardownOutcome::Completed | TeardownOutcome::Skipped => {}
        }

        if let Some(pool) = &self.pool {
            info!("Closing database connections");
            pool.close().await;
        }
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> AppResult<()> {
        let bind_addr = self.bind_addr();

        let listener = match TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.release().await;
                return Err(AppError::configuration(format!(
                    "Failed to bind to {}: {}",
                    bind_addr, e
                )));
            }
        };

        info!(mode = %self.lifecycle.mode(), "Now listening on: http://{}", bind_addr);
        self.serve(listener, wait_for_signal()).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::{self, AppState, RouterOptions};
    use crate::config::AppKind;
    use crate::db::LifecycleState;
    use crate::db::schema::VIEWS;
    use crate::models::DatabaseMode;

    fn disabled_application() -> Application {
        Application {
            app: AppKind::Views,
            mode: DatabaseMode::Disabled,
            router: apps::build_router(
                AppKind::Views,
                AppState::new(None),
                RouterOptions::default(),
            ),
            lifecycle: Arc::new(
                SchemaLifecycle::new(DatabaseMode::Disabled, None, "unused.db", &VIEWS).unwrap(),
            ),
            pool: None,
        }
    }

    #[test]
    fn test_http_transport_bind_addr() {
        let transport = HttpTransport::new(disabled_application(), "0.0.0.0", 5000);
        assert_eq!(transport.name(), "http");
        assert_eq!(transport.bind_addr(), "0.0.0.0:5000");
    }

    #[tokio::test]
    async fn test_serve_tears_down_after_shutdown() {
        let application = disabled_application();
        let lifecycle = application.lifecycle.clone();
        lifecycle.provision().await.unwrap();

        let transport = HttpTransport::new(application, "127.0.0.1", 0)
            .with_graceful_timeout(Duration::from_secs(1));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        transport.serve(listener, async {}).await.unwrap();
        assert_eq!(lifecycle.state().await, LifecycleState::TornDown);
    }
}
