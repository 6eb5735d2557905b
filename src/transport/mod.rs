//! Transport layer.
//!
//! The benchmark applications are served over HTTP only; the trait keeps the
//! serving loop separate from application construction.

pub mod http;

pub use http::HttpTransport;

use crate::error::AppResult;
use std::future::Future;

/// A way of serving a bootstrapped application.
pub trait Transport: Send + Sync {
    /// Serve until shutdown, then release the application's resources.
    ///
    /// This method should block until the transport is shut down.
    fn run(&self) -> impl Future<Output = AppResult<()>> + Send;

    /// Get the name of this transport for logging.
    fn name(&self) -> &'static str;
}
