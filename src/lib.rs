//! Benchmark sample applications.
//!
//! Two HTTP applications share one startup path: a JSON pet store and a
//! server-rendered person form. Startup selects a database provider
//! (none, an embedded SQLite file, or PostgreSQL), provisions the
//! application's schema, serves until a shutdown signal and then tears the
//! schema down again.

pub mod apps;
pub mod auth;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod models;
pub mod startup;
pub mod transport;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use startup::{Application, bootstrap};
