//! Error types for the benchmark applications.
//!
//! Startup errors (`Configuration`, `Provision`) abort the process before the
//! listener is bound. Every other variant is request-scoped and is rendered
//! as a JSON response through [`IntoResponse`].

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Provisioning failed: {message}")]
    Provision { message: String },

    #[error("Teardown failed: {message}")]
    Teardown { message: String },

    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        /// Field name -> messages
        fields: BTreeMap<String, Vec<String>>,
    },

    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        constraint: Option<String>,
        table: Option<String>,
    },

    #[error("Not implemented: {operation}")]
    NotImplemented { operation: &'static str },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: scope '{scope}' required")]
    Forbidden { scope: &'static str },

    #[error("Anti-forgery validation failed: {reason}")]
    Antiforgery { reason: &'static str },

    #[error("Service unavailable: {message}")]
    Unavailable { message: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "23505" for unique violation
        sql_state: Option<String>,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a provisioning error.
    pub fn provision(message: impl Into<String>) -> Self {
        Self::Provision {
            message: message.into(),
        }
    }

    /// Create a teardown error.
    pub fn teardown(message: impl Into<String>) -> Self {
        Self::Teardown {
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Create a validation error from collected field errors.
    pub fn validation(fields: BTreeMap<String, Vec<String>>) -> Self {
        let message = fields
            .iter()
            .map(|(field, errors)| format!("{}: {}", field, errors.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");
        Self::Validation { message, fields }
    }

    pub fn conflict(message: impl Into<String>, constraint: Option<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            constraint,
            table: None,
        }
    }

    pub fn not_implemented(operation: &'static str) -> Self {
        Self::NotImplemented { operation }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(scope: &'static str) -> Self {
        Self::Forbidden { scope }
    }

    pub fn antiforgery(reason: &'static str) -> Self {
        Self::Antiforgery { reason }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error must stop the process during startup.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Provision { .. })
    }

    /// HTTP status used when this error reaches a response.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation { .. } | Self::Antiforgery { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Configuration { .. }
            | Self::Provision { .. }
            | Self::Teardown { .. }
            | Self::Database { .. }
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Provision { .. } => "provision_error",
            Self::Teardown { .. } => "teardown_error",
            Self::NotFound { .. } => "not_found",
            Self::Validation { .. } => "validation_error",
            Self::Conflict { .. } => "conflict",
            Self::NotImplemented { .. } => "not_implemented",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Forbidden { .. } => "forbidden",
            Self::Antiforgery { .. } => "antiforgery",
            Self::Unavailable { .. } => "unavailable",
            Self::Database { .. } | Self::Internal { .. } => "internal_error",
        }
    }
}

/// Convert sqlx errors to AppError.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
                    AppError::Conflict {
                        message: db_err.message().to_string(),
                        constraint: db_err.constraint().map(String::from),
                        table: db_err.table().map(String::from),
                    }
                } else {
                    AppError::database(db_err.message(), code)
                }
            }
            sqlx::Error::RowNotFound => AppError::database("No rows returned", None),
            sqlx::Error::PoolTimedOut => AppError::unavailable("Timed out acquiring a connection"),
            sqlx::Error::PoolClosed => AppError::unavailable("Connection pool is closed"),
            sqlx::Error::Configuration(msg) => AppError::configuration(msg.to_string()),
            sqlx::Error::Io(io_err) => AppError::database(format!("I/O error: {}", io_err), None),
            _ => AppError::database(err.to_string(), None),
        }
    }
}

/// Result type alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Validation { message, fields } => json!({
                "error": self.code(),
                "message": message,
                "fields": fields,
            }),
            Self::Conflict {
                message,
                constraint,
                ..
            } => json!({
                "error": self.code(),
                "message": message,
                "constraint": constraint,
            }),
            // Server-side details stay in the log
            Self::Database { message, sql_state } => {
                tracing::error!(sql_state = ?sql_state, "Database error: {}", message);
                json!({
                    "error": self.code(),
                    "message": "an internal error occurred",
                })
            }
            Self::Internal { message }
            | Self::Configuration { message }
            | Self::Provision { message }
            | Self::Teardown { message } => {
                tracing::error!("Internal error: {}", message);
                json!({
                    "error": self.code(),
                    "message": "an internal error occurred",
                })
            }
            _ => json!({
                "error": self.code(),
                "message": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::configuration("Application does not support database type MySql");
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("MySql"));
    }

    #[test]
    fn test_startup_fatality() {
        assert!(AppError::configuration("x").is_fatal_at_startup());
        assert!(AppError::provision("x").is_fatal_at_startup());
        assert!(!AppError::teardown("x").is_fatal_at_startup());
        assert!(!AppError::not_found("pet", 1).is_fatal_at_startup());
    }

    #[test]
    fn test_validation_message_lists_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), vec!["is required".to_string()]);
        let err = AppError::validation(fields);
        assert!(err.to_string().contains("name: is required"));
    }

    #[test]
    fn test_not_implemented_is_distinct_from_server_error() {
        let err = AppError::not_implemented("DeletePet");
        assert_eq!(err.status_code(), StatusCode::NOT_IMPLEMENTED);
        assert_ne!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_not_found_is_404() {
        let response = AppError::not_found("pet", 42).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_conflict_is_409() {
        let response = AppError::conflict("duplicate key", Some("pets_pkey".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_database_error_hides_details() {
        let response =
            AppError::database("relation \"pets\" does not exist", Some("42P01".into()))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!body.contains("pets"));
    }

    #[test]
    fn test_pool_closed_maps_to_unavailable() {
        let err: AppError = sqlx::Error::PoolClosed.into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
