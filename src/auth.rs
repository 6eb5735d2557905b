//! Bearer token access control for the pet store.
//!
//! Tokens are configured per scope. A writer token also grants the reader
//! scope. When no tokens are configured at all, access control is disabled
//! and every request carries both scopes.

use crate::error::AppError;
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Reader,
    Writer,
}

impl Scope {
    pub fn name(&self) -> &'static str {
        match self {
            Scope::Reader => "pet-store-reader",
            Scope::Writer => "pet-store-writer",
        }
    }
}

/// Scopes granted to the current request, inserted as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    writer: bool,
}

impl Principal {
    pub fn reader() -> Self {
        Self { writer: false }
    }

    pub fn writer() -> Self {
        Self { writer: true }
    }

    pub fn has(&self, scope: Scope) -> bool {
        match scope {
            Scope::Reader => true,
            Scope::Writer => self.writer,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    readers: Vec<String>,
    writers: Vec<String>,
}

impl AuthConfig {
    pub fn from_tokens(readers: Vec<String>, writers: Vec<String>) -> Result<Self, String> {
        Ok(Self {
            readers: clean_tokens(readers)?,
            writers: clean_tokens(writers)?,
        })
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        !self.readers.is_empty() || !self.writers.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.readers.len() + self.writers.len()
    }

    /// Resolve a presented token to its scopes.
    ///
    /// Every configured token is compared so the time taken does not depend
    /// on which one matched.
    fn authorize(&self, provided: &str) -> Option<Principal> {
        let writer = contains_token(&self.writers, provided);
        let reader = contains_token(&self.readers, provided);
        match (writer, reader) {
            (true, _) => Some(Principal::writer()),
            (false, true) => Some(Principal::reader()),
            (false, false) => None,
        }
    }
}

fn clean_tokens(tokens: Vec<String>) -> Result<Vec<String>, String> {
    let mut cleaned = Vec::with_capacity(tokens.len());
    for token in tokens {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err("Empty token value in configuration".to_string());
        }
        if !cleaned.iter().any(|t: &String| t == trimmed) {
            cleaned.push(trimmed.to_string());
        }
    }
    Ok(cleaned)
}

/// Middleware admitting requests that carry at least the reader scope.
pub async fn require_reader(
    State(auth): State<Arc<AuthConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !auth.is_enabled() {
        request.extensions_mut().insert(Principal::writer());
        return next.run(request).await;
    }

    let token = match extract_bearer_token(&request) {
        Ok(Some(token)) => token,
        Ok(None) => {
            warn!(path = %request.uri().path(), "Authentication failed: missing Authorization header");
            return AppError::unauthorized("Missing Bearer token in Authorization header")
                .into_response();
        }
        Err(msg) => {
            warn!("Authentication failed: invalid header format");
            return AppError::unauthorized(msg).into_response();
        }
    };

    match auth.authorize(token) {
        Some(principal) => {
            debug!(writer = principal.has(Scope::Writer), "Request authorized");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        None => {
            warn!(token_prefix = %mask_token(token), "Authentication failed: invalid token");
            AppError::unauthorized("Invalid Bearer token").into_response()
        }
    }
}

/// Extractor guarding handlers that modify the store.
#[derive(Debug)]
pub struct WriterAccess;

impl<S> FromRequestParts<S> for WriterAccess
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Principal>() {
            Some(principal) if principal.has(Scope::Writer) => Ok(WriterAccess),
            Some(_) => Err(AppError::forbidden(Scope::Writer.name())),
            None => Err(AppError::unauthorized("Request was not authenticated")),
        }
    }
}

fn extract_bearer_token(request: &Request<Body>) -> Result<Option<&str>, &'static str> {
    let Some(auth_header) = request.headers().get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Authorization header contains invalid characters")?;

    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err("Invalid Authorization header format. Expected 'Bearer <token>'");
    };
    if token.is_empty() {
        return Err("Bearer token is empty");
    }

    Ok(Some(token))
}

fn contains_token(tokens: &[String], provided: &str) -> bool {
    let mut found = false;
    for expected in tokens {
        found |= constant_time_eq(provided.as_bytes(), expected.as_bytes());
    }
    found
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

fn mask_token(token: &str) -> String {
    match token.char_indices().nth(3) {
        Some((idx, _)) => format!("{}***", &token[..idx]),
        None => "***".to_string(),
    }
}
