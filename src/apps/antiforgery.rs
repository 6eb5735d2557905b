//! Double-submit anti-forgery tokens for the views form.
//!
//! The token travels twice: in the `__antiforgery` cookie and in the
//! `__RequestVerificationToken` form field. A post is accepted only when
//! both are present and equal.

use crate::error::{AppError, AppResult};
use axum::http::{HeaderMap, HeaderValue, header};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use subtle::ConstantTimeEq;

pub const COOKIE_NAME: &str = "__antiforgery";
pub const FORM_FIELD: &str = "__RequestVerificationToken";
const TOKEN_BYTES: usize = 32;

/// Generate a fresh random token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn is_well_formed(token: &str) -> bool {
    URL_SAFE_NO_PAD
        .decode(token)
        .is_ok_and(|bytes| bytes.len() == TOKEN_BYTES)
}

/// The well-formed token from the request cookie, if any.
pub fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, value)| value.to_string())
        .filter(|token| is_well_formed(token))
}

pub fn set_cookie_header(token: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict",
        COOKIE_NAME, token
    ))
    .map_err(|e| AppError::internal(format!("Invalid anti-forgery cookie: {}", e)))
}

/// Check the posted form token against the cookie.
pub fn verify(headers: &HeaderMap, form_token: Option<&str>) -> AppResult<()> {
    let Some(cookie) = cookie_token(headers) else {
        return Err(AppError::antiforgery("anti-forgery cookie is missing"));
    };
    let form_token = match form_token.map(str::trim) {
        Some(token) if !token.is_empty() => token,
        _ => return Err(AppError::antiforgery("request verification token is missing")),
    };

    let matches = cookie.len() == form_token.len()
        && bool::from(cookie.as_bytes().ct_eq(form_token.as_bytes()));
    if matches {
        Ok(())
    } else {
        Err(AppError::antiforgery("request verification token does not match"))
    }
}
