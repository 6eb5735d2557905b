//! Pet store endpoints.
//!
//! Every route requires the reader scope; routes that modify the store
//! additionally take [`WriterAccess`]. Update, upload and delete are not
//! implemented and answer 501 regardless of input.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, RawQuery, State, rejection::JsonRejection},
    http::{StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{error, warn};

use super::AppState;
use crate::auth::{AuthConfig, WriterAccess, require_reader};
use crate::db::PetRepository;
use crate::error::{AppError, AppResult};
use crate::models::{Pet, PetInput};

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

/// Non-integer segments do not name a pet, so they miss like unknown ids.
fn parse_id(raw: &str, lookup: &'static str) -> AppResult<i32> {
    raw.parse().map_err(|_| AppError::not_found(lookup, raw))
}

fn found(pet: Option<Pet>, lookup: &'static str, key: impl ToString) -> AppResult<Json<Pet>> {
    pet.map(Json).ok_or_else(|| AppError::not_found(lookup, key))
}

/// GET /pet/{id}
async fn find_by_id(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> AppResult<Json<Pet>> {
    let id = parse_id(&raw, "pet")?;
    let pet = PetRepository::new(state.pool()?).find_by_id(id).await?;
    found(pet, "pet", id)
}

/// GET /pet/findByCategory/{category_id}
async fn find_by_category(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> AppResult<Json<Pet>> {
    let category_id = parse_id(&raw, "pet with category")?;
    let pet = PetRepository::new(state.pool()?)
        .find_by_category(category_id)
        .await?;
    found(pet, "pet with category", category_id)
}

/// GET /pet/findByStatus?status=
async fn find_by_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> AppResult<Json<Pet>> {
    let status = query.status.filter(|s| !s.is_empty());
    let pet = PetRepository::new(state.pool()?)
        .find_by_status(status.as_deref())
        .await?;
    found(pet, "pet with status", status.unwrap_or_default())
}

/// Collect `tags` query values; repeated keys and comma-separated lists both count.
pub fn parse_tags(query: Option<&str>) -> Vec<String> {
    let Some(query) = query else {
        return Vec::new();
    };
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == "tags")
        .flat_map(|(_, value)| {
            value
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// GET /pet/findByTags?tags=
async fn find_by_tags(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> AppResult<Json<Pet>> {
    let tags = parse_tags(query.as_deref());
    let pet = PetRepository::new(state.pool()?).find_by_tags(&tags).await?;
    found(pet, "pet with tags", tags.join(","))
}

/// POST /pet
async fn add_pet(
    _writer: WriterAccess,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PetInput>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let pool = state.pool()?;
    let Json(input) = payload.map_err(|rejection| {
        let mut fields = BTreeMap::new();
        fields.insert("body".to_string(), vec![rejection.body_text()]);
        AppError::validation(fields)
    })?;
    let pet = input.validate()?;

    let repo = PetRepository::new(pool);
    let created = match repo.create(&pet).await {
        Ok(created) => created,
        Err(err @ AppError::Conflict { .. }) => {
            if state.throttle.should_emit() {
                log_conflict(&repo, &err).await;
            }
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    let location = format!("/pet/{}", created.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(created),
    ))
}

async fn log_conflict(repo: &PetRepository<'_>, err: &AppError) {
    let AppError::Conflict {
        message,
        constraint,
        table,
    } = err
    else {
        return;
    };

    let (min_tag_id, max_tag_id) = match repo.tag_id_range().await {
        Ok(range) => range,
        Err(e) => {
            warn!(error = %e, "Could not read tag id range");
            (None, None)
        }
    };

    error!(
        constraint = ?constraint,
        table = ?table,
        min_tag_id = ?min_tag_id,
        max_tag_id = ?max_tag_id,
        "Write conflict while adding pet: {}",
        message
    );
}

/// PUT /pet
async fn edit_pet(_writer: WriterAccess) -> AppResult<StatusCode> {
    Err(AppError::not_implemented("EditPet"))
}

/// POST /pet/{id}/uploadImage
async fn upload_image(_writer: WriterAccess) -> AppResult<StatusCode> {
    Err(AppError::not_implemented("UploadImage"))
}

/// DELETE /pet/{id}
async fn delete_pet(_writer: WriterAccess) -> AppResult<StatusCode> {
    Err(AppError::not_implemented("DeletePet"))
}

/// Pet store routes
pub fn router(auth: Arc<AuthConfig>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/pet", post(add_pet).put(edit_pet))
        .route("/pet/findByCategory/{category_id}", get(find_by_category))
        .route("/pet/findByStatus", get(find_by_status))
        .route("/pet/findByTags", get(find_by_tags))
        .route("/pet/{id}", get(find_by_id).delete(delete_pet))
        .route("/pet/{id}/uploadImage", post(upload_image))
        .route_layer(middleware::from_fn_with_state(auth, require_reader))
}
