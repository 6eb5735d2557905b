//! Pet store data models.
//!
//! Request bodies deserialize into [`PetInput`], where every field is
//! optional so that missing values become field errors instead of a
//! deserializer rejection. [`PetInput::validate`] produces a [`Pet`].

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_NAME_LEN: usize = 100;
pub const PET_STATUSES: &[&str] = &["available", "pending", "sold"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: i32,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i32,
    pub name: String,
}

/// A pet with its category, images and tags loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    pub id: i32,
    pub category: Option<Category>,
    pub images: Vec<Image>,
    pub name: String,
    pub status: Option<String>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub id: Option<i32>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInput {
    pub id: Option<i32>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagInput {
    pub id: Option<i32>,
    pub name: Option<String>,
}

/// Pet as posted by a client. An absent or zero `id` lets the database assign one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetInput {
    pub id: Option<i32>,
    pub category: Option<CategoryInput>,
    #[serde(default)]
    pub images: Vec<ImageInput>,
    pub name: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagInput>,
}

#[derive(Debug, Default)]
struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    fn into_result<T>(self, value: T) -> AppResult<T> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(AppError::validation(self.0))
        }
    }
}

fn check_id(errors: &mut FieldErrors, field: &str, id: Option<i32>) -> i32 {
    let id = id.unwrap_or(0);
    if id < 0 {
        errors.add(field, "must not be negative");
    }
    id
}

fn required_text(errors: &mut FieldErrors, field: &str, value: Option<String>) -> String {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => {
            if v.chars().count() > MAX_NAME_LEN {
                errors.add(field, format!("must be at most {} characters", MAX_NAME_LEN));
            }
            v
        }
        _ => {
            errors.add(field, "is required");
            String::new()
        }
    }
}

impl PetInput {
    /// Check the posted fields and build the pet to insert.
    pub fn validate(self) -> AppResult<Pet> {
        let mut errors = FieldErrors::default();

        let id = check_id(&mut errors, "id", self.id);
        let name = required_text(&mut errors, "name", self.name);

        let status = self.status.filter(|s| !s.is_empty());
        if let Some(status) = &status {
            if !PET_STATUSES.contains(&status.as_str()) {
                errors.add(
                    "status",
                    format!("must be one of {}", PET_STATUSES.join(", ")),
                );
            }
        }

        let category = self.category.map(|c| {
            let id = match c.id {
                Some(id) if id > 0 => id,
                _ => {
                    errors.add("category.id", "must be a positive integer");
                    0
                }
            };
            Category { id, name: c.name }
        });

        let images = self
            .images
            .into_iter()
            .enumerate()
            .map(|(i, image)| Image {
                id: check_id(&mut errors, &format!("images[{i}].id"), image.id),
                url: required_text(&mut errors, &format!("images[{i}].url"), image.url),
            })
            .collect();

        let tags = self
            .tags
            .into_iter()
            .enumerate()
            .map(|(i, tag)| Tag {
                id: check_id(&mut errors, &format!("tags[{i}].id"), tag.id),
                name: required_text(&mut errors, &format!("tags[{i}].name"), tag.name),
            })
            .collect();

        errors.into_result(Pet {
            id,
            category,
            images,
            name,
            status,
            tags,
        })
    }
}
