//! Pet store queries.
//!
//! Lookups return the first matching pet (lowest id) with its category,
//! images and tags loaded. Creation writes the pet and its children in one
//! transaction and reads the row back, so the response reflects what was
//! persisted.

use crate::db::pool::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{Category, Image, Pet, Tag};
use tracing::debug;

const PET_SELECT: &str = "SELECT p.id, p.name, p.status, p.category_id, c.name AS category_name
    FROM pets p LEFT JOIN categories c ON c.id = p.category_id";

const INSERT_CATEGORY: &str =
    "INSERT INTO categories (id, name) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING";
const INSERT_PET: &str =
    "INSERT INTO pets (name, status, category_id) VALUES ($1, $2, $3) RETURNING id";
const INSERT_PET_WITH_ID: &str =
    "INSERT INTO pets (id, name, status, category_id) VALUES ($1, $2, $3, $4) RETURNING id";
const INSERT_IMAGE: &str = "INSERT INTO images (url, pet_id) VALUES ($1, $2)";
const INSERT_IMAGE_WITH_ID: &str = "INSERT INTO images (id, url, pet_id) VALUES ($1, $2, $3)";
const INSERT_TAG: &str = "INSERT INTO tags (name, pet_id) VALUES ($1, $2)";
const INSERT_TAG_WITH_ID: &str = "INSERT INTO tags (id, name, pet_id) VALUES ($1, $2, $3)";

const SYNC_PETS_SEQUENCE: &str =
    "SELECT setval(pg_get_serial_sequence('pets', 'id'), (SELECT MAX(id) FROM pets))";
const SYNC_IMAGES_SEQUENCE: &str =
    "SELECT setval(pg_get_serial_sequence('images', 'id'), (SELECT MAX(id) FROM images))";
const SYNC_TAGS_SEQUENCE: &str =
    "SELECT setval(pg_get_serial_sequence('tags', 'id'), (SELECT MAX(id) FROM tags))";

#[derive(Debug, sqlx::FromRow)]
struct PetRow {
    id: i32,
    name: String,
    status: Option<String>,
    category_id: Option<i32>,
    category_name: Option<String>,
}

pub struct PetRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> PetRepository<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Pet>> {
        let sql = format!("{PET_SELECT} WHERE p.id = $1");
        let row: Option<PetRow> = with_pool!(self.pool, |p| {
            sqlx::query_as(&sql).bind(id).fetch_optional(p).await?
        });
        self.load(row).await
    }

    pub async fn find_by_category(&self, category_id: i32) -> AppResult<Option<Pet>> {
        let sql = format!("{PET_SELECT} WHERE p.category_id = $1 ORDER BY p.id LIMIT 1");
        let row: Option<PetRow> = with_pool!(self.pool, |p| {
            sqlx::query_as(&sql).bind(category_id).fetch_optional(p).await?
        });
        self.load(row).await
    }

    /// `None` matches pets without a status.
    pub async fn find_by_status(&self, status: Option<&str>) -> AppResult<Option<Pet>> {
        let row: Option<PetRow> = match status {
            Some(status) => {
                let sql = format!("{PET_SELECT} WHERE p.status = $1 ORDER BY p.id LIMIT 1");
                with_pool!(self.pool, |p| {
                    sqlx::query_as(&sql).bind(status).fetch_optional(p).await?
                })
            }
            None => {
                let sql = format!("{PET_SELECT} WHERE p.status IS NULL ORDER BY p.id LIMIT 1");
                with_pool!(self.pool, |p| {
                    sqlx::query_as(&sql).fetch_optional(p).await?
                })
            }
        };
        self.load(row).await
    }

    /// First pet carrying any of `tags`. An empty list never matches.
    pub async fn find_by_tags(&self, tags: &[String]) -> AppResult<Option<Pet>> {
        if tags.is_empty() {
            return Ok(None);
        }
        let placeholders = (1..=tags.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "{PET_SELECT} WHERE EXISTS (SELECT 1 FROM tags t WHERE t.pet_id = p.id AND t.name IN ({placeholders}))
            ORDER BY p.id LIMIT 1"
        );
        let row: Option<PetRow> = with_pool!(self.pool, |p| {
            let mut query = sqlx::query_as(&sql);
            for tag in tags {
                query = query.bind(tag.as_str());
            }
            query.fetch_optional(p).await?
        });
        self.load(row).await
    }

    /// Insert `pet` with its category reference, images and tags.
    ///
    /// Ids of zero are assigned by the database. Duplicate ids surface as
    /// [`AppError::Conflict`], as does naming an existing category
    /// differently from what is stored.
    pub async fn create(&self, pet: &Pet) -> AppResult<Pet> {
        let category_id = pet.category.as_ref().map(|c| c.id);
        let sequences = self.sequences_to_sync(pet);

        let id: i32 = with_pool!(self.pool, |p| {
            let mut tx = p.begin().await?;

            if let Some(category) = &pet.category {
                sqlx::query(INSERT_CATEGORY)
                    .bind(category.id)
                    .bind(category.name.as_deref())
                    .execute(&mut *tx)
                    .await?;

                if let Some(name) = category.name.as_deref() {
                    let stored: Option<String> =
                        sqlx::query_scalar("SELECT name FROM categories WHERE id = $1")
                            .bind(category.id)
                            .fetch_one(&mut *tx)
                            .await?;
                    if stored.as_deref() != Some(name) {
                        return Err(AppError::Conflict {
                            message: format!(
                                "Category {} already exists with a different name",
                                category.id
                            ),
                            constraint: None,
                            table: Some("categories".to_string()),
                        });
                    }
                }
            }

            let id: i32 = if pet.id > 0 {
                sqlx::query_scalar(INSERT_PET_WITH_ID)
                    .bind(pet.id)
                    .bind(pet.name.as_str())
                    .bind(pet.status.as_deref())
                    .bind(category_id)
                    .fetch_one(&mut *tx)
                    .await?
            } else {
                sqlx::query_scalar(INSERT_PET)
                    .bind(pet.name.as_str())
                    .bind(pet.status.as_deref())
                    .bind(category_id)
                    .fetch_one(&mut *tx)
                    .await?
            };

            for image in &pet.images {
                let mut query =
                    sqlx::query(if image.id > 0 { INSERT_IMAGE_WITH_ID } else { INSERT_IMAGE });
                if image.id > 0 {
                    query = query.bind(image.id);
                }
                query.bind(image.url.as_str()).bind(id).execute(&mut *tx).await?;
            }

            for tag in &pet.tags {
                let mut query =
                    sqlx::query(if tag.id > 0 { INSERT_TAG_WITH_ID } else { INSERT_TAG });
                if tag.id > 0 {
                    query = query.bind(tag.id);
                }
                query.bind(tag.name.as_str()).bind(id).execute(&mut *tx).await?;
            }

            for &sql in &sequences {
                sqlx::query(sql).execute(&mut *tx).await?;
            }

            tx.commit().await?;
            id
        });

        debug!(pet_id = id, "Pet created");

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::internal(format!("Pet {} vanished after insert", id)))
    }

    /// PostgreSQL identity sequences do not move on explicit-id inserts, so
    /// each table written with a caller-chosen id is resynced to its max.
    fn sequences_to_sync(&self, pet: &Pet) -> Vec<&'static str> {
        if !matches!(self.pool, DbPool::Postgres(_)) {
            return Vec::new();
        }
        let mut sequences = Vec::new();
        if pet.id > 0 {
            sequences.push(SYNC_PETS_SEQUENCE);
        }
        if pet.images.iter().any(|image| image.id > 0) {
            sequences.push(SYNC_IMAGES_SEQUENCE);
        }
        if pet.tags.iter().any(|tag| tag.id > 0) {
            sequences.push(SYNC_TAGS_SEQUENCE);
        }
        sequences
    }

    /// Lowest and highest tag ids, for diagnostics.
    pub async fn tag_id_range(&self) -> AppResult<(Option<i32>, Option<i32>)> {
        let range: (Option<i32>, Option<i32>) = with_pool!(self.pool, |p| {
            sqlx::query_as("SELECT MIN(id), MAX(id) FROM tags")
                .fetch_one(p)
                .await?
        });
        Ok(range)
    }

    async fn load(&self, row: Option<PetRow>) -> AppResult<Option<Pet>> {
        let Some(row) = row else {
            return Ok(None);
        };

        let (images, tags): (Vec<Image>, Vec<Tag>) = with_pool!(self.pool, |p| {
            let images: Vec<Image> =
                sqlx::query_as("SELECT id, url FROM images WHERE pet_id = $1 ORDER BY id")
                    .bind(row.id)
                    .fetch_all(p)
                    .await?;
            let tags: Vec<Tag> =
                sqlx::query_as("SELECT id, name FROM tags WHERE pet_id = $1 ORDER BY id")
                    .bind(row.id)
                    .fetch_all(p)
                    .await?;
            (images, tags)
        });

        Ok(Some(Pet {
            id: row.id,
            category: row.category_id.map(|id| Category {
                id,
                name: row.category_name,
            }),
            images,
            name: row.name,
            status: row.status,
            tags,
        }))
    }
}
