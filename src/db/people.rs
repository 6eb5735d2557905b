//! People table used by the views application.

use crate::db::pool::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::Person;
use crate::models::person::parse_birth_date;

#[derive(Debug, sqlx::FromRow)]
struct PersonRow {
    id: i32,
    name: String,
    age: i32,
    /// RFC 3339 text; both engines store it the same way
    birth_date: String,
}

impl TryFrom<PersonRow> for Person {
    type Error = AppError;

    fn try_from(row: PersonRow) -> AppResult<Self> {
        let birth_date = parse_birth_date(&row.birth_date).ok_or_else(|| {
            AppError::internal(format!(
                "Stored birth date '{}' for person {} is not a timestamp",
                row.birth_date, row.id
            ))
        })?;
        Ok(Person {
            id: row.id,
            name: row.name,
            age: row.age,
            birth_date,
        })
    }
}

pub struct PersonRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> PersonRepository<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert `person` and return it with its assigned id.
    pub async fn create(&self, person: &Person) -> AppResult<Person> {
        let birth_date = person.birth_date.to_rfc3339();
        let id: i32 = with_pool!(self.pool, |p| {
            sqlx::query_scalar(
                "INSERT INTO people (name, age, birth_date) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(person.name.as_str())
            .bind(person.age)
            .bind(birth_date.as_str())
            .fetch_one(p)
            .await?
        });
        Ok(Person {
            id,
            ..person.clone()
        })
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Person>> {
        let row: Option<PersonRow> = with_pool!(self.pool, |p| {
            sqlx::query_as("SELECT id, name, age, birth_date FROM people WHERE id = $1")
                .bind(id)
                .fetch_optional(p)
                .await?
        });
        row.map(Person::try_from).transpose()
    }

    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = with_pool!(self.pool, |p| {
            sqlx::query_scalar("SELECT COUNT(*) FROM people")
                .fetch_one(p)
                .await?
        });
        Ok(count)
    }
}
