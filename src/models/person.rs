//! Person model for the views application.

use crate::error::{AppError, AppResult};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_AGE: i32 = 150;
pub const MAX_PERSON_NAME_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Person {
    pub id: i32,
    pub name: String,
    pub age: i32,
    pub birth_date: DateTime<FixedOffset>,
}

/// Submitted form fields, kept as text so the page can echo them back.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonForm {
    #[serde(rename = "__RequestVerificationToken")]
    pub request_verification_token: Option<String>,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Age", default)]
    pub age: String,
    #[serde(rename = "BirthDate", default)]
    pub birth_date: String,
}

impl PersonForm {
    /// Parse the text fields into a person. The id is assigned on insert.
    pub fn validate(&self) -> AppResult<Person> {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut fail = |field: &str, message: &str| {
            fields
                .entry(field.to_string())
                .or_default()
                .push(message.to_string());
        };

        let name = self.name.trim().to_string();
        if name.is_empty() {
            fail("Name", "The Name field is required.");
        } else if name.chars().count() > MAX_PERSON_NAME_LEN {
            fail("Name", "The Name field is too long.");
        }

        let age = match self.age.trim().parse::<i32>() {
            Ok(age) if (0..=MAX_AGE).contains(&age) => age,
            Ok(_) => {
                fail("Age", "The Age field is out of range.");
                0
            }
            Err(_) => {
                fail("Age", "The Age field must be a number.");
                0
            }
        };

        let birth_date = match parse_birth_date(self.birth_date.trim()) {
            Some(date) => Some(date),
            None => {
                fail("BirthDate", "The BirthDate field must be a date.");
                None
            }
        };

        match birth_date {
            Some(birth_date) if fields.is_empty() => Ok(Person {
                id: 0,
                name,
                age,
                birth_date,
            }),
            _ => Err(AppError::validation(fields)),
        }
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (taken as UTC midnight).
pub fn parse_birth_date(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let utc = FixedOffset::east_opt(0)?;
    date.and_hms_opt(0, 0, 0)?
        .and_local_timezone(utc)
        .single()
}
