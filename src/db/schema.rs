//! Table definitions owned by each application.
//!
//! Every statement is idempotent (`IF NOT EXISTS`, `ON CONFLICT DO NOTHING`)
//! so provisioning an existing schema is harmless. Tables are listed in
//! creation order and dropped in reverse.

use crate::config::AppKind;
use crate::models::DatabaseMode;

/// One table with its DDL for each engine.
#[derive(Debug)]
pub struct TableDef {
    pub name: &'static str,
    sqlite: &'static str,
    postgres: &'static str,
}

#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    tables: &'static [TableDef],
    /// Portable statements run after every table and index exists
    indexes: &'static [&'static str],
    seed: &'static [&'static str],
}

impl Schema {
    /// Statements that create tables, indexes and seed rows, in order.
    ///
    /// Returns nothing for [`DatabaseMode::Disabled`].
    pub fn create_statements(&self, mode: DatabaseMode) -> Vec<&'static str> {
        let ddl: Vec<&'static str> = match mode {
            DatabaseMode::Disabled => return Vec::new(),
            DatabaseMode::Embedded => self.tables.iter().map(|t| t.sqlite).collect(),
            DatabaseMode::External => self.tables.iter().map(|t| t.postgres).collect(),
        };
        ddl.into_iter()
            .chain(self.indexes.iter().copied())
            .chain(self.seed.iter().copied())
            .collect()
    }

    /// `DROP TABLE` statements, dependents first.
    pub fn drop_statements(&self) -> Vec<String> {
        self.tables
            .iter()
            .rev()
            .map(|t| format!("DROP TABLE IF EXISTS {}", t.name))
            .collect()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables.iter().map(|t| t.name)
    }

    pub fn for_app(app: AppKind) -> &'static Schema {
        match app {
            AppKind::PetStore => &PET_STORE,
            AppKind::Views => &VIEWS,
        }
    }
}

pub static PET_STORE: Schema = Schema {
    name: "pet-store",
    tables: &[
        TableDef {
            name: "categories",
            sqlite: "CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                name TEXT
            )",
            postgres: "CREATE TABLE IF NOT EXISTS categories (
                id INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
                name TEXT
            )",
        },
        TableDef {
            name: "pets",
            sqlite: "CREATE TABLE IF NOT EXISTS pets (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT,
                category_id INTEGER REFERENCES categories(id)
            )",
            postgres: "CREATE TABLE IF NOT EXISTS pets (
                id INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT,
                category_id INTEGER REFERENCES categories(id)
            )",
        },
        TableDef {
            name: "images",
            sqlite: "CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY,
                url TEXT NOT NULL,
                pet_id INTEGER NOT NULL REFERENCES pets(id)
            )",
            postgres: "CREATE TABLE IF NOT EXISTS images (
                id INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
                url TEXT NOT NULL,
                pet_id INTEGER NOT NULL REFERENCES pets(id)
            )",
        },
        TableDef {
            name: "tags",
            sqlite: "CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                pet_id INTEGER NOT NULL REFERENCES pets(id)
            )",
            postgres: "CREATE TABLE IF NOT EXISTS tags (
                id INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
                name TEXT NOT NULL,
                pet_id INTEGER NOT NULL REFERENCES pets(id)
            )",
        },
    ],
    indexes: &[
        "CREATE INDEX IF NOT EXISTS ix_pets_category_id ON pets (category_id)",
        "CREATE INDEX IF NOT EXISTS ix_pets_status ON pets (status)",
        "CREATE INDEX IF NOT EXISTS ix_images_pet_id ON images (pet_id)",
        "CREATE INDEX IF NOT EXISTS ix_tags_pet_id ON tags (pet_id)",
        "CREATE INDEX IF NOT EXISTS ix_tags_name ON tags (name)",
    ],
    seed: &["INSERT INTO categories (id, name) VALUES (1, 'Dogs'), (2, 'Cats'), (3, 'Birds')
        ON CONFLICT (id) DO NOTHING"],
};

pub static VIEWS: Schema = Schema {
    name: "views",
    tables: &[TableDef {
        name: "people",
        sqlite: "CREATE TABLE IF NOT EXISTS people (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            age INTEGER NOT NULL,
            birth_date TEXT NOT NULL
        )",
        postgres: "CREATE TABLE IF NOT EXISTS people (
            id INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
            name TEXT NOT NULL,
            age INTEGER NOT NULL,
            birth_date TEXT NOT NULL
        )",
    }],
    indexes: &[],
    seed: &[],
};
