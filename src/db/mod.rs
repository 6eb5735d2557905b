//! Database layer.
//!
//! - Connection pools for the embedded (SQLite) and external (PostgreSQL) providers
//! - Schema definitions and the provision/teardown lifecycle
//! - Repositories for the pet store and views applications
//! - Database dispatch macro for running one query body against either pool

pub mod lifecycle;
#[macro_use]
pub mod macros;
pub mod people;
pub mod pets;
pub mod pool;
pub mod schema;

pub use lifecycle::{LifecycleState, SchemaLifecycle, TeardownOutcome};
pub use people::PersonRepository;
pub use pets::PetRepository;
pub use pool::DbPool;
pub use schema::Schema;
