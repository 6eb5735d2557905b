//! Data models for the benchmark applications.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod person;
pub mod pet;

// Re-export commonly used types
pub use connection::{ConnectionConfig, DatabaseMode};
pub use person::{Person, PersonForm};
pub use pet::{Category, Image, Pet, PetInput, Tag};
