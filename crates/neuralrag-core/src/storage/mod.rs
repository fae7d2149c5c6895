//! Storage module
//!
//! Durable graph store over SQLite with WAL journaling and versioned
//! migrations.

pub mod migrations;
mod sqlite;

pub use migrations::SCHEMA_VERSION;
pub use sqlite::{
    blob_to_embedding, embedding_to_blob, BrainError, Result, Store, STORE_DIR, STORE_FILE,
};
