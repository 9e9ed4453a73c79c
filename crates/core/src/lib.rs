//! Domain core for the episode studio.
//!
//! Pure, storage-agnostic building blocks shared by the database, pipeline
//! and API crates: the template catalog, the progress engine, chat intent
//! detection and event payloads, storage path conventions, and the keyed
//! lock used to serialize writers.

pub mod artifact_path;
pub mod chat;
pub mod error;
pub mod intent;
pub mod locks;
pub mod pagination;
pub mod progress;
pub mod templates;
pub mod types;
