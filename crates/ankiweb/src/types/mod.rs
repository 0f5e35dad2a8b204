//! Domain types for AnkiWeb card ingestion.

mod card;

pub use card::{Card, InputFormat};
