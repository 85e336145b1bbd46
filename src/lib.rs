//! Recommends store library crate
//!
//! Persists similarity and recommendation relationships between arbitrary
//! host-application entities, identified polymorphically by
//! `(entity_type, entity_id, site_id)` references.

pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use database::Database;
pub use entity::{EntityRef, EntityRegistry, EntityResolver, ResolvedEntity};
pub use error::{Error, Result};
pub use store::{Recommendation, RecommendationStore, Similarity, SimilarityStore};
