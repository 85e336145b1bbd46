//! Record Stores
//!
//! Persistence and query helpers for the two record types:
//!
//! 1. **Similarity** - a directed edge between two entity references with a
//!    similarity score. Written by an external scoring process, read by
//!    recommendation consumers.
//! 2. **Recommendation** - an entity reference suggested to a user with a
//!    score. Written by an external recommendation job, read for display.
//!
//! Both stores are thin wrappers over a `PgPool` and are cheap to clone.
//! Uniqueness is enforced by database constraints; ranked retrieval uses
//! explicit ORDER BY clauses. Scores are nullable: an unset score means
//! "not yet computed" and such rows are kept out of ranked similarity
//! results (null ordering differs across stores, so we exclude rather than
//! rank them). Recommendation ranking sorts nulls last instead, so freshly
//! seeded rows remain visible at the bottom of a user's list.

pub mod recommendation;
pub mod similarity;

pub use recommendation::{Recommendation, RecommendationStore};
pub use similarity::{Similarity, SimilarityStore};

use crate::error::{Error, Result};

/// Reject scores the ranking order is undefined for
pub(crate) fn validate_score(score: Option<f64>) -> Result<()> {
    if let Some(value) = score {
        if !value.is_finite() {
            return Err(Error::validation(format!(
                "score must be finite, got {}",
                value
            )));
        }
    }
    Ok(())
}

/// Clamp a caller-supplied result limit into the configured bounds
pub(crate) fn effective_limit(limit: i64, default_limit: i64, max_limit: i64) -> i64 {
    if limit <= 0 {
        default_limit
    } else {
        limit.min(max_limit)
    }
}
