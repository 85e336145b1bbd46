//! Similarity records
//!
//! A directed "how alike" edge between two entity references. Edges are
//! unique over the full 6-tuple of subject and related columns; the score is
//! written by an external scoring process and may be unset until that process
//! has run.

use crate::config::StoreConfig;
use crate::entity::{EntityRef, EntityRegistry};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;

use super::{effective_limit, validate_score};

/// A directed similarity edge between two entities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Similarity {
    pub id: i64,
    /// Subject of the edge
    pub object: EntityRef,
    /// Entity the subject is similar to
    pub related: EntityRef,
    /// Similarity score; `None` until computed
    pub score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Similarity {
    /// Stable identifier of the subject entity.
    ///
    /// Fails with NotFound when the entity has been deleted; batch callers
    /// should skip the record.
    pub async fn object_identifier(&self, registry: &EntityRegistry) -> Result<String> {
        registry.identifier(&self.object).await
    }

    /// Stable identifier of the related entity
    pub async fn related_object_identifier(&self, registry: &EntityRegistry) -> Result<String> {
        registry.identifier(&self.related).await
    }
}

/// Database row for similarities
#[derive(Debug, sqlx::FromRow)]
struct SimilarityRow {
    id: i64,
    object_type: String,
    object_id: i64,
    object_site: i64,
    related_type: String,
    related_id: i64,
    related_site: i64,
    score: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SimilarityRow> for Similarity {
    fn from(row: SimilarityRow) -> Self {
        Self {
            id: row.id,
            object: EntityRef::new(row.object_type, row.object_id, row.object_site),
            related: EntityRef::new(row.related_type, row.related_id, row.related_site),
            score: row.score,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SIMILARITY_COLUMNS: &str = "id, object_type, object_id, object_site, \
     related_type, related_id, related_site, score, created_at, updated_at";

/// Query helpers for similarity edges
#[derive(Clone)]
pub struct SimilarityStore {
    pool: PgPool,
    config: StoreConfig,
}

impl SimilarityStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            config: StoreConfig::default(),
        }
    }

    pub fn with_config(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Insert a new edge. A duplicate 6-tuple fails with Conflict.
    pub async fn insert(
        &self,
        object: &EntityRef,
        related: &EntityRef,
        score: Option<f64>,
    ) -> Result<Similarity> {
        object.validate()?;
        related.validate()?;
        validate_score(score)?;

        let row = sqlx::query_as::<_, SimilarityRow>(
            r#"
            INSERT INTO similarities
                (object_type, object_id, object_site,
                 related_type, related_id, related_site, score)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, object_type, object_id, object_site,
                      related_type, related_id, related_site,
                      score, created_at, updated_at
            "#,
        )
        .bind(&object.entity_type)
        .bind(object.entity_id)
        .bind(object.site_id)
        .bind(&related.entity_type)
        .bind(related.entity_id)
        .bind(related.site_id)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    /// Insert or update the edge for a (subject, related) pair.
    ///
    /// Idempotent: re-running a scoring job for the same pair updates the
    /// score in place. Concurrent writers are serialized by the unique
    /// constraint inside a single statement, so no caller-side retry is
    /// needed.
    pub async fn upsert(
        &self,
        object: &EntityRef,
        related: &EntityRef,
        score: Option<f64>,
    ) -> Result<Similarity> {
        object.validate()?;
        related.validate()?;
        validate_score(score)?;

        let row = sqlx::query_as::<_, SimilarityRow>(
            r#"
            INSERT INTO similarities
                (object_type, object_id, object_site,
                 related_type, related_id, related_site, score)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (object_type, object_id, object_site,
                         related_type, related_id, related_site)
            DO UPDATE SET score = EXCLUDED.score, updated_at = NOW()
            RETURNING id, object_type, object_id, object_site,
                      related_type, related_id, related_site,
                      score, created_at, updated_at
            "#,
        )
        .bind(&object.entity_type)
        .bind(object.entity_id)
        .bind(object.site_id)
        .bind(&related.entity_type)
        .bind(related.entity_id)
        .bind(related.site_id)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;

        debug!("Upserted similarity {} -> {}", object, related);
        Ok(row.into())
    }

    /// Fetch a single edge, or None if it does not exist
    pub async fn get(&self, object: &EntityRef, related: &EntityRef) -> Result<Option<Similarity>> {
        let row = sqlx::query_as::<_, SimilarityRow>(&format!(
            r#"
            SELECT {SIMILARITY_COLUMNS}
            FROM similarities
            WHERE object_type = $1 AND object_id = $2 AND object_site = $3
              AND related_type = $4 AND related_id = $5 AND related_site = $6
            "#,
        ))
        .bind(&object.entity_type)
        .bind(object.entity_id)
        .bind(object.site_id)
        .bind(&related.entity_type)
        .bind(related.entity_id)
        .bind(related.site_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Ranked similar entities for a subject, best first.
    ///
    /// Filtered to the subject's site. Rows with an unset score are excluded:
    /// they carry no ranking information yet. A non-positive limit falls back
    /// to the configured default.
    pub async fn similar_to(&self, object: &EntityRef, limit: i64) -> Result<Vec<Similarity>> {
        object.validate()?;
        let limit = effective_limit(limit, self.config.default_limit, self.config.max_limit);

        let rows = sqlx::query_as::<_, SimilarityRow>(&format!(
            r#"
            SELECT {SIMILARITY_COLUMNS}
            FROM similarities
            WHERE object_type = $1 AND object_id = $2 AND object_site = $3
              AND score IS NOT NULL
            ORDER BY score DESC
            LIMIT $4
            "#,
        ))
        .bind(&object.entity_type)
        .bind(object.entity_id)
        .bind(object.site_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            "Fetched {} ranked similarities for subject {}",
            rows.len(),
            object
        );
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Delete every edge where the entity appears on either side.
    ///
    /// Cleanup hook for host-entity deletion; returns the number of edges
    /// removed. Referenced entities live in host-owned tables, so there is no
    /// database-level cascade to lean on.
    pub async fn remove_for_entity(&self, entity: &EntityRef) -> Result<u64> {
        entity.validate()?;

        let result = sqlx::query(
            r#"
            DELETE FROM similarities
            WHERE (object_type = $1 AND object_id = $2 AND object_site = $3)
               OR (related_type = $1 AND related_id = $2 AND related_site = $3)
            "#,
        )
        .bind(&entity.entity_type)
        .bind(entity.entity_id)
        .bind(entity.site_id)
        .execute(&self.pool)
        .await?;

        debug!(
            "Removed {} similarity edges touching {}",
            result.rows_affected(),
            entity
        );
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::MemoryResolver;
    use std::sync::Arc;

    fn edge(score: Option<f64>) -> Similarity {
        Similarity {
            id: 1,
            object: EntityRef::new("catalog.product", 7, 1),
            related: EntityRef::new("catalog.product", 9, 1),
            score,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_identifiers_resolve_both_sides() {
        let resolver = Arc::new(MemoryResolver::new("catalog.product"));
        resolver.insert(7, Some("red-shoes"));
        resolver.insert(9, Some("blue-shoes"));

        let mut registry = EntityRegistry::new();
        registry.register("catalog.product", resolver);

        let sim = edge(Some(0.8));
        assert_eq!(
            sim.object_identifier(&registry).await.unwrap(),
            "catalog.product:red-shoes"
        );
        assert_eq!(
            sim.related_object_identifier(&registry).await.unwrap(),
            "catalog.product:blue-shoes"
        );
    }

    #[tokio::test]
    async fn test_identifier_of_deleted_related_entity() {
        let resolver = Arc::new(MemoryResolver::new("catalog.product"));
        resolver.insert(7, None);
        // related entity 9 was never inserted, i.e. deleted since scoring

        let mut registry = EntityRegistry::new();
        registry.register("catalog.product", resolver);

        let sim = edge(Some(0.8));
        assert!(sim.object_identifier(&registry).await.is_ok());
        let err = sim.related_object_identifier(&registry).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
