//! Recommendation records
//!
//! An entity suggested to a user, with a score. A user is recommended a given
//! object at most once: rows are unique over `(object_type, object_id,
//! user_id)`, so re-running a recommendation job updates the score instead of
//! duplicating the row.

use crate::config::StoreConfig;
use crate::entity::{EntityRef, EntityRegistry};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;

use super::{effective_limit, validate_score};

/// An object recommended for a particular user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: i64,
    /// The recommended entity
    pub object: EntityRef,
    /// User the recommendation is for
    pub user_id: i64,
    /// Recommendation score; `None` until computed
    pub score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recommendation {
    /// Stable identifier of the recommended entity.
    ///
    /// Fails with NotFound when the entity has been deleted; batch callers
    /// should skip the record.
    pub async fn object_identifier(&self, registry: &EntityRegistry) -> Result<String> {
        registry.identifier(&self.object).await
    }
}

/// Database row for recommendations
#[derive(Debug, sqlx::FromRow)]
struct RecommendationRow {
    id: i64,
    object_type: String,
    object_id: i64,
    object_site: i64,
    user_id: i64,
    score: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RecommendationRow> for Recommendation {
    fn from(row: RecommendationRow) -> Self {
        Self {
            id: row.id,
            object: EntityRef::new(row.object_type, row.object_id, row.object_site),
            user_id: row.user_id,
            score: row.score,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const RECOMMENDATION_COLUMNS: &str =
    "id, object_type, object_id, object_site, user_id, score, created_at, updated_at";

/// Query helpers for recommendations
#[derive(Clone)]
pub struct RecommendationStore {
    pool: PgPool,
    config: StoreConfig,
}

impl RecommendationStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            config: StoreConfig::default(),
        }
    }

    pub fn with_config(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Insert a new recommendation. A duplicate (object, user) pair fails
    /// with Conflict; upserting callers should use [`Self::upsert`] instead.
    pub async fn insert(
        &self,
        user_id: i64,
        object: &EntityRef,
        score: Option<f64>,
    ) -> Result<Recommendation> {
        object.validate()?;
        validate_user(user_id)?;
        validate_score(score)?;

        let row = sqlx::query_as::<_, RecommendationRow>(
            r#"
            INSERT INTO recommendations
                (object_type, object_id, object_site, user_id, score)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, object_type, object_id, object_site,
                      user_id, score, created_at, updated_at
            "#,
        )
        .bind(&object.entity_type)
        .bind(object.entity_id)
        .bind(object.site_id)
        .bind(user_id)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    /// Insert or update the recommendation for a (user, object) pair.
    ///
    /// Idempotent: the second write for the same pair replaces the score.
    /// Losing writers in a concurrent race are turned into updates by the
    /// unique constraint within the single statement.
    pub async fn upsert(
        &self,
        user_id: i64,
        object: &EntityRef,
        score: Option<f64>,
    ) -> Result<Recommendation> {
        object.validate()?;
        validate_user(user_id)?;
        validate_score(score)?;

        let row = sqlx::query_as::<_, RecommendationRow>(
            r#"
            INSERT INTO recommendations
                (object_type, object_id, object_site, user_id, score)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (object_type, object_id, user_id)
            DO UPDATE SET score = EXCLUDED.score,
                          object_site = EXCLUDED.object_site,
                          updated_at = NOW()
            RETURNING id, object_type, object_id, object_site,
                      user_id, score, created_at, updated_at
            "#,
        )
        .bind(&object.entity_type)
        .bind(object.entity_id)
        .bind(object.site_id)
        .bind(user_id)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;

        debug!("Upserted recommendation of {} for user {}", object, user_id);
        Ok(row.into())
    }

    /// Fetch the recommendation of an object for a user, or None
    pub async fn get(&self, user_id: i64, object: &EntityRef) -> Result<Option<Recommendation>> {
        let row = sqlx::query_as::<_, RecommendationRow>(&format!(
            r#"
            SELECT {RECOMMENDATION_COLUMNS}
            FROM recommendations
            WHERE object_type = $1 AND object_id = $2 AND user_id = $3
            "#,
        ))
        .bind(&object.entity_type)
        .bind(object.entity_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Top-N recommendations for a user within a site, best first.
    ///
    /// Unscored rows sort last so freshly seeded recommendations stay
    /// visible. A non-positive limit falls back to the configured default.
    pub async fn top_for_user(
        &self,
        user_id: i64,
        site_id: i64,
        limit: i64,
    ) -> Result<Vec<Recommendation>> {
        validate_user(user_id)?;
        let limit = effective_limit(limit, self.config.default_limit, self.config.max_limit);

        let rows = sqlx::query_as::<_, RecommendationRow>(&format!(
            r#"
            SELECT {RECOMMENDATION_COLUMNS}
            FROM recommendations
            WHERE user_id = $1 AND object_site = $2
            ORDER BY score DESC NULLS LAST
            LIMIT $3
            "#,
        ))
        .bind(user_id)
        .bind(site_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            "Fetched {} recommendations for user {} (site {})",
            rows.len(),
            user_id,
            site_id
        );
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Delete all recommendations for a user; returns the number removed.
    ///
    /// Cleanup hook for user deletion.
    pub async fn remove_for_user(&self, user_id: i64) -> Result<u64> {
        validate_user(user_id)?;

        let result = sqlx::query("DELETE FROM recommendations WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        debug!(
            "Removed {} recommendations for user {}",
            result.rows_affected(),
            user_id
        );
        Ok(result.rows_affected())
    }

    /// Delete all recommendations of an entity; returns the number removed.
    ///
    /// Cleanup hook for host-entity deletion.
    pub async fn remove_for_entity(&self, entity: &EntityRef) -> Result<u64> {
        entity.validate()?;

        let result = sqlx::query(
            r#"
            DELETE FROM recommendations
            WHERE object_type = $1 AND object_id = $2 AND object_site = $3
            "#,
        )
        .bind(&entity.entity_type)
        .bind(entity.entity_id)
        .bind(entity.site_id)
        .execute(&self.pool)
        .await?;

        debug!(
            "Removed {} recommendations of {}",
            result.rows_affected(),
            entity
        );
        Ok(result.rows_affected())
    }
}

fn validate_user(user_id: i64) -> Result<()> {
    if user_id <= 0 {
        return Err(Error::validation(format!(
            "user id must be positive, got {}",
            user_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::MemoryResolver;
    use std::sync::Arc;

    #[test]
    fn test_validate_user() {
        assert!(validate_user(1).is_ok());
        assert!(validate_user(0).is_err());
        assert!(validate_user(-42).is_err());
    }

    #[tokio::test]
    async fn test_object_identifier() {
        let resolver = Arc::new(MemoryResolver::new("catalog.product"));
        resolver.insert(7, Some("red-shoes"));

        let mut registry = EntityRegistry::new();
        registry.register("catalog.product", resolver);

        let rec = Recommendation {
            id: 1,
            object: EntityRef::new("catalog.product", 7, 1),
            user_id: 42,
            score: Some(0.5),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(
            rec.object_identifier(&registry).await.unwrap(),
            "catalog.product:red-shoes"
        );
    }
}
