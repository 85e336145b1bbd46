//! Polymorphic entity references
//!
//! Records in this crate point at arbitrary host-application objects through a
//! `(entity_type, entity_id, site_id)` triple instead of a hard foreign key.
//! The type tag is an opaque string the host registers a resolver for; no
//! reflection is involved. Resolution is performed per call, with no caching.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// A typed pointer to any persisted host entity, scoped by site.
///
/// Embedded by value in both record types; the triple is unique per record
/// type that carries it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Type discriminator, e.g. `"catalog.product"`
    pub entity_type: String,
    /// Instance id within the type
    pub entity_id: i64,
    /// Deployment site the record belongs to
    pub site_id: i64,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, entity_id: i64, site_id: i64) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
            site_id,
        }
    }

    /// Validate the reference before it is written to the store
    pub fn validate(&self) -> Result<()> {
        if self.entity_type.is_empty() {
            return Err(Error::validation("entity type tag must not be empty"));
        }
        if self.entity_id <= 0 {
            return Err(Error::validation(format!(
                "entity id must be positive, got {}",
                self.entity_id
            )));
        }
        if self.site_id <= 0 {
            return Err(Error::validation(format!(
                "site id must be positive, got {}",
                self.site_id
            )));
        }
        Ok(())
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@site{}", self.entity_type, self.entity_id, self.site_id)
    }
}

/// A host entity handed back by a resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub entity_type: String,
    pub entity_id: i64,
    /// Stable slug, when the host entity has one
    pub slug: Option<String>,
    /// Human-readable name for display contexts
    pub display_name: Option<String>,
}

/// Future returned by [`EntityResolver::resolve`]
pub type ResolveFuture<'a> = Pin<Box<dyn Future<Output = Result<ResolvedEntity>> + Send + 'a>>;

/// Looks up a live host entity by id.
///
/// Implementations must return [`Error::NotFound`] when the instance no
/// longer exists; batch callers skip such records rather than abort.
pub trait EntityResolver: Send + Sync {
    fn resolve(&self, entity_id: i64) -> ResolveFuture<'_>;
}

/// Policy for deriving a stable string identifier from a resolved entity
pub type IdentifierPolicy = dyn Fn(&ResolvedEntity) -> String + Send + Sync;

/// Default identifier policy: the slug when present, otherwise `type:id`
fn default_identifier(entity: &ResolvedEntity) -> String {
    match &entity.slug {
        Some(slug) => format!("{}:{}", entity.entity_type, slug),
        None => format!("{}:{}", entity.entity_type, entity.entity_id),
    }
}

/// Registry mapping type tags to resolvers.
///
/// The host application registers one resolver per entity type it wants to
/// appear in similarity or recommendation records. An explicit registry
/// replaces the reflection-based generic relations of typical web frameworks.
pub struct EntityRegistry {
    resolvers: HashMap<String, Arc<dyn EntityResolver>>,
    identifier_policy: Box<IdentifierPolicy>,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            resolvers: HashMap::new(),
            identifier_policy: Box::new(default_identifier),
        }
    }

    /// Register a resolver for a type tag, replacing any previous one
    pub fn register(&mut self, entity_type: impl Into<String>, resolver: Arc<dyn EntityResolver>) {
        let entity_type = entity_type.into();
        debug!("Registered entity resolver for type '{}'", entity_type);
        self.resolvers.insert(entity_type, resolver);
    }

    /// Override the identifier derivation policy
    pub fn set_identifier_policy(
        &mut self,
        policy: impl Fn(&ResolvedEntity) -> String + Send + Sync + 'static,
    ) {
        self.identifier_policy = Box::new(policy);
    }

    /// Returns true if a resolver is registered for the given type tag
    pub fn supports(&self, entity_type: &str) -> bool {
        self.resolvers.contains_key(entity_type)
    }

    /// Resolve the live entity behind a reference.
    ///
    /// Fails with NotFound when the type tag is unregistered or the instance
    /// has been deleted.
    pub async fn resolve(&self, entity: &EntityRef) -> Result<ResolvedEntity> {
        let resolver = self
            .resolvers
            .get(&entity.entity_type)
            .ok_or_else(|| Error::not_found(entity.entity_type.clone(), entity.entity_id))?;

        resolver.resolve(entity.entity_id).await
    }

    /// Resolve a reference and derive its stable string identifier
    pub async fn identifier(&self, entity: &EntityRef) -> Result<String> {
        let resolved = self.resolve(entity).await?;
        Ok((self.identifier_policy)(&resolved))
    }
}

impl fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("types", &self.resolvers.keys().collect::<Vec<_>>())
            .finish()
    }
}
