//! Derivation of an entity's canonical hierarchical path.
//!
//! The default path is the concatenation of ancestor slugs from root to the
//! entity, `servizi/area-riservata` style. It is recomputed from current
//! slugs on every walk, never cached: any ancestor rename invalidates it,
//! and the consistency coordinator is responsible for rewriting it into the
//! entity's additional-paths list.

use std::sync::Arc;

use crate::{config::WaypathConfig, entity::EntityId, entity::PathEntry, store::EntityStore};

#[derive(Clone)]
pub struct DefaultPathGenerator {
    store: Arc<dyn EntityStore>,
    config: WaypathConfig,
}

impl DefaultPathGenerator {
    pub fn new(store: Arc<dyn EntityStore>, config: WaypathConfig) -> Self {
        DefaultPathGenerator { store, config }
    }

    /// Name of the collection's self-relation field, if it has one. Pure
    /// schema introspection, no store I/O.
    pub fn parent_field(&self, collection: &str) -> Option<String> {
        self.store
            .schema(collection)?
            .self_relation_field()
            .map(str::to_string)
    }

    /// Walk the ancestor chain and build the root-to-leaf path.
    ///
    /// Resolves the entity by id when given, by slug otherwise. Returns
    /// `None` when the entity cannot be found and the bare slug when the
    /// collection has no self-relation. A lookup failure mid-walk stops the
    /// walk and returns the partial path built so far: some path beats no
    /// path. The depth bound exists to survive an accidental parent cycle.
    pub async fn build_default_path(
        &self,
        slug: &str,
        collection: &str,
        entity_id: Option<EntityId>,
    ) -> Option<String> {
        if self.parent_field(collection).is_none() {
            tracing::debug!(collection, "no self-relation field, default path is the slug");
            return Some(slug.to_string());
        }

        let entity = match entity_id {
            Some(id) => self.store.find_by_id(collection, id).await,
            None => self.store.find_by_slug(collection, slug, false).await,
        }
        .unwrap_or_else(|err| {
            tracing::debug!(collection, error = %err, "entity lookup failed");
            None
        })?;

        let mut parts = vec![entity.slug.clone()];
        let mut parent = entity.parent;
        while let Some(parent_id) = parent {
            if parts.len() as u32 >= self.config.max_ancestor_depth {
                tracing::warn!(
                    collection,
                    depth = parts.len(),
                    "ancestor walk hit depth bound, returning partial path"
                );
                break;
            }
            match self.store.find_by_id(collection, parent_id).await {
                Ok(Some(node)) => {
                    parts.push(node.slug.clone());
                    parent = node.parent;
                }
                Ok(None) => {
                    tracing::debug!(
                        collection,
                        ancestor = %parent_id,
                        "ancestor missing, stopping walk"
                    );
                    break;
                }
                Err(err) => {
                    tracing::warn!(
                        collection,
                        ancestor = %parent_id,
                        error = %err,
                        "ancestor lookup failed mid-walk, returning partial path"
                    );
                    break;
                }
            }
        }
        parts.reverse();
        Some(parts.join("/"))
    }

    /// New additional-paths list with the default path at position 0, or
    /// `None` when it is already present (idempotent: callers skip the
    /// store write on `None`).
    pub fn update_additional_paths(
        &self,
        existing: &[PathEntry],
        default_path: &str,
    ) -> Option<Vec<PathEntry>> {
        if existing.iter().any(|entry| entry.path == default_path) {
            return None;
        }
        let mut next = Vec::with_capacity(existing.len() + 1);
        next.push(PathEntry::new(default_path));
        next.extend_from_slice(existing);
        Some(next)
    }
}

impl std::fmt::Debug for DefaultPathGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("DefaultPathGenerator")
            .field("max_ancestor_depth", &self.config.max_ancestor_depth)
            .finish()
    }
}
