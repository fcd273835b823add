//! Reactive glue between store mutations and derived path state.
//!
//! The coordinator is invoked by the persistence layer around each
//! create/update/delete of a tracked entity: `before_update` snapshots the
//! state the update is about to destroy, the `after_*` handlers reconcile
//! the path registry and the entity's stored default path once the write
//! has committed. Registry updates always trail the commit, so a reader in
//! the gap sees stale registry state; the registry's store-fallback path
//! covers that window.
//!
//! Every registry mutation here goes through the registry's incremental
//! `add_path`/`remove_path`, keeping per-write cost proportional to the
//! paths touched. [`crate::registry::PathRegistry::invalidate`] remains the
//! tool for bulk external changes this handler-level diffing cannot see.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::{
    config::WaypathConfig,
    default_path::DefaultPathGenerator,
    entity::{DocumentId, Entity, EntityId, PublishedState},
    registry::{PathRegistry, PathTarget},
    store::EntityStore,
};

/// Pre-update state of one descendant, captured because the update handler
/// only ever sees post-update data.
#[derive(Debug, Clone, PartialEq)]
pub struct DescendantSnapshot {
    pub id: EntityId,
    pub slug: String,
    pub prior_default_path: Option<String>,
}

/// Everything `after_update` needs about the entity as it was before the
/// write committed.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSnapshot {
    collection: String,
    id: EntityId,
    document_id: DocumentId,
    prior_slug: String,
    prior_published: PublishedState,
    /// Raw prior paths: the slug plus every additional path.
    prior_paths: Vec<String>,
    prior_default_path: Option<String>,
    /// Populated only when the incoming write changes the slug.
    descendants: Vec<DescendantSnapshot>,
}

impl UpdateSnapshot {
    pub fn prior_default_path(&self) -> Option<&str> {
        self.prior_default_path.as_deref()
    }

    pub fn descendants(&self) -> &[DescendantSnapshot] {
        &self.descendants
    }
}

pub struct Coordinator {
    store: Arc<dyn EntityStore>,
    registry: Arc<PathRegistry>,
    paths: DefaultPathGenerator,
    config: WaypathConfig,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn EntityStore>,
        registry: Arc<PathRegistry>,
        config: WaypathConfig,
    ) -> Self {
        let paths = DefaultPathGenerator::new(store.clone(), config.clone());
        Coordinator {
            store,
            registry,
            paths,
            config,
        }
    }

    pub fn default_paths(&self) -> &DefaultPathGenerator {
        &self.paths
    }

    /// React to a committed create: register paths if published, then
    /// derive and persist the default path if the collection tracks one.
    /// The two concerns are isolated; a failure in one never blocks the
    /// other.
    pub async fn after_create(&self, entity: &Entity) {
        if entity.is_published() {
            self.register_entity(entity);
        }
        if self.tracks_default_path(&entity.collection) {
            self.apply_default_path(&entity.collection, entity.id, None)
                .await;
        }
    }

    /// Snapshot the state an impending update will destroy. `incoming_slug`
    /// is the slug value the write carries, when it carries one; a changed
    /// slug triggers collection of descendant snapshots for the later
    /// cascade. Returns `None` when the entity cannot be found (nothing to
    /// snapshot, and `after_update` degrades gracefully without one).
    pub async fn before_update(
        &self,
        collection: &str,
        id: EntityId,
        incoming_slug: Option<&str>,
    ) -> Option<UpdateSnapshot> {
        let entity = self
            .store
            .find_by_id(collection, id)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(collection, error = %err, "pre-update snapshot fetch failed");
                None
            })?;
        let slug_will_change = matches!(incoming_slug, Some(slug) if slug != entity.slug);
        let descendants = if slug_will_change && self.paths.parent_field(collection).is_some() {
            self.collect_descendants(collection, id, 0).await
        } else {
            Vec::new()
        };
        let prior_default_path = if self.tracks_default_path(collection) {
            self.paths
                .build_default_path(&entity.slug, collection, Some(id))
                .await
        } else {
            None
        };
        Some(UpdateSnapshot {
            collection: collection.to_string(),
            id,
            document_id: entity.document_id,
            prior_slug: entity.slug.clone(),
            prior_published: entity.published,
            prior_paths: paths_of(&entity),
            prior_default_path,
            descendants,
        })
    }

    /// React to a committed update, comparing prior and new publication
    /// state.
    pub async fn after_update(&self, snapshot: UpdateSnapshot, entity: &Entity) {
        let was_published = snapshot.prior_published.is_published();
        let is_published = entity.is_published();
        match (was_published, is_published) {
            // Unpublished: every path disappears from resolution, and no
            // default-path work applies to an invisible entity.
            (true, false) => {
                self.unregister_paths(&snapshot.prior_paths, &snapshot.document_id);
                return;
            }
            (false, true) => {
                self.register_entity(entity);
            }
            (false, false) => {}
            // Still published, content edited: swap prior paths for new.
            (true, true) => {
                self.unregister_paths(&snapshot.prior_paths, &snapshot.document_id);
                self.register_entity(entity);
            }
        }

        if !self.tracks_default_path(&entity.collection) {
            return;
        }
        self.apply_default_path(
            &entity.collection,
            entity.id,
            snapshot.prior_default_path.as_deref(),
        )
        .await;

        let slug_changed = snapshot.prior_slug != entity.slug;
        if slug_changed && !snapshot.descendants.is_empty() {
            tracing::debug!(
                collection = %entity.collection,
                descendants = snapshot.descendants.len(),
                old_slug = %snapshot.prior_slug,
                new_slug = %entity.slug,
                "slug changed, cascading default-path recomputation"
            );
            for descendant in &snapshot.descendants {
                self.apply_default_path(
                    &entity.collection,
                    descendant.id,
                    descendant.prior_default_path.as_deref(),
                )
                .await;
            }
        }
    }

    /// React to a committed delete: drop every path the entity owned.
    pub async fn after_delete(&self, entity: &Entity) {
        self.unregister_paths(&paths_of(entity), &entity.document_id);
    }

    /// Does this collection carry both a slug and an additional-paths list,
    /// i.e. does it participate in default-path generation?
    fn tracks_default_path(&self, collection: &str) -> bool {
        self.store
            .schema(collection)
            .map(|schema| schema.has_slug() && schema.has_additional_paths())
            .unwrap_or(false)
    }

    fn register_entity(&self, entity: &Entity) {
        self.registry
            .add_path(&entity.slug, PathTarget::primary(entity));
        for entry in &entity.additional_paths {
            self.registry
                .add_path(&entry.path, PathTarget::additional(entity));
        }
    }

    fn unregister_paths(&self, paths: &[String], document: &DocumentId) {
        for path in paths {
            self.registry.remove_path(path, document);
        }
    }

    /// Recompute one entity's default path, retire the prior one, and
    /// persist + re-register the result. Shared by create, update, and the
    /// rename cascade. Store failures are logged and absorbed: a failed
    /// persist leaves the old stored list for the next recomputation to
    /// repair.
    async fn apply_default_path(
        &self,
        collection: &str,
        id: EntityId,
        prior_path: Option<&str>,
    ) {
        let Some(entity) = self
            .store
            .find_by_id(collection, id)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(collection, error = %err, "default-path refetch failed");
                None
            })
        else {
            return;
        };
        let Some(new_default) = self
            .paths
            .build_default_path(&entity.slug, collection, Some(id))
            .await
        else {
            return;
        };

        let mut working = entity.additional_paths.clone();
        let mut dirty = false;
        if let Some(old) = prior_path {
            if old != new_default {
                let before = working.len();
                working.retain(|entry| entry.path != old);
                if working.len() != before {
                    dirty = true;
                    if entity.is_published() {
                        self.registry.remove_path(old, &entity.document_id);
                    }
                }
            }
        }
        if let Some(next) = self.paths.update_additional_paths(&working, &new_default) {
            working = next;
            dirty = true;
            if entity.is_published() {
                self.registry
                    .add_path(&new_default, PathTarget::additional(&entity));
            }
        }
        if dirty {
            if let Err(err) = self
                .store
                .update_additional_paths(collection, id, working)
                .await
            {
                tracing::warn!(
                    collection,
                    id = %id,
                    error = %err,
                    "failed to persist recomputed default path"
                );
            }
        }
    }

    /// Depth-first snapshot of every descendant's pre-update default path.
    /// Bounded by the ancestor depth limit so a cyclic relation cannot wedge
    /// the update hook.
    fn collect_descendants<'a>(
        &'a self,
        collection: &'a str,
        parent: EntityId,
        depth: u32,
    ) -> Pin<Box<dyn Future<Output = Vec<DescendantSnapshot>> + Send + 'a>> {
        Box::pin(async move {
            if depth >= self.config.max_ancestor_depth {
                tracing::warn!(
                    collection,
                    depth,
                    "descendant snapshot hit depth bound, truncating"
                );
                return Vec::new();
            }
            let children = self
                .store
                .children_of(collection, parent)
                .await
                .unwrap_or_else(|err| {
                    tracing::warn!(
                        collection,
                        parent = %parent,
                        error = %err,
                        "descendant query failed, truncating snapshot"
                    );
                    Vec::new()
                });
            let mut snapshots = Vec::new();
            for child in children {
                let prior_default_path = self
                    .paths
                    .build_default_path(&child.slug, collection, Some(child.id))
                    .await;
                snapshots.push(DescendantSnapshot {
                    id: child.id,
                    slug: child.slug.clone(),
                    prior_default_path,
                });
                snapshots.extend(
                    self.collect_descendants(collection, child.id, depth + 1)
                        .await,
                );
            }
            snapshots
        })
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("registry", &self.registry)
            .finish()
    }
}

fn paths_of(entity: &Entity) -> Vec<String> {
    std::iter::once(entity.slug.clone())
        .chain(entity.additional_paths.iter().map(|e| e.path.clone()))
        .collect()
}
