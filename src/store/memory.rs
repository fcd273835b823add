//! Lock-guarded in-memory [`EntityStore`].
//!
//! Backs the engine in tests and in embedders that have no database. Both
//! physical parent-relation layouts are supported: `Column` keeps the
//! parent on the entity row, `LinkTable` maintains a separate (child,
//! parent) pair table that children queries join through, so traversal code
//! exercises the same two paths a SQL-backed store would.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    entity::{
        CollectionSchema, DocumentId, Entity, EntityId, ParentLinkMode, PathEntry, PublishedState,
    },
    error::WaypathError,
    store::EntityStore,
};

/// Seed for [`MemoryStore::create`]. Ids are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewEntity {
    pub slug: String,
    pub title: Option<String>,
    pub parent: Option<EntityId>,
    pub published: PublishedState,
    pub layout: Option<String>,
    pub additional_paths: Vec<PathEntry>,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NewEntity {
    pub fn slug(slug: impl Into<String>) -> Self {
        NewEntity {
            slug: slug.into(),
            title: None,
            parent: None,
            published: PublishedState::Published,
            layout: None,
            additional_paths: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn parent(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn published(mut self, state: PublishedState) -> Self {
        self.published = state;
        self
    }

    pub fn layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    pub fn additional_path(mut self, path: impl Into<String>) -> Self {
        self.additional_paths.push(PathEntry::new(path));
        self
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    schemas: BTreeMap<String, CollectionSchema>,
    entities: BTreeMap<String, BTreeMap<EntityId, Entity>>,
    /// (child, parent) pairs for collections using the link-table layout.
    links: BTreeMap<String, BTreeSet<(EntityId, EntityId)>>,
    /// Collections whose bulk scans fail, for partial-build tests.
    failing: BTreeSet<String>,
    next_id: u64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn register_collection(&self, schema: CollectionSchema) {
        let mut inner = self.inner.write();
        inner.entities.entry(schema.name.clone()).or_default();
        inner.schemas.insert(schema.name.clone(), schema);
    }

    /// Insert a record, assigning its row and document ids.
    pub fn create(&self, collection: &str, seed: NewEntity) -> Entity {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let id = EntityId(inner.next_id);
        let entity = Entity {
            id,
            document_id: DocumentId::new(),
            collection: collection.to_string(),
            slug: seed.slug,
            title: seed.title,
            parent: seed.parent,
            additional_paths: seed.additional_paths,
            published: seed.published,
            layout: seed.layout,
            extra: seed.extra,
        };
        if let Some(parent) = entity.parent {
            if link_mode(&inner, collection) == ParentLinkMode::LinkTable {
                inner
                    .links
                    .entry(collection.to_string())
                    .or_default()
                    .insert((id, parent));
            }
        }
        inner
            .entities
            .entry(collection.to_string())
            .or_default()
            .insert(id, entity.clone());
        entity
    }

    /// Apply an in-place edit, resyncing the link table when the parent
    /// changed. Returns the updated record.
    pub fn update(
        &self,
        collection: &str,
        id: EntityId,
        edit: impl FnOnce(&mut Entity),
    ) -> Option<Entity> {
        let mut inner = self.inner.write();
        let mode = link_mode(&inner, collection);
        let (old_parent, updated) = {
            let entity = inner.entities.get_mut(collection)?.get_mut(&id)?;
            let old_parent = entity.parent;
            edit(entity);
            (old_parent, entity.clone())
        };
        if mode == ParentLinkMode::LinkTable && old_parent != updated.parent {
            let links = inner.links.entry(collection.to_string()).or_default();
            if let Some(old) = old_parent {
                links.remove(&(id, old));
            }
            if let Some(new) = updated.parent {
                links.insert((id, new));
            }
        }
        Some(updated)
    }

    pub fn remove(&self, collection: &str, id: EntityId) -> Option<Entity> {
        let mut inner = self.inner.write();
        let entity = inner.entities.get_mut(collection)?.remove(&id)?;
        if let Some(links) = inner.links.get_mut(collection) {
            links.retain(|(child, _)| *child != id);
        }
        Some(entity)
    }

    pub fn get(&self, collection: &str, id: EntityId) -> Option<Entity> {
        self.inner.read().entities.get(collection)?.get(&id).cloned()
    }

    /// Make every bulk scan of `collection` fail until cleared.
    pub fn fail_collection(&self, collection: &str) {
        self.inner.write().failing.insert(collection.to_string());
    }

    pub fn clear_failure(&self, collection: &str) {
        self.inner.write().failing.remove(collection);
    }

    fn published_children(&self, collection: &str, parent: EntityId) -> Vec<Entity> {
        let inner = self.inner.read();
        let Some(rows) = inner.entities.get(collection) else {
            return Vec::new();
        };
        let mut children: Vec<Entity> = match link_mode(&inner, collection) {
            ParentLinkMode::LinkTable => inner
                .links
                .get(collection)
                .map(|links| {
                    links
                        .iter()
                        .filter(|(_, p)| *p == parent)
                        .filter_map(|(child, _)| rows.get(child))
                        .filter(|e| e.is_published())
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
            ParentLinkMode::Column => rows
                .values()
                .filter(|e| e.parent == Some(parent) && e.is_published())
                .cloned()
                .collect(),
        };
        children.sort_by_key(|e| e.id);
        children
    }
}

fn link_mode(inner: &MemoryInner, collection: &str) -> ParentLinkMode {
    inner
        .schemas
        .get(collection)
        .map(|s| s.parent_link)
        .unwrap_or_default()
}

#[async_trait]
impl EntityStore for MemoryStore {
    fn collections(&self) -> Vec<String> {
        self.inner.read().schemas.keys().cloned().collect()
    }

    fn schema(&self, collection: &str) -> Option<CollectionSchema> {
        self.inner.read().schemas.get(collection).cloned()
    }

    async fn scan_published(&self, collection: &str) -> Result<Vec<Entity>, WaypathError> {
        let inner = self.inner.read();
        if inner.failing.contains(collection) {
            return Err(WaypathError::Store(format!(
                "injected scan failure for {collection}"
            )));
        }
        let Some(rows) = inner.entities.get(collection) else {
            return Err(WaypathError::NotFound(format!(
                "unknown collection {collection}"
            )));
        };
        Ok(rows.values().filter(|e| e.is_published()).cloned().collect())
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: EntityId,
    ) -> Result<Option<Entity>, WaypathError> {
        Ok(self.get(collection, id))
    }

    async fn find_by_slug(
        &self,
        collection: &str,
        slug: &str,
        published_only: bool,
    ) -> Result<Option<Entity>, WaypathError> {
        let inner = self.inner.read();
        let Some(rows) = inner.entities.get(collection) else {
            return Ok(None);
        };
        Ok(rows
            .values()
            .find(|e| e.slug == slug && (!published_only || e.is_published()))
            .cloned())
    }

    async fn children_of(
        &self,
        collection: &str,
        parent: EntityId,
    ) -> Result<Vec<Entity>, WaypathError> {
        Ok(self.published_children(collection, parent))
    }

    async fn has_children(
        &self,
        collection: &str,
        parent: EntityId,
    ) -> Result<bool, WaypathError> {
        Ok(!self.published_children(collection, parent).is_empty())
    }

    async fn update_additional_paths(
        &self,
        collection: &str,
        id: EntityId,
        paths: Vec<PathEntry>,
    ) -> Result<(), WaypathError> {
        let mut inner = self.inner.write();
        let entity = inner
            .entities
            .get_mut(collection)
            .and_then(|rows| rows.get_mut(&id))
            .ok_or_else(|| {
                WaypathError::NotFound(format!("no entity {id} in {collection}"))
            })?;
        entity.additional_paths = paths;
        Ok(())
    }
}
