//! In-memory O(1) path registry.
//!
//! [`PathRegistry`] owns the only shared mutable state in this crate: a map
//! from normalized path to the entity (or entities) the path resolves to.
//! The map is derived state, rebuilt by scanning every slug-bearing
//! collection, and mutated incrementally by the consistency coordinator as
//! entities change. A map miss does not mean "not found": resolution falls
//! back to the store (exact slug, then additional paths, then a
//! final-segment slug search over an explicit allow-list) so readers racing
//! a registry update still get correct answers, just slower.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tokio::{sync::Mutex, time::timeout};

use crate::{
    config::WaypathConfig,
    entity::{DocumentId, Entity, EntityId},
    normalize::{final_segment, normalize_path},
    store::EntityStore,
};

/// Which lookup stage produced a [`PathTarget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvedFrom {
    /// Matched the entity's own slug.
    Slug,
    /// Matched one of the entity's additional registered paths.
    AdditionalPath,
    /// Matched via the last-resort final-segment slug search.
    FallbackSlug,
}

/// Descriptor of one entity a path resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathTarget {
    pub slug: String,
    pub document_id: DocumentId,
    pub id: EntityId,
    pub collection: String,
    /// True when this key derives from the entity's own slug rather than an
    /// additional registered path.
    pub is_primary: bool,
    pub layout: Option<String>,
    pub resolved_from: ResolvedFrom,
}

impl PathTarget {
    pub fn primary(entity: &Entity) -> Self {
        PathTarget {
            slug: entity.slug.clone(),
            document_id: entity.document_id,
            id: entity.id,
            collection: entity.collection.clone(),
            is_primary: true,
            layout: entity.layout.clone(),
            resolved_from: ResolvedFrom::Slug,
        }
    }

    pub fn additional(entity: &Entity) -> Self {
        PathTarget {
            is_primary: false,
            resolved_from: ResolvedFrom::AdditionalPath,
            ..PathTarget::primary(entity)
        }
    }
}

/// Outcome of a successful resolution. A single match is returned directly;
/// an unresolved tie surfaces every candidate and leaves disambiguation to
/// the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Resolution {
    Single(PathTarget),
    Multiple(Vec<PathTarget>),
}

/// Map slot: most keys hold one target, colliding keys hold several.
#[derive(Debug, Clone)]
enum PathSlot {
    Single(PathTarget),
    Shared(Vec<PathTarget>),
}

impl PathSlot {
    /// Add a target, converting to `Shared` on collision. A document
    /// registers each normalized key at most once; when its slug and an
    /// additional path normalize to the same key, the primary entry wins.
    fn push(&mut self, target: PathTarget) {
        match self {
            PathSlot::Single(existing) => {
                if existing.document_id == target.document_id {
                    if target.is_primary && !existing.is_primary {
                        *existing = target;
                    }
                    return;
                }
                let first = existing.clone();
                *self = PathSlot::Shared(vec![first, target]);
            }
            PathSlot::Shared(list) => {
                if let Some(existing) = list
                    .iter_mut()
                    .find(|t| t.document_id == target.document_id)
                {
                    if target.is_primary && !existing.is_primary {
                        *existing = target;
                    }
                    return;
                }
                list.push(target);
            }
        }
    }

    fn targets(&self) -> Vec<PathTarget> {
        match self {
            PathSlot::Single(t) => vec![t.clone()],
            PathSlot::Shared(list) => list.clone(),
        }
    }
}

/// Registry observability counts. `duplicate_paths` counts collision
/// groups, not the targets inside them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub initialized: bool,
    pub total_paths: usize,
    pub primary_paths: usize,
    pub additional_paths: usize,
    pub duplicate_paths: usize,
}

pub struct PathRegistry {
    store: Arc<dyn EntityStore>,
    config: WaypathConfig,
    table: RwLock<Option<HashMap<String, PathSlot>>>,
    /// Serializes builds so concurrent callers coalesce onto one scan.
    build_guard: Mutex<()>,
    /// Bumped after every completed build; waiters use it to detect that an
    /// in-flight build already did their work.
    generation: AtomicU64,
}

impl PathRegistry {
    pub fn new(store: Arc<dyn EntityStore>, config: WaypathConfig) -> Self {
        PathRegistry {
            store,
            config,
            table: RwLock::new(None),
            build_guard: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.table.read().is_some()
    }

    /// Scan every slug-bearing collection and (re)construct the map.
    ///
    /// A second caller arriving mid-build waits (bounded by
    /// `build_wait_ms`) for the in-flight build instead of starting another
    /// scan; on timeout it proceeds with whatever state exists. A failed
    /// per-collection scan is logged and skipped, leaving a partial but
    /// usable registry.
    #[tracing::instrument(skip(self))]
    pub async fn build(&self) {
        let observed = self.generation.load(Ordering::Acquire);
        let _guard = match timeout(self.config.build_wait(), self.build_guard.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!(
                    "timed out waiting for in-flight registry build, proceeding with current state"
                );
                return;
            }
        };
        if self.generation.load(Ordering::Acquire) != observed {
            tracing::debug!("registry was rebuilt while waiting, skipping duplicate scan");
            return;
        }

        let mut table: HashMap<String, PathSlot> = HashMap::new();
        let mut entities_seen = 0usize;
        let mut collections_scanned = 0usize;
        for collection in self.store.collections() {
            let Some(schema) = self.store.schema(&collection) else {
                continue;
            };
            if !schema.has_slug() {
                continue;
            }
            let entities = match self.store.scan_published(&collection).await {
                Ok(entities) => entities,
                Err(err) => {
                    tracing::warn!(
                        collection = %collection,
                        error = %err,
                        "collection scan failed during registry build, skipping"
                    );
                    continue;
                }
            };
            collections_scanned += 1;
            entities_seen += entities.len();
            for entity in &entities {
                insert_target(&mut table, &entity.slug, PathTarget::primary(entity));
                for entry in &entity.additional_paths {
                    insert_target(&mut table, &entry.path, PathTarget::additional(entity));
                }
            }
        }

        let keys = table.len();
        *self.table.write() = Some(table);
        self.generation.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(
            collections = collections_scanned,
            entities = entities_seen,
            keys,
            "path registry built"
        );
    }

    /// Discard the map and rebuild from the store. Used after bulk external
    /// changes the coordinator cannot cheaply diff.
    pub async fn invalidate(&self) {
        *self.table.write() = None;
        self.build().await;
    }

    /// Resolve a public path to its entity descriptor(s).
    ///
    /// With `prefer_layout`, a collision where exactly one candidate
    /// carries the configured layout discriminator resolves to that
    /// candidate; otherwise every candidate is returned. All store failures
    /// on the fallback path degrade to `None`.
    pub async fn resolve(&self, path: &str, prefer_layout: bool) -> Option<Resolution> {
        let key = normalize_path(path);
        if key.is_empty() {
            return None;
        }
        if !self.is_initialized() {
            self.build().await;
        }
        let hit = self
            .table
            .read()
            .as_ref()
            .and_then(|table| table.get(&key).map(PathSlot::targets));
        if let Some(targets) = hit {
            return Some(self.select(targets, prefer_layout));
        }
        tracing::debug!(path = %key, "registry miss, falling back to store lookup");
        self.resolve_from_store(&key, prefer_layout).await
    }

    /// Incrementally register one path. No-op until the first `build()` has
    /// run; the build scan will pick the path up anyway.
    pub fn add_path(&self, path: &str, target: PathTarget) {
        let key = normalize_path(path);
        if key.is_empty() {
            return;
        }
        let mut guard = self.table.write();
        let Some(table) = guard.as_mut() else {
            return;
        };
        match table.entry(key) {
            Entry::Occupied(mut occupied) => occupied.get_mut().push(target),
            Entry::Vacant(vacant) => {
                vacant.insert(PathSlot::Single(target));
            }
        }
    }

    /// Remove `document`'s entry for one path. A collision group sheds only
    /// that member and collapses back to a singleton when one remains.
    pub fn remove_path(&self, path: &str, document: &DocumentId) {
        let key = normalize_path(path);
        let mut guard = self.table.write();
        let Some(table) = guard.as_mut() else {
            return;
        };
        let mut drop_key = false;
        let mut collapse = None;
        match table.get_mut(&key) {
            None => return,
            Some(PathSlot::Single(target)) => {
                drop_key = &target.document_id == document;
            }
            Some(PathSlot::Shared(list)) => {
                list.retain(|t| &t.document_id != document);
                if list.is_empty() {
                    drop_key = true;
                } else if list.len() == 1 {
                    collapse = list.pop();
                }
            }
        }
        if drop_key {
            table.remove(&key);
        } else if let Some(only) = collapse {
            table.insert(key, PathSlot::Single(only));
        }
    }

    pub fn stats(&self) -> RegistryStats {
        let guard = self.table.read();
        let Some(table) = guard.as_ref() else {
            return RegistryStats::default();
        };
        let mut stats = RegistryStats {
            initialized: true,
            ..RegistryStats::default()
        };
        for slot in table.values() {
            let targets = match slot {
                PathSlot::Single(t) => std::slice::from_ref(t),
                PathSlot::Shared(list) => {
                    stats.duplicate_paths += 1;
                    list.as_slice()
                }
            };
            for target in targets {
                stats.total_paths += 1;
                if target.is_primary {
                    stats.primary_paths += 1;
                } else {
                    stats.additional_paths += 1;
                }
            }
        }
        stats
    }

    fn select(&self, mut targets: Vec<PathTarget>, prefer_layout: bool) -> Resolution {
        if targets.len() == 1 {
            let only = targets.remove(0);
            return Resolution::Single(only);
        }
        if prefer_layout {
            if let Some(preferred) = self.config.preferred_layout.as_deref() {
                if let Some(hit) = targets
                    .iter()
                    .find(|t| t.layout.as_deref() == Some(preferred))
                {
                    tracing::debug!(
                        layout = preferred,
                        collection = %hit.collection,
                        "tie-break resolved colliding path"
                    );
                    return Resolution::Single(hit.clone());
                }
            }
        }
        Resolution::Multiple(targets)
    }

    /// Slow path: query the store directly. Stage 1 matches the key as an
    /// exact slug across all slug-bearing collections, stage 2 as an
    /// additional path, stage 3 as a final-segment slug restricted to the
    /// configured allow-list.
    async fn resolve_from_store(&self, key: &str, prefer_layout: bool) -> Option<Resolution> {
        let mut matches: Vec<PathTarget> = Vec::new();
        for collection in self.store.collections() {
            let Some(schema) = self.store.schema(&collection) else {
                continue;
            };
            if !schema.has_slug() {
                continue;
            }
            match self.store.find_by_slug(&collection, key, true).await {
                Ok(Some(entity)) => matches.push(PathTarget::primary(&entity)),
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(
                        collection = %collection,
                        error = %err,
                        "slug fallback query failed, continuing"
                    );
                }
            }
            if !schema.has_additional_paths() {
                continue;
            }
            match self.store.scan_published(&collection).await {
                Ok(entities) => {
                    for entity in &entities {
                        let registered = entity
                            .additional_paths
                            .iter()
                            .any(|entry| normalize_path(&entry.path) == key);
                        if registered
                            && !matches.iter().any(|t| t.document_id == entity.document_id)
                        {
                            matches.push(PathTarget::additional(entity));
                        }
                    }
                }
                Err(err) => {
                    tracing::debug!(
                        collection = %collection,
                        error = %err,
                        "additional-path fallback scan failed, continuing"
                    );
                }
            }
        }
        if matches.is_empty() {
            return self.fallback_slug_search(key).await;
        }
        Some(self.select(matches, prefer_layout))
    }

    /// Last resort: match the final path segment as a slug, in allow-list
    /// priority order.
    async fn fallback_slug_search(&self, key: &str) -> Option<Resolution> {
        let segment = final_segment(key)?;
        for collection in &self.config.fallback_collections {
            let Some(schema) = self.store.schema(collection) else {
                continue;
            };
            if !schema.has_slug() {
                continue;
            }
            match self.store.find_by_slug(collection, segment, true).await {
                Ok(Some(entity)) => {
                    let mut target = PathTarget::primary(&entity);
                    target.resolved_from = ResolvedFrom::FallbackSlug;
                    tracing::debug!(
                        collection = %collection,
                        slug = %segment,
                        "resolved via final-segment slug fallback"
                    );
                    return Some(Resolution::Single(target));
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(
                        collection = %collection,
                        error = %err,
                        "final-segment fallback query failed, continuing"
                    );
                }
            }
        }
        None
    }
}

impl std::fmt::Debug for PathRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PathRegistry")
            .field("stats", &self.stats())
            .finish()
    }
}

fn insert_target(table: &mut HashMap<String, PathSlot>, raw_path: &str, target: PathTarget) {
    let key = normalize_path(raw_path);
    if key.is_empty() {
        return;
    }
    match table.entry(key) {
        Entry::Occupied(mut occupied) => occupied.get_mut().push(target),
        Entry::Vacant(vacant) => {
            vacant.insert(PathSlot::Single(target));
        }
    }
}
