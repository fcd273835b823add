//! The persistence seam.
//!
//! Everything this crate derives (the path registry, default paths, tree
//! views) is recomputed from an [`EntityStore`], never authoritative. The
//! trait is the complete list of capabilities the engine consumes: schema
//! introspection, bulk published scans, point lookups, relation-aware
//! children queries, and the single mutation used to persist computed
//! default paths. A production embedder backs it with their ORM;
//! [`MemoryStore`] backs it for tests and embedded use.

use async_trait::async_trait;

use crate::{
    entity::{CollectionSchema, Entity, EntityId, PathEntry},
    error::WaypathError,
};

pub mod memory;

pub use memory::{MemoryStore, NewEntity};

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Names of every collection the store holds. Synchronous: schema
    /// metadata is expected to be resident.
    fn collections(&self) -> Vec<String>;

    /// Shape description for one collection, or `None` when unknown.
    fn schema(&self, collection: &str) -> Option<CollectionSchema>;

    /// All published entities of a collection, additional paths populated.
    /// `Entity::parent` must also be populated on every returned row,
    /// whatever [`crate::entity::ParentLinkMode`] the collection uses:
    /// whole-collection tree builds derive parenthood from scanned rows
    /// without issuing per-node children queries.
    async fn scan_published(&self, collection: &str) -> Result<Vec<Entity>, WaypathError>;

    async fn find_by_id(
        &self,
        collection: &str,
        id: EntityId,
    ) -> Result<Option<Entity>, WaypathError>;

    /// Point lookup by slug. With `published_only`, draft-only records are
    /// invisible.
    async fn find_by_slug(
        &self,
        collection: &str,
        slug: &str,
        published_only: bool,
    ) -> Result<Option<Entity>, WaypathError>;

    /// Published children of `parent` via the collection's self-relation,
    /// whichever physical layout ([`crate::entity::ParentLinkMode`]) the
    /// relation uses.
    async fn children_of(
        &self,
        collection: &str,
        parent: EntityId,
    ) -> Result<Vec<Entity>, WaypathError>;

    /// Shallow existence check; cheaper than `children_of` when only the
    /// flag is needed.
    async fn has_children(
        &self,
        collection: &str,
        parent: EntityId,
    ) -> Result<bool, WaypathError>;

    /// Persist a recomputed additional-paths list. The one write this crate
    /// ever issues.
    async fn update_additional_paths(
        &self,
        collection: &str,
        id: EntityId,
        paths: Vec<PathEntry>,
    ) -> Result<(), WaypathError>;
}
