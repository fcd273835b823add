//! # waypath
//!
//! A hierarchical URL path resolution and consistency engine for content
//! entity trees.
//!
//! waypath maps public URL paths to content entities and keeps a derived
//! "default path" synchronized with a self-referential parent/child content
//! tree. It was built for the shape of data a headless CMS produces:
//! records with a `slug`, an optional parent pointing at the same
//! collection, and a list of additional registered URLs.
//!
//! ## Components
//!
//! - **[`registry::PathRegistry`]** — an in-memory O(1) map from normalized
//!   path to entity descriptor(s), rebuilt by scanning every slug-bearing
//!   collection, with duplicate detection, layout tie-breaking, and a
//!   store-backed fallback chain for cache misses.
//! - **[`default_path::DefaultPathGenerator`]** — derives the canonical
//!   `root/.../leaf` path from an entity's ancestor chain and maintains it
//!   at position 0 of the entity's additional-paths list.
//! - **[`tree::TreeQuery`]** — ancestor chains, direct children, bounded
//!   subtrees, and lazily-loaded levels with `has_children` flags.
//! - **[`coordinator::Coordinator`]** — reacts to create/update/delete
//!   notifications, reconciling the registry incrementally and cascading
//!   default-path recomputation to descendants when a slug changes.
//! - **[`store::EntityStore`]** — the async capability trait the engine
//!   consumes; back it with your ORM, or use [`store::MemoryStore`].
//!
//! The registry and default paths are *derived* state: rebuildable from the
//! store at any time, never authoritative, and deliberately allowed to lag
//! a committed write for a bounded window (the fallback chain answers
//! correctly in the gap).
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use waypath::{
//!     config::WaypathConfig,
//!     entity::CollectionSchema,
//!     registry::{PathRegistry, Resolution},
//!     store::{MemoryStore, NewEntity},
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let store = Arc::new(MemoryStore::new());
//!     store.register_collection(
//!         CollectionSchema::new("pages")
//!             .with_field("slug", waypath::entity::FieldKind::Scalar)
//!             .with_paths()
//!             .with_parent_field("parent"),
//!     );
//!     store.create("pages", NewEntity::slug("about-us"));
//!
//!     let registry = PathRegistry::new(store.clone(), WaypathConfig::default());
//!     registry.build().await;
//!
//!     match registry.resolve("/about-us/", true).await {
//!         Some(Resolution::Single(target)) => assert_eq!(target.slug, "about-us"),
//!         other => panic!("unexpected resolution: {other:?}"),
//!     }
//! }
//! ```
//!
//! ## Traversal discipline
//!
//! Parent cycles are not a valid domain state, but every walk in this crate
//! (ancestor chains, subtree expansion, descendant snapshots) carries a
//! depth or iteration budget and returns the partial result gathered when
//! the budget runs out, so an accidental cycle degrades instead of hanging.

pub mod config;
pub mod coordinator;
pub mod default_path;
pub mod entity;
pub mod error;
pub mod normalize;
pub mod registry;
pub mod store;
#[cfg(test)]
mod tests;
pub mod tree;

pub use error::*;
