//! Shared fixtures for the unit test suite.

use std::sync::Arc;

use crate::{
    config::WaypathConfig,
    coordinator::Coordinator,
    entity::{CollectionSchema, FieldKind, ParentLinkMode},
    registry::PathRegistry,
    store::MemoryStore,
};

/// Config used across the suite: layout tie-breaking on `static`, the
/// `news` collection allow-listed for the final-segment fallback.
pub fn test_config() -> WaypathConfig {
    WaypathConfig {
        fallback_collections: vec!["news".to_string()],
        ..WaypathConfig::default()
    }
}

/// Tree-shaped collection with slug, title, additional paths, and a
/// column-backed self-relation.
pub fn pages_schema() -> CollectionSchema {
    CollectionSchema::new("pages")
        .with_field("slug", FieldKind::Scalar)
        .with_field("title", FieldKind::Scalar)
        .with_paths()
        .with_parent_field("parent")
}

/// Flat collection: slug and title only, no tree, no additional paths.
pub fn news_schema() -> CollectionSchema {
    CollectionSchema::new("news")
        .with_field("slug", FieldKind::Scalar)
        .with_field("title", FieldKind::Scalar)
}

/// Same shape as `pages` but with the self-relation stored in a link table.
pub fn docs_schema() -> CollectionSchema {
    CollectionSchema::new("docs")
        .with_field("slug", FieldKind::Scalar)
        .with_field("title", FieldKind::Scalar)
        .with_paths()
        .with_parent_field("parent")
        .with_parent_link(ParentLinkMode::LinkTable)
}

pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.register_collection(pages_schema());
    store.register_collection(news_schema());
    store
}

/// Store, registry, and coordinator wired together the way an embedder
/// assembles them.
pub struct Engine {
    pub store: Arc<MemoryStore>,
    pub registry: Arc<PathRegistry>,
    pub coordinator: Coordinator,
}

pub fn engine(store: Arc<MemoryStore>) -> Engine {
    let config = test_config();
    let registry = Arc::new(PathRegistry::new(store.clone(), config.clone()));
    let coordinator = Coordinator::new(store.clone(), registry.clone(), config);
    Engine {
        store,
        registry,
        coordinator,
    }
}
