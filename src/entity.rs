//! Entity and schema types shared by every component.
//!
//! An [`Entity`] is one content record as the store hands it to us: a slug,
//! an optional self-referencing parent, the list of additional registered
//! paths, and a publication state. The schema types describe a collection's
//! shape well enough for the introspection this crate performs (does it
//! carry a slug? which field is the self-relation? how is that relation
//! physically stored?) without binding to any particular schema format.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};
use uuid::Uuid;

/// Store-assigned row identifier. Opaque and immutable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EntityId(pub u64);

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version-spanning identifier grouping the draft and published variants of
/// one logical record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        DocumentId(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        DocumentId::new()
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which variants of a record exist in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishedState {
    /// Draft variant only. Invisible to path resolution.
    Draft,
    /// Published variant only.
    Published,
    /// Draft and published variants both exist.
    Both,
}

impl PublishedState {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishedState::Published | PublishedState::Both)
    }
}

/// One additional registered URL for an entity. The generated default path
/// conventionally occupies position 0 of the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub path: String,
}

impl PathEntry {
    pub fn new(path: impl Into<String>) -> Self {
        PathEntry { path: path.into() }
    }
}

/// A content record participating in path resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub document_id: DocumentId,
    /// Collection this record belongs to.
    pub collection: String,
    /// Human-chosen path segment, unique within the collection.
    pub slug: String,
    pub title: Option<String>,
    /// Self-reference to another entity of the same collection, when the
    /// collection models a tree.
    pub parent: Option<EntityId>,
    pub additional_paths: Vec<PathEntry>,
    pub published: PublishedState,
    /// Layout discriminator used to tie-break colliding paths.
    pub layout: Option<String>,
    /// Collection-specific fields not modeled above (display labels and the
    /// like), carried opaquely.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Entity {
    pub fn is_published(&self) -> bool {
        self.published.is_published()
    }
}

/// Cardinality of a relation attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationArity {
    OneToOne,
    ManyToOne,
}

/// Just enough attribute typing for the introspection this crate does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Plain value field (text, number, date, ...).
    Scalar,
    /// Repeatable component field, e.g. the additional-paths list.
    Component,
    /// Relation towards `target`.
    Relation {
        target: String,
        arity: RelationArity,
    },
}

/// How a collection's self-relation is physically stored. Children lookups
/// go through the store either way; this only informs the store which query
/// shape to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParentLinkMode {
    /// Foreign-key column on the entity row.
    #[default]
    Column,
    /// Auxiliary join table of (child, parent) pairs.
    LinkTable,
}

/// Shape description of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub attributes: BTreeMap<String, FieldKind>,
    pub parent_link: ParentLinkMode,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>) -> Self {
        CollectionSchema {
            name: name.into(),
            attributes: BTreeMap::new(),
            parent_link: ParentLinkMode::default(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.attributes.insert(name.into(), kind);
        self
    }

    /// Convenience for the common slug + title + additional-paths shape.
    pub fn with_paths(self) -> Self {
        self.with_field("additional_paths", FieldKind::Component)
    }

    pub fn with_parent_link(mut self, mode: ParentLinkMode) -> Self {
        self.parent_link = mode;
        self
    }

    /// Declare the self-relation field (one-to-one towards this collection).
    pub fn with_parent_field(self, field: impl Into<String>) -> Self {
        let target = self.name.clone();
        self.with_field(
            field,
            FieldKind::Relation {
                target,
                arity: RelationArity::OneToOne,
            },
        )
    }

    /// Collections without a slug field never participate in path
    /// resolution.
    pub fn has_slug(&self) -> bool {
        self.attributes.contains_key("slug")
    }

    pub fn has_additional_paths(&self) -> bool {
        matches!(
            self.attributes.get("additional_paths"),
            Some(FieldKind::Component)
        )
    }

    /// First relation attribute pointing back at this collection with
    /// to-one cardinality, i.e. the parent field of a tree-shaped
    /// collection. Many-to-one qualifies alongside one-to-one: either way
    /// the entity holds a single pointer into its own collection, and which
    /// one a schema declares is a modeling choice about the reverse side,
    /// not about parenthood.
    pub fn self_relation_field(&self) -> Option<&str> {
        self.attributes.iter().find_map(|(name, kind)| match kind {
            FieldKind::Relation { target, arity }
                if target == &self.name
                    && matches!(arity, RelationArity::OneToOne | RelationArity::ManyToOne) =>
            {
                Some(name.as_str())
            }
            _ => None,
        })
    }

    /// Display field used to order tree levels: first of `title`, `name`,
    /// `label` present in the schema, falling back to the slug.
    pub fn label_field(&self) -> &str {
        ["title", "name", "label"]
            .into_iter()
            .find(|candidate| self.attributes.contains_key(*candidate))
            .unwrap_or("slug")
    }
}
