//! Ancestor-chain and subtree traversal over the self-referential relation.
//!
//! Every walk here is a bounded graph walk: start node, move to parent or
//! children, stop when the relation runs out or the depth/iteration budget
//! is exhausted. Walks re-fetch nodes from the store at each hop rather
//! than expanding a snapshot, so a concurrent edit can surface mid-walk;
//! that interleaving is accepted for read-mostly navigation.

use std::{collections::BTreeMap, future::Future, pin::Pin, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    config::WaypathConfig,
    entity::{Entity, EntityId},
    store::EntityStore,
};

/// One node of a materialized subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub entity: Entity,
    pub children: Vec<TreeNode>,
}

/// One lazily-loaded tree level entry. `has_children` comes from a shallow
/// existence check so a UI can decide whether to render an expander without
/// materializing the level below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildNode {
    pub entity: Entity,
    pub has_children: bool,
}

#[derive(Clone)]
pub struct TreeQuery {
    store: Arc<dyn EntityStore>,
    config: WaypathConfig,
}

impl TreeQuery {
    pub fn new(store: Arc<dyn EntityStore>, config: WaypathConfig) -> Self {
        TreeQuery { store, config }
    }

    /// Ordered chain root→leaf for the entity with this slug. `None` when
    /// the slug has no entity. Each hop re-fetches the parent by id, and
    /// the walk stops early at the depth bound or on a lookup failure,
    /// returning the partial chain gathered so far.
    pub async fn ancestor_chain(&self, collection: &str, slug: &str) -> Option<Vec<Entity>> {
        let mut node = self
            .store
            .find_by_slug(collection, slug, false)
            .await
            .unwrap_or_else(|err| {
                tracing::debug!(collection, error = %err, "starting-slug lookup failed");
                None
            })?;
        let mut chain: Vec<Entity> = Vec::new();
        loop {
            let parent = node.parent;
            chain.push(node);
            let Some(parent_id) = parent else {
                break;
            };
            if chain.len() as u32 >= self.config.max_ancestor_depth {
                tracing::warn!(
                    collection,
                    depth = chain.len(),
                    "ancestor chain hit depth bound, returning partial chain"
                );
                break;
            }
            match self.store.find_by_id(collection, parent_id).await {
                Ok(Some(parent_node)) => node = parent_node,
                Ok(None) => {
                    tracing::debug!(collection, ancestor = %parent_id, "ancestor missing");
                    break;
                }
                Err(err) => {
                    tracing::warn!(
                        collection,
                        ancestor = %parent_id,
                        error = %err,
                        "ancestor lookup failed, returning partial chain"
                    );
                    break;
                }
            }
        }
        chain.reverse();
        Some(chain)
    }

    /// Published children of the entity with this slug, ordered by the
    /// collection's display label. `None` when the slug has no published
    /// entity.
    pub async fn direct_children(&self, collection: &str, slug: &str) -> Option<Vec<Entity>> {
        let parent = self
            .store
            .find_by_slug(collection, slug, true)
            .await
            .unwrap_or_else(|err| {
                tracing::debug!(collection, error = %err, "parent lookup failed");
                None
            })?;
        let mut children = self.fetch_children(collection, parent.id).await;
        self.sort_by_label(collection, &mut children);
        Some(children)
    }

    /// Materialize the subtree rooted at this slug, each level filtered to
    /// published entities and ordered by label. `max_depth` counts levels
    /// below the root; `None` leaves depth unbounded, but the iteration
    /// budget (`max_subtree_nodes`) always applies.
    pub async fn subtree(
        &self,
        collection: &str,
        slug: &str,
        max_depth: Option<u32>,
    ) -> Option<TreeNode> {
        let root = self
            .store
            .find_by_slug(collection, slug, false)
            .await
            .unwrap_or_else(|err| {
                tracing::debug!(collection, error = %err, "subtree root lookup failed");
                None
            })?;
        let mut budget = self.config.max_subtree_nodes;
        let children = self
            .expand(collection, root.id, 1, max_depth, &mut budget)
            .await;
        Some(TreeNode {
            entity: root,
            children,
        })
    }

    /// Published children of `parent` with `has_children` flags, for
    /// incremental UI loading.
    pub async fn lazy_children(&self, collection: &str, parent: EntityId) -> Vec<ChildNode> {
        let mut children = self.fetch_children(collection, parent).await;
        self.sort_by_label(collection, &mut children);
        let mut nodes = Vec::with_capacity(children.len());
        for child in children {
            let has_children = self
                .store
                .has_children(collection, child.id)
                .await
                .unwrap_or_else(|err| {
                    tracing::debug!(collection, error = %err, "child existence check failed");
                    false
                });
            nodes.push(ChildNode {
                entity: child,
                has_children,
            });
        }
        nodes
    }

    /// Root nodes of the collection with `has_children` flags, computed
    /// from a single scan.
    pub async fn lazy_roots(&self, collection: &str) -> Vec<ChildNode> {
        let entities = match self.store.scan_published(collection).await {
            Ok(entities) => entities,
            Err(err) => {
                tracing::warn!(collection, error = %err, "root scan failed");
                return Vec::new();
            }
        };
        let parent_ids: std::collections::BTreeSet<EntityId> =
            entities.iter().filter_map(|e| e.parent).collect();
        let mut roots: Vec<Entity> = entities.into_iter().filter(|e| e.parent.is_none()).collect();
        self.sort_by_label(collection, &mut roots);
        roots
            .into_iter()
            .map(|entity| {
                let has_children = parent_ids.contains(&entity.id);
                ChildNode {
                    entity,
                    has_children,
                }
            })
            .collect()
    }

    /// Whole-collection forest in two passes over one scan. Nodes whose
    /// parent is absent from the scan (unpublished or deleted) are adopted
    /// as roots rather than dropped, matching what an admin tree should
    /// show. Children are sorted by label at every level.
    pub async fn forest(&self, collection: &str) -> Vec<TreeNode> {
        let entities = match self.store.scan_published(collection).await {
            Ok(entities) => entities,
            Err(err) => {
                tracing::warn!(collection, error = %err, "forest scan failed");
                return Vec::new();
            }
        };
        let known: std::collections::BTreeSet<EntityId> =
            entities.iter().map(|e| e.id).collect();
        let mut by_parent: BTreeMap<EntityId, Vec<Entity>> = BTreeMap::new();
        let mut roots: Vec<Entity> = Vec::new();
        for entity in entities {
            match entity.parent {
                Some(parent) if known.contains(&parent) => {
                    by_parent.entry(parent).or_default().push(entity);
                }
                _ => roots.push(entity),
            }
        }
        self.sort_by_label(collection, &mut roots);
        roots
            .into_iter()
            .map(|root| self.attach(collection, root, &mut by_parent))
            .collect()
    }

    fn attach(
        &self,
        collection: &str,
        entity: Entity,
        by_parent: &mut BTreeMap<EntityId, Vec<Entity>>,
    ) -> TreeNode {
        let mut direct = by_parent.remove(&entity.id).unwrap_or_default();
        self.sort_by_label(collection, &mut direct);
        let children = direct
            .into_iter()
            .map(|child| self.attach(collection, child, by_parent))
            .collect();
        TreeNode { entity, children }
    }

    fn expand<'a>(
        &'a self,
        collection: &'a str,
        parent: EntityId,
        depth: u32,
        max_depth: Option<u32>,
        budget: &'a mut u32,
    ) -> Pin<Box<dyn Future<Output = Vec<TreeNode>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(limit) = max_depth {
                if depth > limit {
                    return Vec::new();
                }
            }
            let mut children = self.fetch_children(collection, parent).await;
            self.sort_by_label(collection, &mut children);
            let mut nodes = Vec::with_capacity(children.len());
            for child in children {
                if *budget == 0 {
                    tracing::warn!(
                        collection,
                        "subtree iteration budget exhausted, truncating walk"
                    );
                    break;
                }
                *budget -= 1;
                let grandchildren = self
                    .expand(collection, child.id, depth + 1, max_depth, budget)
                    .await;
                nodes.push(TreeNode {
                    entity: child,
                    children: grandchildren,
                });
            }
            nodes
        })
    }

    async fn fetch_children(&self, collection: &str, parent: EntityId) -> Vec<Entity> {
        self.store
            .children_of(collection, parent)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(
                    collection,
                    parent = %parent,
                    error = %err,
                    "children query failed, treating level as empty"
                );
                Vec::new()
            })
    }

    fn sort_by_label(&self, collection: &str, entities: &mut [Entity]) {
        let label_field = self
            .store
            .schema(collection)
            .map(|schema| schema.label_field().to_string())
            .unwrap_or_else(|| "title".to_string());
        entities.sort_by(|a, b| label_of(a, &label_field).cmp(&label_of(b, &label_field)));
    }
}

impl std::fmt::Debug for TreeQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("TreeQuery")
            .field("max_subtree_nodes", &self.config.max_subtree_nodes)
            .finish()
    }
}

fn label_of(entity: &Entity, label_field: &str) -> String {
    let label = match label_field {
        "title" => entity.title.clone(),
        "slug" => Some(entity.slug.clone()),
        other => entity
            .extra
            .get(other)
            .and_then(|value| value.as_str())
            .map(str::to_string),
    };
    label.unwrap_or_else(|| entity.slug.clone())
}
