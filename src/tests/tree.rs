use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;

use super::helpers::*;
use crate::{
    config::WaypathConfig,
    entity::{CollectionSchema, Entity, EntityId, PathEntry, PublishedState},
    error::WaypathError,
    store::{EntityStore, MemoryStore, NewEntity},
    tree::{TreeNode, TreeQuery},
};

fn tree(store: &Arc<MemoryStore>) -> TreeQuery {
    TreeQuery::new(store.clone(), test_config())
}

/// servizi (Servizi)
///   tributi (Tributi)
///   anagrafe (Anagrafe)
///     certificati (Certificati)
/// contatti (Contatti)
///
/// `tributi` is created before `anagrafe` so id order and label order
/// disagree.
fn comune_fixture(store: &Arc<MemoryStore>) -> (EntityId, EntityId) {
    let servizi = store.create("pages", NewEntity::slug("servizi").title("Servizi"));
    store.create(
        "pages",
        NewEntity::slug("tributi").title("Tributi").parent(servizi.id),
    );
    let anagrafe = store.create(
        "pages",
        NewEntity::slug("anagrafe").title("Anagrafe").parent(servizi.id),
    );
    store.create(
        "pages",
        NewEntity::slug("certificati")
            .title("Certificati")
            .parent(anagrafe.id),
    );
    store.create("pages", NewEntity::slug("contatti").title("Contatti"));
    (servizi.id, anagrafe.id)
}

fn slugs(entities: &[Entity]) -> Vec<&str> {
    entities.iter().map(|e| e.slug.as_str()).collect()
}

fn count_nodes(nodes: &[TreeNode]) -> usize {
    nodes
        .iter()
        .map(|node| 1 + count_nodes(&node.children))
        .sum()
}

#[test_log::test(tokio::test)]
async fn test_ancestor_chain_is_root_first() {
    let store = seeded_store();
    comune_fixture(&store);
    let tree = tree(&store);

    let chain = tree.ancestor_chain("pages", "certificati").await.unwrap();
    assert_eq!(slugs(&chain), vec!["servizi", "anagrafe", "certificati"]);
}

#[test_log::test(tokio::test)]
async fn test_ancestor_chain_unknown_slug() {
    let store = seeded_store();
    comune_fixture(&store);
    let tree = tree(&store);

    assert!(tree.ancestor_chain("pages", "inesistente").await.is_none());
}

#[test_log::test(tokio::test)]
async fn test_ancestor_chain_survives_parent_cycle() {
    let store = seeded_store();
    let a = store.create("pages", NewEntity::slug("a"));
    let b = store.create("pages", NewEntity::slug("b").parent(a.id));
    store.update("pages", a.id, |entity| entity.parent = Some(b.id));
    let tree = tree(&store);

    let chain = tree.ancestor_chain("pages", "a").await.unwrap();
    assert_eq!(chain.len() as u32, test_config().max_ancestor_depth);
}

#[test_log::test(tokio::test)]
async fn test_direct_children_sorted_by_label() {
    let store = seeded_store();
    comune_fixture(&store);
    let tree = tree(&store);

    let children = tree.direct_children("pages", "servizi").await.unwrap();
    assert_eq!(slugs(&children), vec!["anagrafe", "tributi"]);
}

#[test_log::test(tokio::test)]
async fn test_direct_children_excludes_drafts() {
    let store = seeded_store();
    let (servizi, _) = comune_fixture(&store);
    store.create(
        "pages",
        NewEntity::slug("bozza")
            .parent(servizi)
            .published(PublishedState::Draft),
    );
    let tree = tree(&store);

    let children = tree.direct_children("pages", "servizi").await.unwrap();
    assert_eq!(slugs(&children), vec!["anagrafe", "tributi"]);
}

#[test_log::test(tokio::test)]
async fn test_subtree_depth_limit() {
    let store = seeded_store();
    comune_fixture(&store);
    let tree = tree(&store);

    let shallow = tree.subtree("pages", "servizi", Some(1)).await.unwrap();
    assert_eq!(shallow.children.len(), 2);
    assert!(shallow.children.iter().all(|c| c.children.is_empty()));

    let full = tree.subtree("pages", "servizi", None).await.unwrap();
    let anagrafe = full
        .children
        .iter()
        .find(|c| c.entity.slug == "anagrafe")
        .unwrap();
    assert_eq!(slugs_of(&anagrafe.children), vec!["certificati"]);
}

#[test_log::test(tokio::test)]
async fn test_subtree_iteration_budget_truncates() {
    let store = seeded_store();
    comune_fixture(&store);
    let config = WaypathConfig {
        max_subtree_nodes: 2,
        ..test_config()
    };
    let tree = TreeQuery::new(store.clone(), config);

    let subtree = tree.subtree("pages", "servizi", None).await.unwrap();
    assert_eq!(count_nodes(&subtree.children), 2);
}

#[test_log::test(tokio::test)]
async fn test_lazy_children_flags() {
    let store = seeded_store();
    let (servizi, _) = comune_fixture(&store);
    let tree = tree(&store);

    let level = tree.lazy_children("pages", servizi).await;
    assert_eq!(level.len(), 2);
    assert_eq!(level[0].entity.slug, "anagrafe");
    assert!(level[0].has_children);
    assert_eq!(level[1].entity.slug, "tributi");
    assert!(!level[1].has_children);
}

#[test_log::test(tokio::test)]
async fn test_lazy_roots() {
    let store = seeded_store();
    comune_fixture(&store);
    let tree = tree(&store);

    let roots = tree.lazy_roots("pages").await;
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0].entity.slug, "contatti");
    assert!(!roots[0].has_children);
    assert_eq!(roots[1].entity.slug, "servizi");
    assert!(roots[1].has_children);
}

#[test_log::test(tokio::test)]
async fn test_forest_adopts_orphans_as_roots() {
    let store = seeded_store();
    comune_fixture(&store);
    let hidden = store.create(
        "pages",
        NewEntity::slug("nascosta").published(PublishedState::Draft),
    );
    store.create("pages", NewEntity::slug("adottata").title("Adottata").parent(hidden.id));
    let tree = tree(&store);

    let forest = tree.forest("pages").await;
    let roots: Vec<&str> = forest.iter().map(|n| n.entity.slug.as_str()).collect();
    assert_eq!(roots, vec!["adottata", "contatti", "servizi"]);

    let servizi = &forest[2];
    assert_eq!(servizi.children.len(), 2);
    let anagrafe = &servizi.children[0];
    assert_eq!(anagrafe.entity.slug, "anagrafe");
    assert_eq!(slugs_of(&anagrafe.children), vec!["certificati"]);
}

#[test_log::test(tokio::test)]
async fn test_link_table_collection_traversal() {
    let store = seeded_store();
    store.register_collection(docs_schema());
    let manuale = store.create("docs", NewEntity::slug("manuale").title("Manuale"));
    store.create(
        "docs",
        NewEntity::slug("capitolo-1")
            .title("Capitolo 1")
            .parent(manuale.id),
    );
    let tree = tree(&store);

    let children = tree.direct_children("docs", "manuale").await.unwrap();
    assert_eq!(slugs(&children), vec!["capitolo-1"]);

    let level = tree.lazy_children("docs", manuale.id).await;
    assert_eq!(level.len(), 1);
    assert!(!level[0].has_children);
}

#[test_log::test(tokio::test)]
async fn test_label_falls_back_to_slug() {
    let store = seeded_store();
    let root = store.create("pages", NewEntity::slug("radice"));
    // Neither child carries a title, so ordering falls back to slugs.
    store.create("pages", NewEntity::slug("zz").parent(root.id));
    store.create("pages", NewEntity::slug("aa").parent(root.id));
    let tree = tree(&store);

    let children = tree.direct_children("pages", "radice").await.unwrap();
    assert_eq!(slugs(&children), vec!["aa", "zz"]);
}

fn slugs_of(nodes: &[TreeNode]) -> Vec<&str> {
    nodes.iter().map(|n| n.entity.slug.as_str()).collect()
}

/// Delegating store that renames one `pages` entity the first time a walk
/// comes back for more data, simulating a writer racing a traversal.
struct RacingRenameStore {
    inner: Arc<MemoryStore>,
    rename: EntityId,
    new_slug: String,
    fired: AtomicBool,
}

impl RacingRenameStore {
    fn new(inner: Arc<MemoryStore>, rename: EntityId, new_slug: &str) -> Self {
        RacingRenameStore {
            inner,
            rename,
            new_slug: new_slug.to_string(),
            fired: AtomicBool::new(false),
        }
    }

    fn fire(&self) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            let new_slug = self.new_slug.clone();
            self.inner.update("pages", self.rename, move |e| e.slug = new_slug);
        }
    }
}

#[async_trait]
impl EntityStore for RacingRenameStore {
    fn collections(&self) -> Vec<String> {
        self.inner.collections()
    }

    fn schema(&self, collection: &str) -> Option<CollectionSchema> {
        self.inner.schema(collection)
    }

    async fn scan_published(&self, collection: &str) -> Result<Vec<Entity>, WaypathError> {
        self.inner.scan_published(collection).await
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: EntityId,
    ) -> Result<Option<Entity>, WaypathError> {
        self.fire();
        self.inner.find_by_id(collection, id).await
    }

    async fn find_by_slug(
        &self,
        collection: &str,
        slug: &str,
        published_only: bool,
    ) -> Result<Option<Entity>, WaypathError> {
        self.inner.find_by_slug(collection, slug, published_only).await
    }

    async fn children_of(
        &self,
        collection: &str,
        parent: EntityId,
    ) -> Result<Vec<Entity>, WaypathError> {
        self.fire();
        self.inner.children_of(collection, parent).await
    }

    async fn has_children(
        &self,
        collection: &str,
        parent: EntityId,
    ) -> Result<bool, WaypathError> {
        self.inner.has_children(collection, parent).await
    }

    async fn update_additional_paths(
        &self,
        collection: &str,
        id: EntityId,
        paths: Vec<PathEntry>,
    ) -> Result<(), WaypathError> {
        self.inner.update_additional_paths(collection, id, paths).await
    }
}

// Walks re-fetch per hop instead of expanding a snapshot, so a write that
// lands mid-walk is visible in the hops fetched after it. The walk must
// complete and surface the interleaved state, never fail.
#[test_log::test(tokio::test)]
async fn test_ancestor_chain_surfaces_mid_walk_rename() {
    let store = seeded_store();
    let (servizi, _) = comune_fixture(&store);
    let racing = Arc::new(RacingRenameStore::new(
        store.clone(),
        servizi,
        "servizi-digitali",
    ));
    let tree = TreeQuery::new(racing, test_config());

    // The rename fires on the first ancestor hop, before the root is
    // fetched.
    let chain = tree.ancestor_chain("pages", "certificati").await.unwrap();
    assert_eq!(
        slugs(&chain),
        vec!["servizi-digitali", "anagrafe", "certificati"]
    );
}

#[test_log::test(tokio::test)]
async fn test_subtree_surfaces_mid_walk_rename() {
    let store = seeded_store();
    let (_, anagrafe) = comune_fixture(&store);
    let racing = Arc::new(RacingRenameStore::new(
        store.clone(),
        anagrafe,
        "anagrafe-rinominata",
    ));
    let tree = TreeQuery::new(racing, test_config());

    // The rename fires on the first level fetch, so every level reflects
    // the committed write.
    let subtree = tree.subtree("pages", "servizi", None).await.unwrap();
    assert_eq!(
        slugs_of(&subtree.children),
        vec!["anagrafe-rinominata", "tributi"]
    );
}

#[test_log::test(tokio::test)]
async fn test_forest_over_link_table_collection() {
    let store = seeded_store();
    store.register_collection(docs_schema());
    let manuale = store.create("docs", NewEntity::slug("manuale").title("Manuale"));
    store.create(
        "docs",
        NewEntity::slug("capitolo-1")
            .title("Capitolo 1")
            .parent(manuale.id),
    );
    let tree = tree(&store);

    // Scanned rows carry `parent` even under the link-table layout, so the
    // forest nests instead of flattening every node into a root.
    let forest = tree.forest("docs").await;
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].entity.slug, "manuale");
    assert_eq!(slugs_of(&forest[0].children), vec!["capitolo-1"]);
}
