use navtree_core::prelude::*;
use navtree_core::Indicator;
use navtree_model::{NodeId, Portal};
use navtree_test_utils::{portal_store, FailingStore, TreeBuilder, ROOT};
use pretty_assertions::assert_eq;

fn engine(store: Arc<MemoryTreeStore>) -> NavigationTree {
    NavigationTree::builder(store.clone(), store).build().unwrap()
}

fn everyone() -> AccessContext {
    AccessContext::new("editor").allow("main").allow("internal")
}

fn names(result: &RenderResult) -> Vec<String> {
    result.ids().iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn test_excluded_portal_subtree_is_not_rendered() {
    let tree = engine(portal_store());
    let access = AccessContext::new("editor").allow("main");

    let result = tree.render(&RenderRequest::new(ROOT, access)).await.unwrap();

    let ids = names(&result);
    assert!(ids.contains(&"home".to_string()));
    assert!(!ids.contains(&"intranet".to_string()));
    assert!(!ids.contains(&"hr".to_string()));
}

#[tokio::test]
async fn test_empty_allowed_set_hides_every_portal() {
    let tree = engine(portal_store());
    let result = tree
        .render(&RenderRequest::new(ROOT, AccessContext::new("nobody")))
        .await
        .unwrap();
    assert_eq!(names(&result), vec![ROOT.to_string()]);
    assert_eq!(result.node_count, 1);
}

#[tokio::test]
async fn test_lazy_placeholder_beyond_cutoff() {
    let tree = engine(portal_store());

    let result = tree.render(&RenderRequest::new(ROOT, everyone())).await.unwrap();

    let people = result.find(&"people".into()).unwrap();
    assert_eq!(people.depth, 4);
    assert!(!people.open);
    let placeholder = people.placeholder().unwrap();
    assert_eq!(placeholder.parent_id, NodeId::from("people"));
    assert_eq!(placeholder.tree_table, "cms_tree");
    assert!(result.find(&"alice".into()).is_none());

    let team = result.find(&"team".into()).unwrap();
    assert_eq!(team.expanded_children().len(), 1);
    assert_eq!(result.placeholders().len(), 1);
}

#[tokio::test]
async fn test_open_state_expands_past_cutoff() {
    let tree = engine(portal_store());
    let request = RenderRequest::new(ROOT, everyone()).with_open_state(OpenState::from_cookie("nodeteam,nodepeople"));

    let result = tree.render(&request).await.unwrap();

    assert!(result.find(&"people".into()).unwrap().open);
    assert!(result.find(&"alice".into()).is_some());
    assert!(result.placeholders().is_empty());
}

#[tokio::test]
async fn test_many_portals_lower_the_cutoff() {
    let store = portal_store();
    let mut portals = store.snapshot().portals;
    portals.push(Portal::new("third", "x3"));
    portals.push(Portal::new("fourth", "x4"));
    store.set_portals(portals);
    let tree = engine(store);

    let result = tree.render(&RenderRequest::new(ROOT, everyone())).await.unwrap();

    let team = result.find(&"team".into()).unwrap();
    assert_eq!(team.depth, 3);
    assert!(team.placeholder().is_some());
    assert!(result.find(&"people".into()).is_none());
}

#[tokio::test]
async fn test_disallowing_ajax_renders_everything() {
    let tree = engine(portal_store());
    let request = RenderRequest::new(ROOT, everyone()).with_allow_ajax(false);

    let result = tree.render(&request).await.unwrap();

    assert!(result.placeholders().is_empty());
    assert!(result.find(&"alice".into()).is_some());
    assert_eq!(result.node_count, 9);
}

#[tokio::test]
async fn test_node_count_matches_rendered_nodes() {
    let tree = engine(portal_store());
    for request in [
        RenderRequest::new(ROOT, everyone()),
        RenderRequest::new(ROOT, everyone()).with_allow_ajax(false),
        RenderRequest::new("home", everyone()),
        RenderRequest::new(ROOT, AccessContext::new("editor").allow("internal")),
    ] {
        let result = tree.render(&request).await.unwrap();
        assert_eq!(result.node_count, result.ids().len(), "{:?}", request.root_id);
    }
}

#[tokio::test]
async fn test_root_flags_and_depths() {
    let tree = engine(portal_store());
    let result = tree.render(&RenderRequest::new(ROOT, everyone())).await.unwrap();

    let root = &result.nodes[0];
    assert!(root.is_root);
    assert!(root.open);
    assert_eq!(root.depth, 0);

    let home = result.find(&"home".into()).unwrap();
    assert!(!home.is_root);
    assert!(home.flags.restricted);
    assert!(result.find(&"about".into()).unwrap().flags.restricted);
    assert!(!result.find(&"news".into()).unwrap().flags.restricted);
}

#[tokio::test]
async fn test_connected_page_classification() {
    let tree = engine(portal_store());
    let request = RenderRequest::new(ROOT, everyone()).with_selected_page("page-news");

    let result = tree.render(&request).await.unwrap();

    let news = result.find(&"news".into()).unwrap();
    assert!(news.flags.active_connected);
    assert!(news.flags.other_connected);
    assert_eq!(news.primary_page.as_ref().map(ToString::to_string), Some("page-news".to_string()));
    assert_eq!(news.indicators, vec![Indicator::Hidden, Indicator::Lock]);
    assert_eq!(news.external_id.map(|e| e.0), Some(42));

    let about = result.find(&"about".into()).unwrap();
    assert!(!about.flags.active_connected);
    assert!(!about.flags.other_connected);
}

#[tokio::test]
async fn test_render_subtree_resolves_placeholder() {
    let tree = engine(portal_store());
    let full = tree.render(&RenderRequest::new(ROOT, everyone())).await.unwrap();
    let placeholder = full.placeholders()[0].clone();

    let sub = tree
        .render_subtree(&placeholder.parent_id, &everyone(), placeholder.selected_page.as_ref())
        .await
        .unwrap();

    assert_eq!(names(&sub), vec!["alice".to_string()]);
    assert_eq!(sub.nodes[0].depth, 0);
    assert!(!sub.nodes[0].is_root);
    assert_eq!(sub.node_count, 1);
}

#[tokio::test]
async fn test_render_subtree_children_expand_their_own_children() {
    let store = TreeBuilder::new()
        .group(ROOT, &["a"])
        .group("a", &["b"])
        .group("b", &["c"])
        .build();
    let tree = engine(store);

    let sub = tree
        .render_subtree(&"a".into(), &AccessContext::new("u"), None)
        .await
        .unwrap();

    assert_eq!(names(&sub), vec!["b".to_string(), "c".to_string()]);
}

#[tokio::test]
async fn test_child_fetch_failure_degrades_to_partial_tree() {
    let store = FailingStore::new(portal_store());
    store.fail_children_of("about");
    let store = Arc::new(store);
    let tree = NavigationTree::builder(store.clone(), store).build().unwrap();

    let result = tree.render(&RenderRequest::new(ROOT, everyone())).await.unwrap();

    assert!(result.incomplete);
    let about = result.find(&"about".into()).unwrap();
    assert!(about.expanded_children().is_empty());
    assert!(result.find(&"news".into()).is_some());
    assert_eq!(result.node_count, result.ids().len());
}

#[tokio::test]
async fn test_missing_root_is_an_error() {
    let tree = engine(portal_store());
    let err = tree
        .render(&RenderRequest::new("ghost", everyone()))
        .await
        .unwrap_err();
    assert!(matches!(err, TreeError::NotFound(_)));

    let err = tree
        .render_subtree(&"ghost".into(), &everyone(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TreeError::NotFound(_)));
}

#[tokio::test]
async fn test_enforced_policy_rejects_root_in_excluded_portal() {
    let store = portal_store();
    let tree = NavigationTree::builder(store.clone(), store)
        .config(NavTreeConfig::default().with_permission_policy(PermissionPolicy::Enforced))
        .build()
        .unwrap();
    let access = AccessContext::new("editor").allow("main");

    let err = tree.render(&RenderRequest::new("hr", access.clone())).await.unwrap_err();
    assert!(matches!(err, TreeError::PermissionDenied { .. }));
    assert!(tree.render(&RenderRequest::new("about", access)).await.is_ok());
}

#[tokio::test]
async fn test_fragment_is_cached_until_tree_changes() {
    let tree = engine(portal_store());
    let root = NodeId::from(ROOT);

    let first = tree.render_fragment(&root, &everyone(), None, false).await.unwrap();
    let second = tree.render_fragment(&root, &everyone(), None, false).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let other_user = AccessContext::new("other").allow("main").allow("internal");
    let third = tree.render_fragment(&root, &other_user, None, false).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &third));

    assert!(tree.move_node(&MoveRequest::new("news", "home", 0)).await.success);
    let after_move = tree.render_fragment(&root, &everyone(), None, false).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &after_move));
    assert_eq!(after_move.find(&"home".into()).unwrap().expanded_children()[0].id, NodeId::from("news"));
}

#[tokio::test]
async fn test_fragments_differ_by_allowed_portals() {
    let tree = engine(portal_store());
    let root = NodeId::from(ROOT);
    let both = AccessContext::default().allow("main").allow("internal");
    let main_only = AccessContext::default().allow("main");

    let wide = tree.render_fragment(&root, &both, None, false).await.unwrap();
    let narrow = tree.render_fragment(&root, &main_only, None, false).await.unwrap();

    assert!(wide.find(&"intranet".into()).is_some());
    assert!(narrow.find(&"intranet".into()).is_none());
    let direct = tree.render(&RenderRequest::new(ROOT, main_only)).await.unwrap();
    assert_eq!(narrow.ids(), direct.ids());
}

#[tokio::test]
async fn test_unenforced_entry_node_in_excluded_portal_renders_descendants() {
    let tree = engine(portal_store());
    let access = AccessContext::new("editor").allow("main");

    let result = tree.render(&RenderRequest::new("intranet", access.clone())).await.unwrap();
    assert!(result.find(&"hr".into()).is_some());

    let sub = tree.render_subtree(&"intranet".into(), &access, None).await.unwrap();
    assert_eq!(names(&sub), vec!["hr".to_string()]);
}

#[tokio::test]
async fn test_enforced_policy_rejects_subtree_in_excluded_portal() {
    let store = portal_store();
    let tree = NavigationTree::builder(store.clone(), store)
        .config(NavTreeConfig::default().with_permission_policy(PermissionPolicy::Enforced))
        .build()
        .unwrap();
    let access = AccessContext::new("editor").allow("main");

    let err = tree.render_subtree(&"intranet".into(), &access, None).await.unwrap_err();
    assert!(matches!(err, TreeError::PermissionDenied { .. }));
    assert!(tree.render_subtree(&"about".into(), &access, None).await.is_ok());
}
