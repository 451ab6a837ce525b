use navtree_core::prelude::*;
use navtree_core::{MemoryRecoveryLog, ReplayCommand};
use navtree_model::{NodeId, SortField};
use navtree_store::StaticSchema;
use navtree_test_utils::{
    abc_store, all_groups_contiguous, child_names, portal_store, sibling_keys, unreachable_nodes,
    ConflictInjectingStore, TreeBuilder, YieldingStore, ROOT,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn engine(store: Arc<MemoryTreeStore>) -> NavigationTree {
    NavigationTree::builder(store.clone(), store).build().unwrap()
}

fn keys(pairs: &[(&str, u32)]) -> Vec<(String, u32)> {
    pairs.iter().map(|(id, k)| ((*id).to_string(), *k)).collect()
}

fn set(ids: &[&str]) -> BTreeSet<NodeId> {
    ids.iter().map(|id| NodeId::from(*id)).collect()
}

#[tokio::test]
async fn test_move_to_front_shifts_siblings() {
    let store = abc_store();
    let tree = engine(store.clone());

    let outcome = tree.move_node(&MoveRequest::new("c", "p", 0)).await;

    assert!(outcome.success);
    assert_eq!(sibling_keys(&store, "p"), keys(&[("c", 0), ("a", 1), ("b", 2)]));
    assert_eq!(outcome.affected, set(&["a", "b", "c"]));
}

#[tokio::test]
async fn test_move_to_middle_skips_slot() {
    let store = abc_store();
    let tree = engine(store.clone());

    let outcome = tree.move_node(&MoveRequest::new("a", "p", 1)).await;

    assert!(outcome.success);
    assert_eq!(sibling_keys(&store, "p"), keys(&[("b", 0), ("a", 1), ("c", 2)]));
    assert_eq!(outcome.affected, set(&["a", "b"]));
}

#[tokio::test]
async fn test_repeated_move_is_idempotent() {
    let store = abc_store();
    let tree = engine(store.clone());
    let request = MoveRequest::new("a", "p", 1);

    tree.move_node(&request).await;
    let after_first = sibling_keys(&store, "p");
    let version = store.group_version(&"p".into());

    let second = tree.move_node(&request).await;

    assert!(second.success);
    assert_eq!(second.affected, set(&["a"]));
    assert_eq!(sibling_keys(&store, "p"), after_first);
    assert_eq!(store.group_version(&"p".into()), version);
}

#[tokio::test]
async fn test_position_past_end_appends() {
    let store = abc_store();
    let tree = engine(store.clone());

    assert!(tree.move_node(&MoveRequest::new("a", "p", 99)).await.success);
    assert_eq!(sibling_keys(&store, "p"), keys(&[("b", 0), ("c", 1), ("a", 2)]));
}

#[tokio::test]
async fn test_reparent_compacts_source_group() {
    let store = TreeBuilder::new()
        .group(ROOT, &["p", "q"])
        .group("p", &["a", "b", "c"])
        .group("q", &["x", "y"])
        .build();
    let tree = engine(store.clone());

    let outcome = tree.move_node(&MoveRequest::new("b", "q", 1)).await;

    assert!(outcome.success);
    assert_eq!(sibling_keys(&store, "q"), keys(&[("x", 0), ("b", 1), ("y", 2)]));
    assert_eq!(sibling_keys(&store, "p"), keys(&[("a", 0), ("c", 1)]));
    assert_eq!(outcome.affected, set(&["b", "c", "y"]));
    assert_eq!(store.get(&"b".into()).unwrap().parent_id(), Some(&NodeId::from("q")));
}

#[tokio::test]
async fn test_rejects_move_below_own_descendant() {
    let store = abc_store();
    let tree = engine(store.clone());
    let version = store.group_version(&ROOT.into());

    let err = tree.try_move_node(&MoveRequest::new("p", "a", 0)).await.unwrap_err();
    assert!(matches!(err, TreeError::InvalidInput(_)));

    let err = tree.try_move_node(&MoveRequest::new("a", "a", 0)).await.unwrap_err();
    assert!(matches!(err, TreeError::InvalidInput(_)));

    assert_eq!(store.group_version(&ROOT.into()), version);
    assert_eq!(store.get(&"p".into()).unwrap().parent_id(), Some(&NodeId::from(ROOT)));
}

#[tokio::test]
async fn test_invalid_input_has_no_side_effects() {
    let store = abc_store();
    let log = Arc::new(MemoryRecoveryLog::new());
    let tree = NavigationTree::builder(store.clone(), store.clone())
        .recovery_log(log.clone())
        .build()
        .unwrap();
    let version = store.group_version(&"p".into());

    for request in [
        MoveRequest::from_raw(Some("undefined"), Some("p"), Some("0")),
        MoveRequest::from_raw(Some(""), Some("p"), Some("0")),
        MoveRequest::from_raw(Some("a"), None, Some("0")),
        MoveRequest::from_raw(Some("a"), Some("p"), None),
        MoveRequest::from_raw(Some("a"), Some("p"), Some("first")),
    ] {
        let outcome = tree.move_node(&request).await;
        assert!(!outcome.success, "{request:?} should fail");
        assert!(outcome.affected.is_empty());
    }

    assert_eq!(store.group_version(&"p".into()), version);
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_unknown_node_or_parent_is_not_found() {
    let store = abc_store();
    let tree = engine(store);

    let err = tree.try_move_node(&MoveRequest::new("ghost", "p", 0)).await.unwrap_err();
    assert!(matches!(err, TreeError::NotFound(ref id) if id.as_str() == "ghost"));

    let err = tree.try_move_node(&MoveRequest::new("a", "ghost", 0)).await.unwrap_err();
    assert!(matches!(err, TreeError::NotFound(ref id) if id.as_str() == "ghost"));
}

#[tokio::test]
async fn test_root_cannot_be_moved() {
    let store = abc_store();
    let tree = engine(store);
    let err = tree.try_move_node(&MoveRequest::new(ROOT, "p", 0)).await.unwrap_err();
    assert!(err.is_no_op());
}

#[tokio::test]
async fn test_conflict_is_retried_once() {
    let inner = abc_store();
    let store = Arc::new(ConflictInjectingStore::new(inner.clone(), 1));
    let tree = NavigationTree::builder(store.clone(), store.clone()).build().unwrap();

    let outcome = tree.move_node(&MoveRequest::new("c", "p", 0)).await;

    assert!(outcome.success);
    assert_eq!(store.commits(), 2);
    assert_eq!(sibling_keys(&inner, "p"), keys(&[("c", 0), ("a", 1), ("b", 2)]));
}

#[tokio::test]
async fn test_conflict_surfaces_after_retries() {
    let inner = abc_store();
    let store = Arc::new(ConflictInjectingStore::new(inner.clone(), 2));
    let tree = NavigationTree::builder(store.clone(), store.clone()).build().unwrap();

    let err = tree.try_move_node(&MoveRequest::new("c", "p", 0)).await.unwrap_err();

    assert!(matches!(err, TreeError::OrderingConflict { attempts: 2, .. }));
    assert!(err.is_retryable());
    assert_eq!(sibling_keys(&inner, "p"), keys(&[("a", 0), ("b", 1), ("c", 2)]));
}

#[tokio::test]
async fn test_more_retries_absorb_more_conflicts() {
    let inner = abc_store();
    let store = Arc::new(ConflictInjectingStore::new(inner.clone(), 2));
    let tree = NavigationTree::builder(store.clone(), store.clone())
        .config(NavTreeConfig::default().with_move_retries(2))
        .build()
        .unwrap();

    assert!(tree.move_node(&MoveRequest::new("c", "p", 0)).await.success);
    assert_eq!(store.commits(), 3);
}

#[tokio::test]
async fn test_enforced_policy_rejects_excluded_portal() {
    let store = portal_store();
    let access = AccessContext::new("editor").allow("main");

    let enforced = NavigationTree::builder(store.clone(), store.clone())
        .config(NavTreeConfig::default().with_permission_policy(PermissionPolicy::Enforced))
        .build()
        .unwrap();
    let request = MoveRequest::new("hr", "intranet", 0).with_access(access.clone());
    let err = enforced.try_move_node(&request).await.unwrap_err();
    assert!(matches!(err, TreeError::PermissionDenied { .. }));

    let into_excluded = MoveRequest::new("news", "intranet", 0).with_access(access.clone());
    assert!(!enforced.move_node(&into_excluded).await.success);

    let unenforced = engine(store.clone());
    assert!(unenforced.move_node(&request).await.success);
}

#[tokio::test]
async fn test_localized_sort_field_keeps_base_keys() {
    let store = abc_store();
    let schema = StaticSchema::new("en")
        .with_translated("cms_tree", "entry_sort")
        .with_base_locale("de");
    let tree = NavigationTree::builder(store.clone(), store.clone())
        .schema(Arc::new(schema))
        .build()
        .unwrap();

    assert!(tree.move_node(&MoveRequest::new("c", "p", 0)).await.success);

    let localized = SortField::Localized("en".into());
    let order: Vec<String> = store
        .ordered_child_ids(&"p".into(), &localized)
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(order, vec!["c", "a", "b"]);
    assert_eq!(sibling_keys(&store, "p"), keys(&[("a", 0), ("b", 1), ("c", 2)]));
}

#[tokio::test]
async fn test_move_appends_replay_command() {
    let store = abc_store();
    let log = Arc::new(MemoryRecoveryLog::new());
    let tree = NavigationTree::builder(store.clone(), store)
        .recovery_log(log.clone())
        .build()
        .unwrap();

    tree.move_node(&MoveRequest::new("c", "p", 0)).await;

    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert!(matches!(
        &entries[0].command,
        ReplayCommand::RebuildNestedSet { table, parent_field, sort_field }
            if table == "cms_tree" && parent_field == "parent_id" && sort_field == "entry_sort"
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_moves_on_one_group_stay_contiguous() {
    let store = TreeBuilder::new()
        .group(ROOT, &["p"])
        .group("p", &["a", "b", "c", "d", "e", "f"])
        .build();
    let tree = engine(store.clone());

    let mut handles = Vec::new();
    for (i, id) in ["a", "b", "c", "d", "e", "f"].into_iter().enumerate() {
        let tree = tree.clone();
        let position = u32::try_from(5 - i).unwrap();
        handles.push(tokio::spawn(async move {
            tree.move_node(&MoveRequest::new(id, "p", position)).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().success);
    }

    assert!(all_groups_contiguous(&store, &SortField::Base));
    assert_eq!(child_names(&store, "p").len(), 6);
}

#[tokio::test]
async fn test_crossing_reparents_cannot_create_a_cycle() {
    let inner = TreeBuilder::new().group(ROOT, &["p"]).group("p", &["a", "b"]).build();
    let store = Arc::new(YieldingStore::new(inner.clone()));
    let tree = NavigationTree::builder(store.clone(), store).build().unwrap();

    let move_a = MoveRequest::new("a", "b", 0);
    let move_b = MoveRequest::new("b", "a", 0);
    let (first, second) = tokio::join!(tree.move_node(&move_a), tree.move_node(&move_b));

    assert_ne!(first.success, second.success, "exactly one crossing move may win");
    assert_eq!(unreachable_nodes(&inner), Vec::<String>::new());
    assert!(all_groups_contiguous(&inner, &SortField::Base));
    let a_parent = inner.get(&"a".into()).unwrap().parent_id;
    let b_parent = inner.get(&"b".into()).unwrap().parent_id;
    assert!(a_parent == Some(NodeId::from("p")) || b_parent == Some(NodeId::from("p")));
}

#[tokio::test]
async fn test_reparent_below_node_moved_concurrently_is_rejected() {
    let inner = TreeBuilder::new()
        .group(ROOT, &["p", "q"])
        .group("p", &["a"])
        .group("q", &["b"])
        .build();
    let store = Arc::new(YieldingStore::new(inner.clone()));
    let tree = NavigationTree::builder(store.clone(), store).build().unwrap();

    let move_p = MoveRequest::new("p", "b", 0);
    let move_q = MoveRequest::new("q", "a", 0);
    let (into_b, into_a) = tokio::join!(tree.move_node(&move_p), tree.move_node(&move_q));

    assert_ne!(into_b.success, into_a.success);
    assert_eq!(unreachable_nodes(&inner), Vec::<String>::new());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_crossing_reparents_keep_tree_rooted() {
    let store = TreeBuilder::new()
        .group(ROOT, &["p", "q"])
        .group("p", &["a", "b", "c"])
        .group("q", &["d", "e"])
        .build();
    let tree = engine(store.clone());
    let moves = [
        ("a", "d", 0),
        ("d", "a", 0),
        ("p", "e", 1),
        ("q", "b", 0),
        ("b", "e", 0),
        ("e", "c", 2),
        ("c", "q", 1),
        ("q", "p", 0),
    ];

    for _ in 0..5 {
        let mut handles = Vec::new();
        for (node, parent, position) in moves {
            let tree = tree.clone();
            handles.push(tokio::spawn(async move {
                tree.move_node(&MoveRequest::new(node, parent, position)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(unreachable_nodes(&store), Vec::<String>::new());
        assert!(all_groups_contiguous(&store, &SortField::Base));
        assert!(tree.verify().await.unwrap().non_contiguous.is_empty());
    }
    assert_eq!(store.len(), 8);
}

const NODES: [&str; 7] = ["p", "q", "a", "b", "c", "d", "e"];
const PARENTS: [&str; 8] = [ROOT, "p", "q", "a", "b", "c", "d", "e"];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_groups_stay_contiguous(
        moves in proptest::collection::vec((0..NODES.len(), 0..PARENTS.len(), 0u32..8), 1..25)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let store = TreeBuilder::new()
            .group(ROOT, &["p", "q"])
            .group("p", &["a", "b", "c"])
            .group("q", &["d", "e"])
            .build();
        let tree = engine(store.clone());

        for (node, parent, position) in moves {
            let outcome = rt.block_on(tree.move_node(&MoveRequest::new(NODES[node], PARENTS[parent], position)));
            if outcome.success {
                prop_assert!(outcome.affected.contains(&NodeId::from(NODES[node])));
            }
            prop_assert!(all_groups_contiguous(&store, &SortField::Base));
        }
        prop_assert_eq!(store.len(), 1 + NODES.len());
        prop_assert!(unreachable_nodes(&store).is_empty());
    }
}
