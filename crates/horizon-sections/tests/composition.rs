//! Tests for section composition, offsets and change delivery.

use horizon_sections::{
    Capabilities, ChangeSet, IndexPath, NodeId, Operation, SectionError, SectionMirror,
    SectionTree, TreeConfig, UpdateSink,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn composite_of(tree: &mut SectionTree<&'static str>, children: &[NodeId]) -> NodeId {
    let composite = tree.create_composite();
    for &child in children {
        tree.append_child(composite, child).unwrap();
    }
    composite
}

fn assert_mirrored(tree: &SectionTree<&'static str>, root: NodeId, mirror: &SectionMirror) {
    assert!(mirror.violations().is_empty(), "rejected: {:?}", mirror.violations());
    assert!(
        mirror.is_consistent_with(&tree.view(root)).unwrap(),
        "mirror {:?} disagrees with tree",
        mirror.counts()
    );
}

// =============================================================================
// Offsets
// =============================================================================

struct OffsetFixture {
    tree: SectionTree<&'static str>,
    global: NodeId,
    child2: NodeId,
    child2a: NodeId,
    child2d: NodeId,
    child2z: NodeId,
    child2e: NodeId,
}

fn offset_fixture() -> OffsetFixture {
    let mut tree = SectionTree::new();
    let leaves: Vec<NodeId> = (0..6).map(|_| tree.create_section(["row"])).collect();

    let child1 = composite_of(&mut tree, &leaves[0..2]);
    let child2a = composite_of(&mut tree, &leaves[2..4]);
    let child2d = leaves[4];
    let child2z = composite_of(&mut tree, &[]);
    let child2e = composite_of(&mut tree, &leaves[5..6]);
    let child2 = composite_of(&mut tree, &[child2a, child2d, child2z, child2e]);
    let global = composite_of(&mut tree, &[child1, child2]);

    OffsetFixture {
        tree,
        global,
        child2,
        child2a,
        child2d,
        child2z,
        child2e,
    }
}

#[test]
fn test_offsets_in_nested_composites() {
    init_tracing();
    let f = offset_fixture();
    let tree = &f.tree;

    assert_eq!(tree.number_of_sections(f.global).unwrap(), 6);
    assert_eq!(tree.mapping_len(f.global).unwrap(), 6);

    assert_eq!(tree.offset_of(f.global, f.child2).unwrap(), Some(2));
    assert_eq!(tree.offset_of(f.global, f.child2a).unwrap(), Some(2));
    assert_eq!(tree.offset_of(f.global, f.child2d).unwrap(), Some(4));
    assert_eq!(tree.offset_of(f.global, f.child2z).unwrap(), Some(5));
    assert_eq!(tree.offset_of(f.global, f.child2e).unwrap(), Some(5));

    assert_eq!(tree.offset_of(f.child2, f.child2a).unwrap(), Some(0));
    assert_eq!(tree.offset_of(f.child2, f.child2d).unwrap(), Some(2));
    assert_eq!(tree.offset_of(f.child2, f.child2z).unwrap(), Some(3));
    assert_eq!(tree.offset_of(f.child2, f.child2e).unwrap(), Some(3));
    assert_eq!(tree.mapping_len(f.child2).unwrap(), 4);
}

#[test]
fn test_round_trip_mapping() {
    let f = offset_fixture();
    let tree = &f.tree;
    let sections = tree.number_of_sections(f.global).unwrap();

    for global in 0..sections {
        let location = tree.locate(f.global, global).unwrap();
        let offset = tree.offset_of(f.global, location.child).unwrap().unwrap();
        assert_eq!(offset + location.local_section, global);
        assert_eq!(
            tree.global_section(f.global, location.leaf).unwrap(),
            Some(global)
        );
    }
}

#[test]
fn test_queries_are_idempotent() {
    let f = offset_fixture();
    let tree = &f.tree;
    let first: Vec<_> = [f.child2, f.child2a, f.child2z, f.child2e]
        .iter()
        .map(|&id| tree.offset_of(f.global, id).unwrap())
        .collect();
    for _ in 0..3 {
        assert_eq!(tree.number_of_sections(f.global).unwrap(), 6);
        let again: Vec<_> = [f.child2, f.child2a, f.child2z, f.child2e]
            .iter()
            .map(|&id| tree.offset_of(f.global, id).unwrap())
            .collect();
        assert_eq!(again, first);
    }
}

// =============================================================================
// Structural Mutation
// =============================================================================

struct Composed {
    tree: SectionTree<&'static str>,
    mirror: SectionMirror,
    list1: NodeId,
    list2: NodeId,
    list3: NodeId,
    sectioned: NodeId,
    countries: NodeId,
    segmented: NodeId,
    inner: NodeId,
    outer: NodeId,
}

fn composed() -> Composed {
    let mut tree = SectionTree::new();
    let list1 = tree.create_section(["one"]);
    let list2 = tree.create_section(["two"]);
    let list3 = tree.create_section(["a", "b", "c", "d"]);

    let first = tree.create_section(["one"]);
    let second = tree.create_section(["two"]);
    let sectioned = composite_of(&mut tree, &[first, second]);
    let countries = tree.create_section(["Norway", "Peru"]);

    let segmented = tree.create_segmented();
    let empty = tree.create_section([]);
    let listed = tree.create_section(["x", "y"]);
    tree.append_child(segmented, empty).unwrap();
    tree.append_child(segmented, listed).unwrap();
    tree.select(segmented, Some(1)).unwrap();

    let inner = composite_of(&mut tree, &[segmented, list3]);
    let trailing = tree.create_section([]);
    let outer = composite_of(&mut tree, &[sectioned, inner, countries, trailing]);

    let mirror = SectionMirror::new();
    tree.set_observer(outer, mirror.clone()).unwrap();

    Composed {
        tree,
        mirror,
        list1,
        list2,
        list3,
        sectioned,
        countries,
        segmented,
        inner,
        outer,
    }
}

#[test]
fn test_composed_counts() {
    let c = composed();
    let counts: Vec<usize> = [
        c.list1,
        c.list2,
        c.list3,
        c.sectioned,
        c.countries,
        c.segmented,
        c.inner,
        c.outer,
    ]
    .iter()
    .map(|&id| c.tree.number_of_sections(id).unwrap())
    .collect();
    assert_eq!(counts, vec![1, 1, 1, 2, 1, 1, 2, 6]);
    assert_eq!(c.mirror.counts(), vec![1, 1, 2, 4, 2, 0]);
}

#[test]
fn test_deselect_segment() {
    let mut c = composed();
    c.tree.select(c.segmented, None).unwrap();

    assert_eq!(c.tree.number_of_sections(c.segmented).unwrap(), 0);
    assert_eq!(c.tree.number_of_sections(c.inner).unwrap(), 1);
    assert_eq!(c.tree.number_of_sections(c.outer).unwrap(), 5);
    assert_mirrored(&c.tree, c.outer, &c.mirror);
}

#[test]
fn test_remove_segment_from_inner() {
    let mut c = composed();
    c.tree.remove_child(c.inner, c.segmented).unwrap();

    assert_eq!(c.tree.number_of_sections(c.inner).unwrap(), 1);
    assert_eq!(c.tree.number_of_sections(c.outer).unwrap(), 5);
    assert_eq!(c.tree.update_sink(c.segmented).unwrap(), UpdateSink::Detached);
    assert_mirrored(&c.tree, c.outer, &c.mirror);
}

#[test]
fn test_remove_all_from_inner() {
    let mut c = composed();
    let batches_before = c.mirror.batch_count();
    c.tree.remove_all(c.inner).unwrap();

    assert_eq!(c.tree.number_of_sections(c.inner).unwrap(), 0);
    assert_eq!(c.tree.number_of_sections(c.outer).unwrap(), 4);
    assert_eq!(c.mirror.batch_count(), batches_before + 1);
    assert_mirrored(&c.tree, c.outer, &c.mirror);
}

#[test]
fn test_insert_at_front_of_inner() {
    let mut c = composed();
    let fresh = c.tree.create_section(["new"]);
    c.tree.insert_child(c.inner, 0, fresh).unwrap();

    assert_eq!(c.tree.number_of_sections(c.inner).unwrap(), 3);
    assert_eq!(c.tree.number_of_sections(c.outer).unwrap(), 7);
    assert_eq!(c.tree.global_section(c.outer, fresh).unwrap(), Some(2));
    assert_mirrored(&c.tree, c.outer, &c.mirror);
}

#[test]
fn test_element_changes_reach_root_translated() {
    let mut c = composed();
    c.tree.append_element(c.list3, "e").unwrap();
    c.tree.remove_element(c.countries, 0).unwrap();
    c.tree.move_element(c.list3, 0, 4).unwrap();
    c.tree.update_element(c.list3, 1, "B").unwrap();

    assert_eq!(c.mirror.counts(), vec![1, 1, 2, 5, 1, 0]);
    assert_eq!(
        *c.tree.element(c.outer, IndexPath::new(3, 4)).unwrap(),
        "a"
    );
    assert_mirrored(&c.tree, c.outer, &c.mirror);
}

#[test]
fn test_move_child_emits_section_moves() {
    let mut c = composed();
    let committed = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = committed.clone();
    c.tree
        .signals()
        .changes_committed
        .connect(move |(_, changes)| sink.lock().push(changes.clone()));

    // sectioned (2 sections) moves behind countries.
    c.tree.move_child(c.outer, 0, 2).unwrap();
    assert_eq!(c.tree.offset_of(c.outer, c.sectioned).unwrap(), Some(3));
    assert_eq!(
        committed.lock()[0].moved_sections(),
        &[(0, 4), (0, 4)]
    );
    assert_eq!(c.mirror.counts(), vec![2, 4, 2, 1, 1, 0]);
    assert_mirrored(&c.tree, c.outer, &c.mirror);

    c.tree.move_child(c.outer, 3, 0).unwrap();
    assert_eq!(c.mirror.counts(), vec![0, 2, 4, 2, 1, 1]);
    assert_mirrored(&c.tree, c.outer, &c.mirror);
}

#[test]
fn test_destroy_attached_node_emits_removal() {
    let mut c = composed();
    c.tree.destroy(c.inner).unwrap();

    assert!(!c.tree.contains(c.list3));
    assert_eq!(c.tree.number_of_sections(c.outer).unwrap(), 4);
    assert_mirrored(&c.tree, c.outer, &c.mirror);
}

#[test]
fn test_detached_subtree_can_be_reattached() {
    let mut c = composed();
    c.tree.remove_child(c.outer, c.inner).unwrap();
    c.tree.append_element(c.list3, "lost").unwrap();
    c.tree.append_child(c.outer, c.inner).unwrap();

    assert_eq!(c.tree.offset_of(c.outer, c.list3).unwrap(), Some(5));
    assert_eq!(c.tree.number_of_elements(c.outer, 5).unwrap(), 5);
    assert_mirrored(&c.tree, c.outer, &c.mirror);
}

// =============================================================================
// Batches
// =============================================================================

#[test]
fn test_batch_ordering_matters() {
    let mut tree = SectionTree::new();
    let root = tree.create_composite();
    let first = tree.create_section(["a", "b"]);
    let second = tree.create_section(["c", "d", "e"]);
    tree.append_child(root, first).unwrap();
    tree.append_child(root, second).unwrap();

    let mirror = SectionMirror::new();
    tree.set_observer(root, mirror.clone()).unwrap();
    assert_eq!(mirror.counts(), vec![2, 3]);

    let mut delivered = ChangeSet::new();
    tree.perform_batch_updates(
        root,
        |tree| {
            tree.remove_child(root, first).unwrap();
            tree.append_element(second, "f").unwrap();
        },
        |changes| delivered = changes.clone(),
    )
    .unwrap();

    assert_eq!(
        delivered.operations(),
        vec![
            Operation::RemoveSection(0),
            Operation::InsertItem(IndexPath::new(0, 3)),
        ]
    );
    assert_eq!(mirror.counts(), vec![4]);
    assert_mirrored(&tree, root, &mirror);

    // The same operations applied in reverse order corrupt the counts.
    let reversed = SectionMirror::with_counts(vec![2, 3]);
    for op in delivered.operations().into_iter().rev() {
        reversed.apply_operation(op, None);
    }
    assert_ne!(reversed.counts(), vec![4]);
    assert!(!reversed.violations().is_empty());
}

#[test]
fn test_batch_with_interleaved_changes_stays_consistent() {
    let mut c = composed();
    let extra = c.tree.create_section(["z"]);
    c.tree
        .perform_batch_updates(
            c.outer,
            |tree| {
                tree.append_element(c.list3, "e").unwrap();
                tree.insert_child(c.inner, 1, extra).unwrap();
                tree.remove_element(c.list3, 0).unwrap();
                tree.remove_child(c.outer, c.sectioned).unwrap();
                tree.select(c.segmented, Some(0)).unwrap();
                tree.append_element(extra, "zz").unwrap();
                tree.insert_element(c.countries, 0, "Chile").unwrap();
            },
            |changes| assert!(changes.has_incremental_changes()),
        )
        .unwrap();

    assert_mirrored(&c.tree, c.outer, &c.mirror);
}

#[test]
fn test_reload_threshold_from_config() {
    let config = TreeConfig::from_toml_str("reload_threshold = 2").unwrap();
    let mut tree = SectionTree::with_config(config);
    let root = tree.create_composite();
    let mirror = SectionMirror::new();
    tree.set_observer(root, mirror.clone()).unwrap();

    tree.perform_batch_updates(
        root,
        |tree| {
            for name in ["a", "b", "c"] {
                let leaf = tree.create_section([name]);
                tree.append_child(root, leaf).unwrap();
            }
        },
        |changes| assert!(!changes.has_incremental_changes()),
    )
    .unwrap();

    assert_eq!(mirror.reload_count(), 2);
    assert_eq!(mirror.counts(), vec![1, 1, 1]);
}

#[test]
fn test_batch_root_cannot_be_attached() {
    let mut tree: SectionTree<&'static str> = SectionTree::new();
    let root = tree.create_composite();
    let other = tree.create_composite();
    let result = tree
        .perform_batch_updates(root, |tree| tree.append_child(other, root), |_| {})
        .unwrap();
    assert_eq!(result, Err(SectionError::BatchInProgress { root }));
}

#[test]
fn test_observer_attached_inside_batch_sees_final_state() {
    let mut tree = SectionTree::new();
    let root = tree.create_composite();
    let mirror = SectionMirror::new();

    tree.perform_batch_updates(
        root,
        |tree| {
            let first = tree.create_section(["a"]);
            tree.append_child(root, first).unwrap();
            tree.set_observer(root, mirror.clone()).unwrap();
            let second = tree.create_section(["b", "c"]);
            tree.append_child(root, second).unwrap();
        },
        |changes| assert!(!changes.has_incremental_changes()),
    )
    .unwrap();

    assert_mirrored(&tree, root, &mirror);
    assert_eq!(mirror.counts(), vec![1, 2]);
    assert_eq!(mirror.reload_count(), 1);
    assert_eq!(mirror.batch_count(), 1);

    let leaf = tree.children(root).unwrap()[0];
    tree.append_element(leaf, "d").unwrap();
    assert_mirrored(&tree, root, &mirror);
    assert_eq!(mirror.counts(), vec![2, 2]);
}

// =============================================================================
// Errors and Capabilities
// =============================================================================

#[test]
fn test_error_cases() {
    let mut tree = SectionTree::new();
    let root = tree.create_composite();
    let first = tree.create_section(["a"]);
    let second = tree.create_section(["b"]);
    let stray = tree.create_section(["c"]);
    tree.append_child(root, first).unwrap();
    tree.append_child(root, second).unwrap();

    assert_eq!(
        tree.append_child(root, first),
        Err(SectionError::DuplicateChild { child: first })
    );
    assert_eq!(
        tree.remove_child(root, stray),
        Err(SectionError::ChildNotFound {
            parent: root,
            child: stray
        })
    );
    assert_eq!(
        tree.number_of_elements(root, 99),
        Err(SectionError::IndexOutOfRange { index: 99, len: 2 })
    );

    tree.destroy(stray).unwrap();
    assert_eq!(
        tree.append_child(root, stray),
        Err(SectionError::InvalidNode(stray))
    );
}

#[test]
fn test_capability_lookup_by_global_section() {
    let mut c = composed();
    c.tree
        .set_capabilities(c.inner, Capabilities::REORDERING)
        .unwrap();
    c.tree
        .set_capabilities(c.countries, Capabilities::EDITING | Capabilities::HEADER)
        .unwrap();

    assert_eq!(
        c.tree.responder(c.outer, 3, Capabilities::REORDERING).unwrap(),
        Some(c.inner)
    );
    assert_eq!(
        c.tree.responder(c.outer, 4, Capabilities::HEADER).unwrap(),
        Some(c.countries)
    );
    assert_eq!(
        c.tree
            .nodes_with_capability(c.outer, Capabilities::EDITING)
            .unwrap(),
        vec![c.countries]
    );
}
