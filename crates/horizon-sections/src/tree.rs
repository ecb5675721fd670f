//! The section tree arena and its structural operations.
//!
//! A [`SectionTree`] owns every node of one family of providers. Leaf
//! sections hold elements; composites and segmented containers hold ordered
//! child handles. Every structural mutation follows the same three steps:
//! update the tree, invalidate the mapping caches on the path to the root,
//! then emit the delta, translated one hop at a time, towards the root.
//!
//! # Example
//!
//! ```
//! use horizon_sections::SectionTree;
//!
//! let mut tree = SectionTree::new();
//! let root = tree.create_composite();
//! let fruit = tree.create_section(["apple", "pear"]);
//! let veg = tree.create_section(["leek"]);
//!
//! tree.append_child(root, fruit).unwrap();
//! tree.append_child(root, veg).unwrap();
//!
//! assert_eq!(tree.number_of_sections(root).unwrap(), 2);
//! assert_eq!(tree.number_of_elements(root, 1).unwrap(), 1);
//! ```

use horizon_sections_core::logging::targets;
use horizon_sections_core::{Signal, TreeConfig};
use parking_lot::RwLock;
use slotmap::{SecondaryMap, SlotMap};

use crate::changeset::ChangeSet;
use crate::dispatch::PendingBatch;
use crate::error::{SectionError, SectionResult};
use crate::mapping::MappingCache;
use crate::node::{Node, NodeId, NodeKind, ProviderKind, UpdateSink};
use crate::observer::UpdateObserver;

/// Signals emitted by a [`SectionTree`].
///
/// Slots run synchronously, after the tree has been updated.
#[derive(Debug, Default)]
pub struct TreeSignals {
    /// A root-addressed change set was dispatched: `(root, changes)`.
    pub changes_committed: Signal<(NodeId, ChangeSet)>,
    /// A child was attached: `(parent, child)`.
    pub child_attached: Signal<(NodeId, NodeId)>,
    /// A child was detached: `(parent, child)`.
    pub child_detached: Signal<(NodeId, NodeId)>,
}

/// An arena of section providers composed into flat index spaces.
///
/// `T` is the element type held by leaf sections. The tree never inspects
/// elements.
pub struct SectionTree<T> {
    pub(crate) nodes: SlotMap<NodeId, Node<T>>,
    /// Mapping caches of container nodes, rebuilt lazily by queries.
    pub(crate) caches: RwLock<SecondaryMap<NodeId, MappingCache>>,
    pub(crate) observers: SecondaryMap<NodeId, Box<dyn UpdateObserver>>,
    pub(crate) batches: SecondaryMap<NodeId, PendingBatch>,
    pub(crate) signals: TreeSignals,
    pub(crate) config: TreeConfig,
}

impl<T> Default for SectionTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for SectionTree<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionTree")
            .field("nodes", &self.nodes.len())
            .field("observers", &self.observers.len())
            .field("open_batches", &self.batches.len())
            .field("config", &self.config)
            .finish()
    }
}

impl<T> SectionTree<T> {
    /// Creates an empty tree with the default configuration.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Creates an empty tree.
    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            caches: RwLock::new(SecondaryMap::new()),
            observers: SecondaryMap::new(),
            batches: SecondaryMap::new(),
            signals: TreeSignals::default(),
            config,
        }
    }

    /// The tree's configuration.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// The tree's signals.
    pub fn signals(&self) -> &TreeSignals {
        &self.signals
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the handle refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Every node without a parent, in arena order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates a detached leaf section holding `elements`.
    pub fn create_section(&mut self, elements: impl IntoIterator<Item = T>) -> NodeId {
        let id = self
            .nodes
            .insert(Node::new(NodeKind::Section(elements.into_iter().collect())));
        tracing::trace!(target: targets::TREE, ?id, "created section");
        id
    }

    /// Creates a detached, empty composite.
    pub fn create_composite(&mut self) -> NodeId {
        let id = self.nodes.insert(Node::new(NodeKind::Composite(Vec::new())));
        tracing::trace!(target: targets::TREE, ?id, "created composite");
        id
    }

    /// Creates a detached, empty segmented container with no selection.
    pub fn create_segmented(&mut self) -> NodeId {
        let id = self.nodes.insert(Node::new(NodeKind::Segmented {
            children: Vec::new(),
            selected: None,
        }));
        tracing::trace!(target: targets::TREE, ?id, "created segmented");
        id
    }

    // =========================================================================
    // Node Accessors
    // =========================================================================

    pub(crate) fn node(&self, id: NodeId) -> SectionResult<&Node<T>> {
        self.nodes.get(id).ok_or(SectionError::InvalidNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> SectionResult<&mut Node<T>> {
        self.nodes.get_mut(id).ok_or(SectionError::InvalidNode(id))
    }

    /// Sets the debug name of a node.
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> SectionResult<()> {
        self.node_mut(id)?.name = name.into();
        Ok(())
    }

    /// The debug name of a node; empty when unnamed.
    pub fn name(&self, id: NodeId) -> SectionResult<&str> {
        Ok(&self.node(id)?.name)
    }

    /// The kind of a node.
    pub fn kind(&self, id: NodeId) -> SectionResult<ProviderKind> {
        Ok(self.node(id)?.kind.tag())
    }

    /// The parent of a node, if attached.
    pub fn parent(&self, id: NodeId) -> SectionResult<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    /// The root of the tree containing `id`.
    pub fn root_of(&self, id: NodeId) -> SectionResult<NodeId> {
        let mut current = id;
        while let Some(parent) = self.node(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor_of(&self, ancestor: NodeId, id: NodeId) -> SectionResult<bool> {
        self.node(ancestor)?;
        let mut current = self.node(id)?.parent;
        while let Some(node) = current {
            if node == ancestor {
                return Ok(true);
            }
            current = self.node(node)?.parent;
        }
        Ok(false)
    }

    /// Where the node's change notifications currently go.
    pub fn update_sink(&self, id: NodeId) -> SectionResult<UpdateSink> {
        Ok(match self.node(id)?.parent {
            Some(parent) => UpdateSink::Parent(parent),
            None if self.observers.contains_key(id) => UpdateSink::Observer,
            None => UpdateSink::Detached,
        })
    }

    /// The ordered children of a container, including unselected segments.
    pub fn children(&self, id: NodeId) -> SectionResult<&[NodeId]> {
        match &self.node(id)?.kind {
            NodeKind::Section(_) => Err(SectionError::WrongKind {
                node: id,
                expected: ProviderKind::Composite,
            }),
            kind => Ok(kind.children()),
        }
    }

    /// The selected child index of a segmented container.
    pub fn selected(&self, id: NodeId) -> SectionResult<Option<usize>> {
        match &self.node(id)?.kind {
            NodeKind::Segmented { selected, .. } => Ok(*selected),
            _ => Err(SectionError::WrongKind {
                node: id,
                expected: ProviderKind::Segmented,
            }),
        }
    }

    fn position_of(&self, parent: NodeId, child: NodeId) -> SectionResult<usize> {
        self.node(child)?;
        self.node(parent)?
            .kind
            .children()
            .iter()
            .position(|&c| c == child)
            .ok_or(SectionError::ChildNotFound { parent, child })
    }

    // =========================================================================
    // Structural Mutation
    // =========================================================================

    /// Appends `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> SectionResult<()> {
        let len = self.children(parent)?.len();
        self.insert_child(parent, len, child)
    }

    /// Inserts a detached node as the child of `parent` at `index`.
    ///
    /// Emits the inserted section range when the child is visible.
    #[tracing::instrument(skip(self), target = "horizon_sections::tree", level = "trace")]
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> SectionResult<()> {
        let len = self.children(parent)?.len();
        if self.node(child)?.parent.is_some() {
            return Err(SectionError::DuplicateChild { child });
        }
        if child == parent || self.is_ancestor_of(child, parent)? {
            return Err(SectionError::CircularParentage);
        }
        if index > len {
            return Err(SectionError::IndexOutOfRange { index, len });
        }
        if self.batches.contains_key(child) {
            return Err(SectionError::BatchInProgress { root: child });
        }

        let node = self.node_mut(parent)?;
        if let NodeKind::Segmented {
            selected: Some(selected),
            ..
        } = &mut node.kind
            && *selected >= index
        {
            *selected += 1;
        }
        if let Some(children) = node.kind.children_mut() {
            children.insert(index, child);
        }
        self.node_mut(child)?.parent = Some(parent);
        self.invalidate_upward(parent);

        tracing::debug!(target: targets::TREE, ?parent, ?child, index, "attached child");
        self.signals.child_attached.emit((parent, child));

        if let Some(offset) = self.child_offset(parent, child)? {
            let count = self.number_of_sections(child)?;
            if count > 0 {
                self.forward(parent, ChangeSet::sections_inserted(offset..offset + count))?;
            }
        }
        Ok(())
    }

    /// Detaches `child` from `parent`. The child keeps its subtree and can be
    /// attached again.
    ///
    /// Emits the section range the child occupied, computed before removal.
    #[tracing::instrument(skip(self), target = "horizon_sections::tree", level = "trace")]
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> SectionResult<()> {
        let position = self.position_of(parent, child)?;
        let removed = match self.child_offset(parent, child)? {
            Some(offset) => {
                let count = self.number_of_sections(child)?;
                (count > 0).then_some(offset..offset + count)
            }
            None => None,
        };

        let node = self.node_mut(parent)?;
        if let Some(children) = node.kind.children_mut() {
            children.remove(position);
        }
        if let NodeKind::Segmented { selected, .. } = &mut node.kind {
            *selected = match *selected {
                Some(index) if index == position => None,
                Some(index) if index > position => Some(index - 1),
                other => other,
            };
        }
        self.node_mut(child)?.parent = None;
        self.invalidate_upward(parent);

        tracing::debug!(target: targets::TREE, ?parent, ?child, position, "detached child");
        self.signals.child_detached.emit((parent, child));

        if let Some(range) = removed {
            self.forward(parent, ChangeSet::sections_removed(range))?;
        }
        Ok(())
    }

    /// Detaches every child of `parent` inside one batch bracket.
    #[tracing::instrument(skip(self), target = "horizon_sections::tree", level = "trace")]
    pub fn remove_all(&mut self, parent: NodeId) -> SectionResult<()> {
        let children = self.children(parent)?.to_vec();
        if children.is_empty() {
            return Ok(());
        }
        self.perform_batch_updates(
            parent,
            |tree| {
                children
                    .iter()
                    .try_for_each(|&child| tree.remove_child(parent, child))
            },
            |_| {},
        )?
    }

    /// Moves the child at `from` so that it ends up at `to`.
    ///
    /// Emits one section move per section the child contributes.
    #[tracing::instrument(skip(self), target = "horizon_sections::tree", level = "trace")]
    pub fn move_child(&mut self, parent: NodeId, from: usize, to: usize) -> SectionResult<()> {
        let children = self.children(parent)?;
        let len = children.len();
        for index in [from, to] {
            if index >= len {
                return Err(SectionError::IndexOutOfRange { index, len });
            }
        }
        if from == to {
            return Ok(());
        }
        let child = children[from];
        let old_offset = self.child_offset(parent, child)?;
        let count = self.number_of_sections(child)?;

        let node = self.node_mut(parent)?;
        if let Some(children) = node.kind.children_mut() {
            let moved = children.remove(from);
            children.insert(to, moved);
        }
        if let NodeKind::Segmented {
            selected: Some(selected),
            ..
        } = &mut node.kind
        {
            *selected = moved_index(*selected, from, to);
        }
        self.invalidate_upward(parent);
        tracing::debug!(target: targets::TREE, ?parent, ?child, from, to, "moved child");

        let new_offset = self.child_offset(parent, child)?;
        if let (Some(old), Some(new)) = (old_offset, new_offset)
            && count > 0
            && old != new
        {
            self.forward(parent, ChangeSet::sections_moved(block_moves(old, new, count)))?;
        }
        Ok(())
    }

    /// Selects the visible child of a segmented container, or clears the
    /// selection with `None`.
    ///
    /// Emits the removal of the previously visible range together with the
    /// insertion of the new one.
    #[tracing::instrument(skip(self), target = "horizon_sections::tree", level = "trace")]
    pub fn select(&mut self, segmented: NodeId, index: Option<usize>) -> SectionResult<()> {
        let previous = self.selected(segmented)?;
        let len = self.children(segmented)?.len();
        if let Some(index) = index
            && index >= len
        {
            return Err(SectionError::IndexOutOfRange { index, len });
        }
        if index == previous {
            return Ok(());
        }

        let old_count = self.number_of_sections(segmented)?;
        if let NodeKind::Segmented { selected, .. } = &mut self.node_mut(segmented)?.kind {
            *selected = index;
        }
        self.invalidate_upward(segmented);
        let new_count = self.number_of_sections(segmented)?;
        tracing::debug!(target: targets::TREE, ?segmented, ?previous, ?index, "changed selection");

        let mut changes = ChangeSet::sections_removed(0..old_count);
        changes.inserted_sections.extend(0..new_count);
        if !changes.is_empty() {
            self.forward(segmented, changes)?;
        }
        Ok(())
    }

    /// Removes a node and its whole subtree from the arena.
    ///
    /// An attached node is first detached through [`remove_child`], so the
    /// removal is emitted. Handles into the subtree become invalid.
    ///
    /// [`remove_child`]: Self::remove_child
    #[tracing::instrument(skip(self), target = "horizon_sections::tree", level = "trace")]
    pub fn destroy(&mut self, id: NodeId) -> SectionResult<()> {
        if let Some(parent) = self.node(id)?.parent {
            self.remove_child(parent, id)?;
        }
        let caches = self.caches.get_mut();
        let mut stack = vec![id];
        let mut destroyed = 0usize;
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend_from_slice(node.kind.children());
                destroyed += 1;
            }
            caches.remove(current);
            self.observers.remove(current);
            self.batches.remove(current);
        }
        tracing::debug!(target: targets::TREE, ?id, destroyed, "destroyed subtree");
        Ok(())
    }
}

/// Where an index ends up after the element at `from` moves to `to`.
fn moved_index(index: usize, from: usize, to: usize) -> usize {
    if index == from {
        to
    } else if from < index && index <= to {
        index - 1
    } else if to <= index && index < from {
        index + 1
    } else {
        index
    }
}

/// Sequential single-section moves relocating the block `[old, old + count)`
/// so that its first section ends up at `new`.
fn block_moves(old: usize, new: usize, count: usize) -> Vec<(usize, usize)> {
    if new < old {
        (0..count).map(|i| (old + i, new + i)).collect()
    } else {
        vec![(old, new + count - 1); count]
    }
}

static_assertions::assert_impl_all!(SectionTree<String>: Send);
static_assertions::assert_impl_all!(TreeSignals: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    #[test]
    fn test_create_and_query() {
        let mut tree = SectionTree::new();
        let leaf = tree.create_section([1, 2, 3]);
        let composite = tree.create_composite();
        tree.set_name(composite, "root").unwrap();

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.kind(leaf).unwrap(), ProviderKind::Section);
        assert_eq!(tree.name(composite).unwrap(), "root");
        assert_eq!(tree.update_sink(leaf).unwrap(), UpdateSink::Detached);
        assert!(matches!(
            tree.children(leaf),
            Err(SectionError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_attach_sets_update_sink() {
        let mut tree: SectionTree<u8> = SectionTree::new();
        let root = tree.create_composite();
        let leaf = tree.create_section([]);
        tree.append_child(root, leaf).unwrap();

        assert_eq!(tree.update_sink(leaf).unwrap(), UpdateSink::Parent(root));
        assert_eq!(tree.root_of(leaf).unwrap(), root);
        assert!(tree.is_ancestor_of(root, leaf).unwrap());
        assert_eq!(tree.roots(), vec![root]);

        tree.remove_child(root, leaf).unwrap();
        assert_eq!(tree.parent(leaf).unwrap(), None);
    }

    #[test]
    fn test_attach_errors() {
        let mut tree: SectionTree<u8> = SectionTree::new();
        let root = tree.create_composite();
        let inner = tree.create_composite();
        let leaf = tree.create_section([]);
        tree.append_child(root, inner).unwrap();

        assert_eq!(
            tree.append_child(root, inner),
            Err(SectionError::DuplicateChild { child: inner })
        );
        assert_eq!(
            tree.append_child(inner, root),
            Err(SectionError::CircularParentage)
        );
        assert_eq!(
            tree.append_child(root, root),
            Err(SectionError::CircularParentage)
        );
        assert_eq!(
            tree.insert_child(root, 5, leaf),
            Err(SectionError::IndexOutOfRange { index: 5, len: 1 })
        );
        assert_eq!(
            tree.remove_child(inner, leaf),
            Err(SectionError::ChildNotFound {
                parent: inner,
                child: leaf
            })
        );
        assert!(matches!(
            tree.append_child(leaf, inner),
            Err(SectionError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_child_signals() {
        let mut tree: SectionTree<u8> = SectionTree::new();
        let root = tree.create_composite();
        let leaf = tree.create_section([]);

        let events = Arc::new(Mutex::new(Vec::new()));
        let attached = events.clone();
        tree.signals()
            .child_attached
            .connect(move |&(parent, child)| attached.lock().push(("attach", parent, child)));
        let detached = events.clone();
        tree.signals()
            .child_detached
            .connect(move |&(parent, child)| detached.lock().push(("detach", parent, child)));

        tree.append_child(root, leaf).unwrap();
        tree.remove_child(root, leaf).unwrap();

        assert_eq!(
            *events.lock(),
            vec![("attach", root, leaf), ("detach", root, leaf)]
        );
    }

    #[test]
    fn test_move_child_reorders() {
        let mut tree: SectionTree<u8> = SectionTree::new();
        let root = tree.create_composite();
        let leaves: Vec<_> = (0..3).map(|n| tree.create_section([n])).collect();
        for &leaf in &leaves {
            tree.append_child(root, leaf).unwrap();
        }

        tree.move_child(root, 0, 2).unwrap();
        assert_eq!(tree.children(root).unwrap(), &[leaves[1], leaves[2], leaves[0]]);
        assert_eq!(
            tree.move_child(root, 3, 0),
            Err(SectionError::IndexOutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn test_destroy_removes_subtree() {
        let mut tree: SectionTree<u8> = SectionTree::new();
        let root = tree.create_composite();
        let inner = tree.create_composite();
        let leaf = tree.create_section([1]);
        tree.append_child(root, inner).unwrap();
        tree.append_child(inner, leaf).unwrap();

        tree.destroy(inner).unwrap();
        assert!(!tree.contains(inner));
        assert!(!tree.contains(leaf));
        assert_eq!(tree.children(root).unwrap(), &[] as &[NodeId]);
        assert_eq!(tree.kind(leaf), Err(SectionError::InvalidNode(leaf)));
    }

    #[test]
    fn test_segmented_selection_bookkeeping() {
        let mut tree: SectionTree<u8> = SectionTree::new();
        let segmented = tree.create_segmented();
        let a = tree.create_section([]);
        let b = tree.create_section([]);
        tree.append_child(segmented, a).unwrap();
        tree.select(segmented, Some(0)).unwrap();

        tree.insert_child(segmented, 0, b).unwrap();
        assert_eq!(tree.selected(segmented).unwrap(), Some(1));

        tree.move_child(segmented, 1, 0).unwrap();
        assert_eq!(tree.selected(segmented).unwrap(), Some(0));

        tree.remove_child(segmented, a).unwrap();
        assert_eq!(tree.selected(segmented).unwrap(), None);
        assert_eq!(
            tree.select(segmented, Some(1)),
            Err(SectionError::IndexOutOfRange { index: 1, len: 1 })
        );
    }

    #[test]
    fn test_moved_index_and_block_moves() {
        assert_eq!(moved_index(0, 0, 2), 2);
        assert_eq!(moved_index(1, 0, 2), 0);
        assert_eq!(moved_index(1, 2, 0), 2);
        assert_eq!(moved_index(3, 0, 2), 3);

        assert_eq!(block_moves(3, 1, 2), vec![(3, 1), (4, 2)]);
        assert_eq!(block_moves(0, 2, 2), vec![(0, 3), (0, 3)]);
    }
}
