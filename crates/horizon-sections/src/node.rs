//! Node storage for the section tree.
//!
//! Every leaf section and container lives in one [`SlotMap`](slotmap::SlotMap)
//! owned by the tree and is addressed by a [`NodeId`]. Parents own their
//! children as ordered handle lists; the back-reference to the parent is a
//! plain handle, never an owning pointer.

use std::fmt;

use slotmap::new_key_type;

use crate::capability::Capabilities;

new_key_type! {
    /// Handle to a node of a [`SectionTree`](crate::SectionTree).
    ///
    /// Handles stay valid until the node is destroyed. A handle from another
    /// tree, or one whose node was destroyed, fails with
    /// [`SectionError::InvalidNode`](crate::SectionError::InvalidNode).
    pub struct NodeId;
}

/// The kind of a node, as reported by [`SectionTree::kind`](crate::SectionTree::kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// A leaf holding elements. Contributes exactly one section.
    Section,
    /// An ordered container contributing the sections of all its children.
    Composite,
    /// A container contributing only the sections of its selected child.
    Segmented,
}

impl ProviderKind {
    /// Whether nodes of this kind hold children.
    pub fn is_container(self) -> bool {
        !matches!(self, Self::Section)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Section => "section",
            Self::Composite => "composite",
            Self::Segmented => "segmented",
        };
        f.write_str(name)
    }
}

/// Where a node's change notifications go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSink {
    /// The node is attached; its deltas are translated and forwarded here.
    Parent(NodeId),
    /// The node is a root with an attached observer.
    Observer,
    /// The node is a root with nobody listening.
    Detached,
}

pub(crate) enum NodeKind<T> {
    Section(Vec<T>),
    Composite(Vec<NodeId>),
    Segmented {
        children: Vec<NodeId>,
        selected: Option<usize>,
    },
}

impl<T> NodeKind<T> {
    pub(crate) fn tag(&self) -> ProviderKind {
        match self {
            Self::Section(_) => ProviderKind::Section,
            Self::Composite(_) => ProviderKind::Composite,
            Self::Segmented { .. } => ProviderKind::Segmented,
        }
    }

    /// All children, including unselected segments.
    pub(crate) fn children(&self) -> &[NodeId] {
        match self {
            Self::Section(_) => &[],
            Self::Composite(children) | Self::Segmented { children, .. } => children,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match self {
            Self::Section(_) => None,
            Self::Composite(children) | Self::Segmented { children, .. } => Some(children),
        }
    }

    /// The children that contribute sections, with their positions.
    pub(crate) fn visible_children(&self) -> Vec<(usize, NodeId)> {
        match self {
            Self::Section(_) => Vec::new(),
            Self::Composite(children) => children.iter().copied().enumerate().collect(),
            Self::Segmented { children, selected } => selected
                .and_then(|index| children.get(index).map(|&child| (index, child)))
                .into_iter()
                .collect(),
        }
    }
}

pub(crate) struct Node<T> {
    pub(crate) kind: NodeKind<T>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) name: String,
    pub(crate) capabilities: Capabilities,
}

impl<T> Node<T> {
    pub(crate) fn new(kind: NodeKind<T>) -> Self {
        Self {
            kind,
            parent: None,
            name: String::new(),
            capabilities: Capabilities::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_visible_children() {
        let mut ids: SlotMap<NodeId, ()> = SlotMap::with_key();
        let a = ids.insert(());
        let b = ids.insert(());

        let composite: NodeKind<u8> = NodeKind::Composite(vec![a, b]);
        assert_eq!(composite.visible_children(), vec![(0, a), (1, b)]);

        let segmented: NodeKind<u8> = NodeKind::Segmented {
            children: vec![a, b],
            selected: Some(1),
        };
        assert_eq!(segmented.visible_children(), vec![(1, b)]);
        assert_eq!(segmented.children().len(), 2);

        let leaf: NodeKind<u8> = NodeKind::Section(vec![1, 2]);
        assert!(leaf.visible_children().is_empty());
        assert!(!leaf.tag().is_container());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ProviderKind::Composite.to_string(), "composite");
        assert_eq!(ProviderKind::Segmented.to_string(), "segmented");
    }
}
