//! Error types for section tree operations.

use thiserror::Error;

use crate::node::{NodeId, ProviderKind};

/// Errors raised by [`SectionTree`](crate::SectionTree) operations.
///
/// Every variant is a local failure detected at the call site. None of them
/// leave the tree partially mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SectionError {
    /// The child already has a parent or is already present in this one.
    #[error("node {child:?} is already attached to a parent")]
    DuplicateChild {
        /// The node that was being attached.
        child: NodeId,
    },

    /// The child is not a direct child of the parent.
    #[error("node {child:?} is not a child of {parent:?}")]
    ChildNotFound {
        /// The container that was searched.
        parent: NodeId,
        /// The node that was not found.
        child: NodeId,
    },

    /// A section, element or child slot index is outside the valid range.
    #[error("index {index} is out of range (length {len})")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The length of the sequence the index was checked against.
        len: usize,
    },

    /// A node was reached twice while rebuilding a mapping table.
    ///
    /// This indicates the single-parent invariant was broken and is a defect,
    /// not a condition to handle at runtime.
    #[error("mapping collision at node {node:?}")]
    MappingCollision {
        /// The node that was reached twice, or whose table failed verification.
        node: NodeId,
    },

    /// The handle does not refer to a live node of this tree.
    #[error("invalid node handle {0:?}")]
    InvalidNode(NodeId),

    /// The operation requires a different kind of node.
    #[error("node {node:?} is not a {expected}")]
    WrongKind {
        /// The node the operation was applied to.
        node: NodeId,
        /// The kind the operation requires.
        expected: ProviderKind,
    },

    /// Attaching the node would make it an ancestor of itself.
    #[error("attaching would create a cycle in the section tree")]
    CircularParentage,

    /// The node is the root of an open batch and cannot be attached.
    #[error("root {root:?} has a batch in progress")]
    BatchInProgress {
        /// The root whose batch is still open.
        root: NodeId,
    },
}

/// Result type for section tree operations.
pub type SectionResult<T> = std::result::Result<T, SectionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    #[test]
    fn test_error_messages() {
        let node = NodeId::from(KeyData::from_ffi(1));
        let err = SectionError::IndexOutOfRange { index: 99, len: 2 };
        assert_eq!(err.to_string(), "index 99 is out of range (length 2)");

        let err = SectionError::WrongKind {
            node,
            expected: ProviderKind::Section,
        };
        assert!(err.to_string().ends_with("is not a section"));
    }
}
