//! Optional capabilities declared by nodes.
//!
//! The tree does not interpret capabilities. It only finds which node should
//! answer a request addressed to a global section, or which nodes a
//! broadcast request (such as toggling editing) should reach.

use crate::error::SectionResult;
use crate::node::NodeId;
use crate::tree::SectionTree;

bitflags::bitflags! {
    /// Optional behaviors a node can declare.
    ///
    /// Combine with bitwise OR: `Capabilities::EDITING | Capabilities::SELECTION`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u8 {
        /// Elements can be edited.
        const EDITING = 1 << 0;
        /// Elements can be selected.
        const SELECTION = 1 << 1;
        /// The node provides section headers.
        const HEADER = 1 << 2;
        /// The node provides section footers.
        const FOOTER = 1 << 3;
        /// Elements can be reordered by the user.
        const REORDERING = 1 << 4;
    }
}

impl<T> SectionTree<T> {
    /// Declares the capabilities of a node, replacing previous ones.
    pub fn set_capabilities(&mut self, id: NodeId, capabilities: Capabilities) -> SectionResult<()> {
        self.node_mut(id)?.capabilities = capabilities;
        Ok(())
    }

    /// The capabilities declared by a node.
    pub fn capabilities(&self, id: NodeId) -> SectionResult<Capabilities> {
        Ok(self.node(id)?.capabilities)
    }

    /// The nearest node declaring `capability` on the path from the leaf
    /// owning `section` up to `root`.
    pub fn responder(
        &self,
        root: NodeId,
        section: usize,
        capability: Capabilities,
    ) -> SectionResult<Option<NodeId>> {
        let mut current = self.locate(root, section)?.leaf;
        loop {
            let node = self.node(current)?;
            if node.capabilities.contains(capability) {
                return Ok(Some(current));
            }
            match node.parent {
                Some(parent) if current != root => current = parent,
                _ => return Ok(None),
            }
        }
    }

    /// Every node of `root`'s visible subtree declaring `capability`, in
    /// pre-order.
    pub fn nodes_with_capability(
        &self,
        root: NodeId,
        capability: Capabilities,
    ) -> SectionResult<Vec<NodeId>> {
        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let node = self.node(current)?;
            if node.capabilities.contains(capability) {
                found.push(current);
            }
            stack.extend(
                node.kind
                    .visible_children()
                    .into_iter()
                    .rev()
                    .map(|(_, child)| child),
            );
        }
        Ok(found)
    }
}
