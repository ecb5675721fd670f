//! Leaf section operations.
//!
//! Element mutations never change how many sections a leaf contributes, so
//! they leave every mapping cache intact and only emit a single-element
//! delta in the leaf's own coordinates (section 0).

use crate::changeset::ChangeSet;
use crate::error::{SectionError, SectionResult};
use crate::index_path::IndexPath;
use crate::node::{NodeId, NodeKind, ProviderKind};
use crate::tree::SectionTree;

impl<T> SectionTree<T> {
    fn leaf_elements(&self, leaf: NodeId) -> SectionResult<&Vec<T>> {
        match &self.node(leaf)?.kind {
            NodeKind::Section(elements) => Ok(elements),
            _ => Err(SectionError::WrongKind {
                node: leaf,
                expected: ProviderKind::Section,
            }),
        }
    }

    fn leaf_elements_mut(&mut self, leaf: NodeId) -> SectionResult<&mut Vec<T>> {
        match &mut self.node_mut(leaf)?.kind {
            NodeKind::Section(elements) => Ok(elements),
            _ => Err(SectionError::WrongKind {
                node: leaf,
                expected: ProviderKind::Section,
            }),
        }
    }

    /// The elements of a leaf section.
    pub fn elements(&self, leaf: NodeId) -> SectionResult<&[T]> {
        Ok(self.leaf_elements(leaf)?)
    }

    /// Number of elements in a leaf section.
    pub fn element_count(&self, leaf: NodeId) -> SectionResult<usize> {
        Ok(self.leaf_elements(leaf)?.len())
    }

    /// The element at `index` of a leaf section.
    pub fn element_at(&self, leaf: NodeId, index: usize) -> SectionResult<&T> {
        let elements = self.leaf_elements(leaf)?;
        elements.get(index).ok_or(SectionError::IndexOutOfRange {
            index,
            len: elements.len(),
        })
    }

    /// The element at a root-addressed path.
    pub fn element(&self, root: NodeId, path: IndexPath) -> SectionResult<&T> {
        let leaf = self.locate(root, path.section)?.leaf;
        self.element_at(leaf, path.item)
    }

    /// Appends an element to a leaf section.
    pub fn append_element(&mut self, leaf: NodeId, element: T) -> SectionResult<()> {
        let len = self.element_count(leaf)?;
        self.insert_element(leaf, len, element)
    }

    /// Inserts an element at `index`, in `[0, len]`.
    #[tracing::instrument(skip(self, element), target = "horizon_sections::tree", level = "trace")]
    pub fn insert_element(&mut self, leaf: NodeId, index: usize, element: T) -> SectionResult<()> {
        let elements = self.leaf_elements_mut(leaf)?;
        if index > elements.len() {
            return Err(SectionError::IndexOutOfRange {
                index,
                len: elements.len(),
            });
        }
        elements.insert(index, element);
        self.forward(leaf, ChangeSet::item_inserted(IndexPath::new(0, index)))
    }

    /// Removes and returns the element at `index`, in `[0, len)`.
    #[tracing::instrument(skip(self), target = "horizon_sections::tree", level = "trace")]
    pub fn remove_element(&mut self, leaf: NodeId, index: usize) -> SectionResult<T> {
        let elements = self.leaf_elements_mut(leaf)?;
        if index >= elements.len() {
            return Err(SectionError::IndexOutOfRange {
                index,
                len: elements.len(),
            });
        }
        let element = elements.remove(index);
        self.forward(leaf, ChangeSet::item_removed(IndexPath::new(0, index)))?;
        Ok(element)
    }

    /// Replaces the element at `index` and returns the previous one.
    #[tracing::instrument(skip(self, element), target = "horizon_sections::tree", level = "trace")]
    pub fn update_element(&mut self, leaf: NodeId, index: usize, element: T) -> SectionResult<T> {
        let elements = self.leaf_elements_mut(leaf)?;
        let len = elements.len();
        let slot = elements
            .get_mut(index)
            .ok_or(SectionError::IndexOutOfRange { index, len })?;
        let previous = std::mem::replace(slot, element);
        self.forward(leaf, ChangeSet::item_updated(IndexPath::new(0, index)))?;
        Ok(previous)
    }

    /// Moves the element at `from` so that it ends up at `to`.
    #[tracing::instrument(skip(self), target = "horizon_sections::tree", level = "trace")]
    pub fn move_element(&mut self, leaf: NodeId, from: usize, to: usize) -> SectionResult<()> {
        let elements = self.leaf_elements_mut(leaf)?;
        let len = elements.len();
        for index in [from, to] {
            if index >= len {
                return Err(SectionError::IndexOutOfRange { index, len });
            }
        }
        if from == to {
            return Ok(());
        }
        let element = elements.remove(from);
        elements.insert(to, element);
        self.forward(
            leaf,
            ChangeSet::item_moved(IndexPath::new(0, from), IndexPath::new(0, to)),
        )
    }

    /// Replaces every element of a leaf section and returns the old ones.
    ///
    /// Emitted as a reload of the leaf's section.
    #[tracing::instrument(skip(self, elements), target = "horizon_sections::tree", level = "trace")]
    pub fn replace_elements(
        &mut self,
        leaf: NodeId,
        elements: impl IntoIterator<Item = T>,
    ) -> SectionResult<Vec<T>> {
        let slot = self.leaf_elements_mut(leaf)?;
        let previous = std::mem::replace(slot, elements.into_iter().collect());
        self.forward(leaf, ChangeSet::section_updated(0))?;
        Ok(previous)
    }
}
