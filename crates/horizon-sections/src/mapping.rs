//! Lazily built coordinate mapping for container nodes.
//!
//! Each container keeps a [`MappingCache`] with two independent parts:
//!
//! - a memoized section count, enough to translate a child's deltas by the
//!   sum of its preceding siblings' counts
//! - a mapping table with the offset of every visible descendant and the
//!   owner of every section, needed to resolve a global section
//!
//! Structural mutation only discards the caches on the path from the mutated
//! container to its root. Nothing is recomputed until a query needs it, so a
//! long sequence of mutations stays linear.

use std::collections::HashMap;

use horizon_sections_core::logging::targets;
use slotmap::SecondaryMap;

use crate::capability::Capabilities;
use crate::error::{SectionError, SectionResult};
use crate::node::{NodeId, NodeKind, ProviderKind};
use crate::tree::SectionTree;

type Caches = SecondaryMap<NodeId, MappingCache>;

#[derive(Debug, Default)]
pub(crate) struct MappingCache {
    section_count: Option<usize>,
    table: Option<MappingTable>,
}

/// Offsets of every visible descendant and owners of every section.
#[derive(Debug, Default)]
pub(crate) struct MappingTable {
    offsets: HashMap<NodeId, usize>,
    sections: Vec<SectionSlot>,
}

#[derive(Debug, Clone, Copy)]
struct SectionSlot {
    leaf: NodeId,
    /// The direct child of the table owner that contributes the section.
    child: NodeId,
}

/// Where a global section lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// The leaf section providing the elements.
    pub leaf: NodeId,
    /// The direct child of the queried root owning the section. For a leaf
    /// root this is the root itself.
    pub child: NodeId,
    /// The section index inside `child`.
    pub local_section: usize,
    /// Capabilities declared by the leaf.
    pub capabilities: Capabilities,
}

impl<T> SectionTree<T> {
    // =========================================================================
    // Queries
    // =========================================================================

    /// Number of sections a node contributes: 1 for a leaf, the sum of its
    /// visible children for a container.
    pub fn number_of_sections(&self, id: NodeId) -> SectionResult<usize> {
        let mut caches = self.caches.write();
        self.count_in(&mut caches, id)
    }

    /// Number of elements in a section addressed relative to `id`.
    pub fn number_of_elements(&self, id: NodeId, section: usize) -> SectionResult<usize> {
        let leaf = match &self.node(id)?.kind {
            NodeKind::Section(elements) => {
                return if section == 0 {
                    Ok(elements.len())
                } else {
                    Err(SectionError::IndexOutOfRange {
                        index: section,
                        len: 1,
                    })
                };
            }
            _ => self.resolve(id, section)?.leaf,
        };
        self.element_count(leaf)
    }

    /// Offset of `descendant` inside `ancestor`'s index space.
    ///
    /// `None` when `descendant` is not a visible descendant. A node is at
    /// offset 0 of itself.
    pub fn offset_of(&self, ancestor: NodeId, descendant: NodeId) -> SectionResult<Option<usize>> {
        let node = self.node(ancestor)?;
        self.node(descendant)?;
        if ancestor == descendant {
            return Ok(Some(0));
        }
        if !node.kind.tag().is_container() {
            return Ok(None);
        }
        let mut caches = self.caches.write();
        let table = self.table_in(&mut caches, ancestor)?;
        Ok(table.offsets.get(&descendant).copied())
    }

    /// The section a leaf occupies in `root`'s index space.
    pub fn global_section(&self, root: NodeId, leaf: NodeId) -> SectionResult<Option<usize>> {
        if self.kind(leaf)? != ProviderKind::Section {
            return Err(SectionError::WrongKind {
                node: leaf,
                expected: ProviderKind::Section,
            });
        }
        self.offset_of(root, leaf)
    }

    /// Resolves a section of `root` to its owning leaf and local coordinates.
    pub fn locate(&self, root: NodeId, section: usize) -> SectionResult<Location> {
        let node = self.node(root)?;
        if !node.kind.tag().is_container() {
            if section != 0 {
                return Err(SectionError::IndexOutOfRange {
                    index: section,
                    len: 1,
                });
            }
            return Ok(Location {
                leaf: root,
                child: root,
                local_section: 0,
                capabilities: node.capabilities,
            });
        }

        let slot = self.resolve(root, section)?;
        let child_offset = self
            .offset_of(root, slot.child)?
            .ok_or(SectionError::MappingCollision { node: root })?;
        Ok(Location {
            leaf: slot.leaf,
            child: slot.child,
            local_section: section - child_offset,
            capabilities: self.node(slot.leaf)?.capabilities,
        })
    }

    /// Number of sections in the mapping table of `id`.
    ///
    /// Always equal to [`number_of_sections`](Self::number_of_sections);
    /// building the table is forced if needed.
    pub fn mapping_len(&self, id: NodeId) -> SectionResult<usize> {
        if !self.kind(id)?.is_container() {
            return Ok(1);
        }
        let mut caches = self.caches.write();
        Ok(self.table_in(&mut caches, id)?.sections.len())
    }

    /// Discards the cached mapping of `id` and of every ancestor.
    ///
    /// Structural mutations do this automatically. Call it when something
    /// outside the tree's knowledge changed what a node contributes.
    pub fn invalidate(&mut self, id: NodeId) -> SectionResult<()> {
        self.node(id)?;
        self.invalidate_upward(id);
        Ok(())
    }

    // =========================================================================
    // Cache Maintenance
    // =========================================================================

    pub(crate) fn invalidate_upward(&mut self, id: NodeId) {
        let caches = self.caches.get_mut();
        let mut current = Some(id);
        let mut depth = 0usize;
        while let Some(node) = current {
            caches.remove(node);
            current = self.nodes.get(node).and_then(|n| n.parent);
            depth += 1;
        }
        tracing::trace!(target: targets::MAPPING, ?id, depth, "invalidated mapping caches");
    }

    /// Offset of a direct child inside `parent`, or `None` for an unselected
    /// segment.
    ///
    /// Uses the table when it is built, otherwise sums the memoized counts of
    /// the preceding siblings without building one.
    pub(crate) fn child_offset(&self, parent: NodeId, child: NodeId) -> SectionResult<Option<usize>> {
        let node = self.node(parent)?;
        if !node.kind.children().contains(&child) {
            return Err(SectionError::ChildNotFound { parent, child });
        }
        let mut caches = self.caches.write();
        if let Some(table) = caches.get(parent).and_then(|cache| cache.table.as_ref()) {
            return Ok(table.offsets.get(&child).copied());
        }
        let mut offset = 0;
        for (_, sibling) in node.kind.visible_children() {
            if sibling == child {
                return Ok(Some(offset));
            }
            offset += self.count_in(&mut caches, sibling)?;
        }
        Ok(None)
    }

    fn count_in(&self, caches: &mut Caches, id: NodeId) -> SectionResult<usize> {
        let node = self.node(id)?;
        if let NodeKind::Section(_) = node.kind {
            return Ok(1);
        }
        if let Some(count) = caches.get(id).and_then(|cache| cache.section_count) {
            return Ok(count);
        }
        let mut count = 0;
        for (_, child) in node.kind.visible_children() {
            count += self.count_in(caches, child)?;
        }
        if let Some(entry) = caches.entry(id) {
            entry.or_default().section_count = Some(count);
        }
        Ok(count)
    }

    fn resolve(&self, id: NodeId, section: usize) -> SectionResult<SectionSlot> {
        let mut caches = self.caches.write();
        let sections = &self.table_in(&mut caches, id)?.sections;
        sections
            .get(section)
            .copied()
            .ok_or(SectionError::IndexOutOfRange {
                index: section,
                len: sections.len(),
            })
    }

    fn table_in<'c>(&self, caches: &'c mut Caches, id: NodeId) -> SectionResult<&'c MappingTable> {
        let built = caches.get(id).is_some_and(|cache| cache.table.is_some());
        if !built {
            let table = self.build_table(id)?;
            let count = table.sections.len();
            if self.config.verify_mapping {
                self.verify_table(caches, id, count)?;
            }
            if let Some(entry) = caches.entry(id) {
                let cache = entry.or_default();
                cache.section_count = Some(count);
                cache.table = Some(table);
            }
        }
        caches
            .get(id)
            .and_then(|cache| cache.table.as_ref())
            .ok_or(SectionError::InvalidNode(id))
    }

    fn build_table(&self, id: NodeId) -> SectionResult<MappingTable> {
        let _span = tracing::trace_span!(target: targets::MAPPING, "rebuild", ?id).entered();
        let mut table = MappingTable::default();
        for (_, child) in self.node(id)?.kind.visible_children() {
            self.record(&mut table, child, child)?;
        }
        tracing::trace!(
            target: targets::MAPPING,
            ?id,
            sections = table.sections.len(),
            entries = table.offsets.len(),
            "rebuilt mapping table"
        );
        Ok(table)
    }

    /// Records `node` at the running offset, then its visible descendants.
    fn record(&self, table: &mut MappingTable, node: NodeId, child: NodeId) -> SectionResult<()> {
        let offset = table.sections.len();
        if table.offsets.insert(node, offset).is_some() {
            return Err(SectionError::MappingCollision { node });
        }
        match &self.node(node)?.kind {
            NodeKind::Section(_) => table.sections.push(SectionSlot { leaf: node, child }),
            kind => {
                for (_, grandchild) in kind.visible_children() {
                    self.record(table, grandchild, child)?;
                }
            }
        }
        Ok(())
    }

    /// Cross-checks a rebuilt table against the memoized count and a plain
    /// traversal.
    fn verify_table(&self, caches: &Caches, id: NodeId, count: usize) -> SectionResult<()> {
        let memoized = caches.get(id).and_then(|cache| cache.section_count);
        let traversed = self.count_by_traversal(id)?;
        if traversed != count || memoized.is_some_and(|memo| memo != count) {
            tracing::error!(
                target: targets::MAPPING,
                ?id,
                count,
                traversed,
                ?memoized,
                "mapping table disagrees with tree"
            );
            return Err(SectionError::MappingCollision { node: id });
        }
        Ok(())
    }

    fn count_by_traversal(&self, id: NodeId) -> SectionResult<usize> {
        match &self.node(id)?.kind {
            NodeKind::Section(_) => Ok(1),
            kind => kind
                .visible_children()
                .into_iter()
                .try_fold(0, |sum, (_, child)| -> SectionResult<usize> {
                    Ok(sum + self.count_by_traversal(child)?)
                }),
        }
    }
}
