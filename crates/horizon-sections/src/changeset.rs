//! Change descriptors.
//!
//! A [`ChangeSet`] describes a structural delta at two granularities: whole
//! sections and single elements addressed by [`IndexPath`]. It is either
//! incremental (apply the discrete operations) or a reload (discard
//! everything and query again). The reload state is sticky.
//!
//! # Application Order
//!
//! An incremental change set is applied in eight fixed stages, each operating
//! on the state left by the previous one:
//!
//! 1. removed sections, descending, in coordinates before the change
//! 2. inserted sections, ascending, in final coordinates
//! 3. updated sections, in coordinates after stage 2
//! 4. moved sections, pairwise in list order
//! 5. removed index paths, descending; the section is in coordinates after
//!    stage 4, the item in coordinates before the change
//! 6. inserted index paths, ascending, in final coordinates
//! 7. updated index paths, in final coordinates
//! 8. moved index paths, pairwise in list order
//!
//! [`ChangeSet::operations`] yields exactly this sequence.

use std::collections::BTreeSet;
use std::ops::Range;

use crate::index_path::IndexPath;
use crate::observer::{SectionSource, UpdateObserver};

/// A single step of an incremental change set, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Remove the section at this index.
    RemoveSection(usize),
    /// Insert a section at this index.
    InsertSection(usize),
    /// Reload the section at this index.
    UpdateSection(usize),
    /// Move the section at `.0` so that it ends up at `.1`.
    MoveSection(usize, usize),
    /// Remove the element at this path.
    RemoveItem(IndexPath),
    /// Insert an element at this path.
    InsertItem(IndexPath),
    /// Reload the element at this path.
    UpdateItem(IndexPath),
    /// Move the element at `.0` so that it ends up at `.1`.
    MoveItem(IndexPath, IndexPath),
}

impl Operation {
    /// Whether this operation addresses whole sections.
    pub fn is_section_level(&self) -> bool {
        matches!(
            self,
            Self::RemoveSection(_)
                | Self::InsertSection(_)
                | Self::UpdateSection(_)
                | Self::MoveSection(..)
        )
    }

    /// Whether this operation is a move.
    pub fn is_move(&self) -> bool {
        matches!(self, Self::MoveSection(..) | Self::MoveItem(..))
    }

    /// Returns the operation with every section component shifted by `offset`.
    pub fn translated(self, offset: usize) -> Self {
        match self {
            Self::RemoveSection(s) => Self::RemoveSection(s + offset),
            Self::InsertSection(s) => Self::InsertSection(s + offset),
            Self::UpdateSection(s) => Self::UpdateSection(s + offset),
            Self::MoveSection(from, to) => Self::MoveSection(from + offset, to + offset),
            Self::RemoveItem(path) => Self::RemoveItem(path.offset_by(offset)),
            Self::InsertItem(path) => Self::InsertItem(path.offset_by(offset)),
            Self::UpdateItem(path) => Self::UpdateItem(path.offset_by(offset)),
            Self::MoveItem(from, to) => {
                Self::MoveItem(from.offset_by(offset), to.offset_by(offset))
            }
        }
    }
}

/// A coalesced structural delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    incremental: bool,
    pub(crate) removed_sections: BTreeSet<usize>,
    pub(crate) inserted_sections: BTreeSet<usize>,
    pub(crate) updated_sections: BTreeSet<usize>,
    pub(crate) moved_sections: Vec<(usize, usize)>,
    pub(crate) removed_items: BTreeSet<IndexPath>,
    pub(crate) inserted_items: BTreeSet<IndexPath>,
    pub(crate) updated_items: BTreeSet<IndexPath>,
    pub(crate) moved_items: Vec<(IndexPath, IndexPath)>,
}

impl Default for ChangeSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeSet {
    /// Creates an empty incremental change set.
    pub fn new() -> Self {
        Self {
            incremental: true,
            removed_sections: BTreeSet::new(),
            inserted_sections: BTreeSet::new(),
            updated_sections: BTreeSet::new(),
            moved_sections: Vec::new(),
            removed_items: BTreeSet::new(),
            inserted_items: BTreeSet::new(),
            updated_items: BTreeSet::new(),
            moved_items: Vec::new(),
        }
    }

    /// Creates a change set that asks the observer to reload everything.
    pub fn reload() -> Self {
        let mut changes = Self::new();
        changes.mark_needs_reload();
        changes
    }

    /// A contiguous range of inserted sections.
    pub fn sections_inserted(range: Range<usize>) -> Self {
        let mut changes = Self::new();
        changes.inserted_sections.extend(range);
        changes
    }

    /// A contiguous range of removed sections.
    pub fn sections_removed(range: Range<usize>) -> Self {
        let mut changes = Self::new();
        changes.removed_sections.extend(range);
        changes
    }

    /// A single reloaded section.
    pub fn section_updated(section: usize) -> Self {
        let mut changes = Self::new();
        changes.updated_sections.insert(section);
        changes
    }

    /// A sequence of section moves, applied in order.
    pub fn sections_moved(moves: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut changes = Self::new();
        changes.moved_sections.extend(moves);
        changes
    }

    /// A single inserted element.
    pub fn item_inserted(path: IndexPath) -> Self {
        let mut changes = Self::new();
        changes.inserted_items.insert(path);
        changes
    }

    /// A single removed element.
    pub fn item_removed(path: IndexPath) -> Self {
        let mut changes = Self::new();
        changes.removed_items.insert(path);
        changes
    }

    /// A single reloaded element.
    pub fn item_updated(path: IndexPath) -> Self {
        let mut changes = Self::new();
        changes.updated_items.insert(path);
        changes
    }

    /// A single element move.
    pub fn item_moved(from: IndexPath, to: IndexPath) -> Self {
        let mut changes = Self::new();
        changes.moved_items.push((from, to));
        changes
    }

    /// Whether the observer may apply discrete operations.
    ///
    /// `false` means the observer must discard its state and reload.
    pub fn has_incremental_changes(&self) -> bool {
        self.incremental
    }

    /// Switches the change set to reload. There is no way back.
    pub fn mark_needs_reload(&mut self) {
        self.incremental = false;
        self.removed_sections.clear();
        self.inserted_sections.clear();
        self.updated_sections.clear();
        self.moved_sections.clear();
        self.removed_items.clear();
        self.inserted_items.clear();
        self.updated_items.clear();
        self.moved_items.clear();
    }

    /// Whether an incremental change set carries no operations.
    ///
    /// A reload is never empty.
    pub fn is_empty(&self) -> bool {
        self.incremental && self.operation_count() == 0
    }

    /// Number of discrete operations carried.
    pub fn operation_count(&self) -> usize {
        self.removed_sections.len()
            + self.inserted_sections.len()
            + self.updated_sections.len()
            + self.moved_sections.len()
            + self.removed_items.len()
            + self.inserted_items.len()
            + self.updated_items.len()
            + self.moved_items.len()
    }

    /// Removed sections, in coordinates before the change.
    pub fn removed_sections(&self) -> &BTreeSet<usize> {
        &self.removed_sections
    }

    /// Inserted sections, in final coordinates.
    pub fn inserted_sections(&self) -> &BTreeSet<usize> {
        &self.inserted_sections
    }

    /// Reloaded sections.
    pub fn updated_sections(&self) -> &BTreeSet<usize> {
        &self.updated_sections
    }

    /// Section moves, in application order.
    pub fn moved_sections(&self) -> &[(usize, usize)] {
        &self.moved_sections
    }

    /// Removed elements.
    pub fn removed_items(&self) -> &BTreeSet<IndexPath> {
        &self.removed_items
    }

    /// Inserted elements, in final coordinates.
    pub fn inserted_items(&self) -> &BTreeSet<IndexPath> {
        &self.inserted_items
    }

    /// Reloaded elements.
    pub fn updated_items(&self) -> &BTreeSet<IndexPath> {
        &self.updated_items
    }

    /// Element moves, in application order.
    pub fn moved_items(&self) -> &[(IndexPath, IndexPath)] {
        &self.moved_items
    }

    /// Returns the change set with every section component shifted by
    /// `offset`. A reload is returned unchanged.
    pub fn translated(self, offset: usize) -> Self {
        if !self.incremental || offset == 0 {
            return self;
        }
        Self {
            incremental: true,
            removed_sections: self.removed_sections.iter().map(|s| s + offset).collect(),
            inserted_sections: self.inserted_sections.iter().map(|s| s + offset).collect(),
            updated_sections: self.updated_sections.iter().map(|s| s + offset).collect(),
            moved_sections: self
                .moved_sections
                .iter()
                .map(|&(from, to)| (from + offset, to + offset))
                .collect(),
            removed_items: self.removed_items.iter().map(|p| p.offset_by(offset)).collect(),
            inserted_items: self.inserted_items.iter().map(|p| p.offset_by(offset)).collect(),
            updated_items: self.updated_items.iter().map(|p| p.offset_by(offset)).collect(),
            moved_items: self
                .moved_items
                .iter()
                .map(|&(from, to)| (from.offset_by(offset), to.offset_by(offset)))
                .collect(),
        }
    }

    /// The discrete operations in application order. Empty for a reload.
    pub fn operations(&self) -> Vec<Operation> {
        if !self.incremental {
            return Vec::new();
        }
        let mut ops = Vec::with_capacity(self.operation_count());
        ops.extend(self.removed_sections.iter().rev().map(|&s| Operation::RemoveSection(s)));
        ops.extend(self.inserted_sections.iter().map(|&s| Operation::InsertSection(s)));
        ops.extend(self.updated_sections.iter().map(|&s| Operation::UpdateSection(s)));
        ops.extend(
            self.moved_sections
                .iter()
                .map(|&(from, to)| Operation::MoveSection(from, to)),
        );
        ops.extend(self.removed_items.iter().rev().map(|&p| Operation::RemoveItem(p)));
        ops.extend(self.inserted_items.iter().map(|&p| Operation::InsertItem(p)));
        ops.extend(self.updated_items.iter().map(|&p| Operation::UpdateItem(p)));
        ops.extend(
            self.moved_items
                .iter()
                .map(|&(from, to)| Operation::MoveItem(from, to)),
        );
        ops
    }

    /// Feeds the change set to an observer, stage by stage.
    ///
    /// The batch bracket (`will_perform_batch` / `did_perform_batch`) is the
    /// caller's responsibility.
    pub fn apply_to(
        &self,
        observer: &mut dyn UpdateObserver,
        source: &dyn SectionSource,
    ) {
        if !self.incremental {
            observer.did_reload_all(source);
            return;
        }
        if !self.removed_sections.is_empty() {
            observer.delete_sections(&self.removed_sections);
        }
        if !self.inserted_sections.is_empty() {
            observer.insert_sections(&self.inserted_sections, source);
        }
        if !self.updated_sections.is_empty() {
            observer.reload_sections(&self.updated_sections, source);
        }
        for &(from, to) in &self.moved_sections {
            observer.move_section(from, to);
        }
        if !self.removed_items.is_empty() {
            observer.delete_items(&self.removed_items);
        }
        if !self.inserted_items.is_empty() {
            observer.insert_items(&self.inserted_items);
        }
        if !self.updated_items.is_empty() {
            observer.reload_items(&self.updated_items);
        }
        for &(from, to) in &self.moved_items {
            observer.move_item(from, to);
        }
    }
}

impl From<Operation> for ChangeSet {
    fn from(op: Operation) -> Self {
        match op {
            Operation::RemoveSection(s) => Self::sections_removed(s..s + 1),
            Operation::InsertSection(s) => Self::sections_inserted(s..s + 1),
            Operation::UpdateSection(s) => Self::section_updated(s),
            Operation::MoveSection(from, to) => Self::sections_moved([(from, to)]),
            Operation::RemoveItem(path) => Self::item_removed(path),
            Operation::InsertItem(path) => Self::item_inserted(path),
            Operation::UpdateItem(path) => Self::item_updated(path),
            Operation::MoveItem(from, to) => Self::item_moved(from, to),
        }
    }
}
