//! Folding of per-mutation deltas into one batch descriptor.
//!
//! Inside a batch bracket every mutation still produces its own small
//! [`ChangeSet`], addressed in the coordinates of the moment it happened.
//! [`ChangeReducer`] re-addresses them into a single change set valid under
//! the staged application order documented in [`crate::changeset`].
//!
//! Inserts, removals and updates are folded exactly. Element operations
//! inside an inserted or reloaded section are absorbed, since the observer
//! reads that section fresh. Moves are kept only while they trail every other
//! operation, and section moves only after plain removals. Anything else falls
//! back to a full reload.

use std::collections::{BTreeMap, BTreeSet};

use horizon_sections_core::logging::targets;

use crate::changeset::{ChangeSet, Operation};
use crate::index_path::IndexPath;

/// Net effect of insert/remove/update operations on one index space.
///
/// `removed` holds indices before the batch, `inserted` and `updated` hold
/// current indices.
#[derive(Debug, Clone, Default)]
struct IndexReducer {
    removed: BTreeSet<usize>,
    inserted: BTreeSet<usize>,
    updated: BTreeSet<usize>,
}

impl IndexReducer {
    fn insert(&mut self, index: usize) {
        shift_up(&mut self.inserted, index);
        shift_up(&mut self.updated, index);
        self.inserted.insert(index);
    }

    /// Removes a current index. An index inserted earlier in the batch just
    /// cancels its insertion.
    fn remove(&mut self, index: usize) {
        if !self.inserted.remove(&index) {
            let original = self.original_index(index);
            self.removed.insert(original);
        }
        self.updated.remove(&index);
        shift_down(&mut self.inserted, index);
        shift_down(&mut self.updated, index);
    }

    fn update(&mut self, index: usize) {
        if !self.inserted.contains(&index) {
            self.updated.insert(index);
        }
    }

    /// Whether the current index refers to content the observer reads fresh.
    fn is_fresh(&self, index: usize) -> bool {
        self.inserted.contains(&index) || self.updated.contains(&index)
    }

    /// Maps a current index that survived from before the batch back to its
    /// position before the batch.
    fn original_index(&self, current: usize) -> usize {
        let survivor = current - self.inserted.range(..current).count();
        let mut original = survivor;
        for &removed in &self.removed {
            if removed <= original {
                original += 1;
            } else {
                break;
            }
        }
        original
    }

    fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.inserted.is_empty() && self.updated.is_empty()
    }
}

fn shift_up(set: &mut BTreeSet<usize>, from: usize) {
    if set.range(from..).next().is_some() {
        *set = set.iter().map(|&i| if i >= from { i + 1 } else { i }).collect();
    }
}

fn shift_down(set: &mut BTreeSet<usize>, after: usize) {
    if set.range(after + 1..).next().is_some() {
        *set = set.iter().map(|&i| if i > after { i - 1 } else { i }).collect();
    }
}

/// Accumulates the deltas of one batch.
#[derive(Debug, Clone, Default)]
pub struct ChangeReducer {
    reload: bool,
    sections: IndexReducer,
    /// Element-level state, keyed by current section.
    items: BTreeMap<usize, IndexReducer>,
    section_moves: Vec<(usize, usize)>,
    item_moves: Vec<(IndexPath, IndexPath)>,
    operation_count: usize,
    threshold: Option<usize>,
}

impl ChangeReducer {
    /// Creates a reducer that falls back to reload once more than
    /// `threshold` operations were pushed.
    pub fn new(threshold: Option<usize>) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    /// Whether the batch has already fallen back to reload.
    pub fn needs_reload(&self) -> bool {
        self.reload
    }

    /// Number of operations pushed so far.
    pub fn operation_count(&self) -> usize {
        self.operation_count
    }

    /// Folds a change set raised during the batch.
    pub fn push(&mut self, changes: &ChangeSet) {
        if self.reload {
            return;
        }
        if !changes.has_incremental_changes() {
            self.fall_back("reload raised inside batch");
            return;
        }
        for op in changes.operations() {
            self.apply(op);
            if self.reload {
                return;
            }
        }
    }

    /// Folds one operation.
    pub fn apply(&mut self, op: Operation) {
        if self.reload {
            return;
        }
        self.operation_count += 1;
        if self.threshold.is_some_and(|limit| self.operation_count > limit) {
            self.fall_back("reload threshold exceeded");
            return;
        }

        match op {
            Operation::InsertSection(section) => {
                if self.has_moves() {
                    return self.fall_back("section insert after move");
                }
                self.sections.insert(section);
                self.items = rekey_up(std::mem::take(&mut self.items), section);
            }
            Operation::RemoveSection(section) => {
                if self.has_moves() {
                    return self.fall_back("section removal after move");
                }
                self.sections.remove(section);
                self.items.remove(&section);
                self.items = rekey_down(std::mem::take(&mut self.items), section);
            }
            Operation::UpdateSection(section) => {
                if self.has_moves() {
                    return self.fall_back("section update after move");
                }
                self.sections.update(section);
                self.items.remove(&section);
            }
            Operation::MoveSection(from, to) => {
                if !self.items.is_empty() || !self.item_moves.is_empty() {
                    return self.fall_back("section move after element changes");
                }
                // Inserted and reloaded sections are read at their final
                // index, which a later move would no longer match.
                if !self.sections.inserted.is_empty() || !self.sections.updated.is_empty() {
                    return self.fall_back("section move after section refresh");
                }
                self.section_moves.push((from, to));
            }
            Operation::InsertItem(path) | Operation::RemoveItem(path) | Operation::UpdateItem(path) => {
                if self.has_moves() {
                    return self.fall_back("element change after move");
                }
                if self.sections.is_fresh(path.section) {
                    return;
                }
                let items = self.items.entry(path.section).or_default();
                match op {
                    Operation::InsertItem(_) => items.insert(path.item),
                    Operation::RemoveItem(_) => items.remove(path.item),
                    _ => items.update(path.item),
                }
            }
            Operation::MoveItem(from, to) => {
                if !self.section_moves.is_empty()
                    || self.sections.is_fresh(from.section)
                    || self.sections.is_fresh(to.section)
                {
                    return self.fall_back("element move across changed sections");
                }
                self.item_moves.push((from, to));
            }
        }
    }

    /// Returns the descriptor accumulated so far without consuming the reducer.
    pub fn snapshot(&self) -> ChangeSet {
        self.clone().finish()
    }

    /// Consumes the reducer and returns the coalesced descriptor.
    pub fn finish(self) -> ChangeSet {
        if self.reload {
            return ChangeSet::reload();
        }
        let mut changes = ChangeSet::new();
        changes.removed_sections = self.sections.removed;
        changes.inserted_sections = self.sections.inserted;
        changes.updated_sections = self.sections.updated;
        changes.moved_sections = self.section_moves;
        for (section, items) in self.items {
            if items.is_empty() {
                continue;
            }
            let at = |item| IndexPath::new(section, item);
            changes.removed_items.extend(items.removed.iter().map(|&i| at(i)));
            changes.inserted_items.extend(items.inserted.iter().map(|&i| at(i)));
            changes.updated_items.extend(items.updated.iter().map(|&i| at(i)));
        }
        changes.moved_items = self.item_moves;
        changes
    }

    fn has_moves(&self) -> bool {
        !self.section_moves.is_empty() || !self.item_moves.is_empty()
    }

    fn fall_back(&mut self, reason: &'static str) {
        tracing::debug!(target: targets::CHANGES, reason, "batch falls back to reload");
        self.reload = true;
        self.sections = IndexReducer::default();
        self.items.clear();
        self.section_moves.clear();
        self.item_moves.clear();
    }
}

fn rekey_up(items: BTreeMap<usize, IndexReducer>, from: usize) -> BTreeMap<usize, IndexReducer> {
    items
        .into_iter()
        .map(|(section, state)| (if section >= from { section + 1 } else { section }, state))
        .collect()
}

fn rekey_down(items: BTreeMap<usize, IndexReducer>, after: usize) -> BTreeMap<usize, IndexReducer> {
    items
        .into_iter()
        .map(|(section, state)| (if section > after { section - 1 } else { section }, state))
        .collect()
}
