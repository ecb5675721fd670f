//! The boundary between the section tree and whatever presents it.
//!
//! A root may carry one [`UpdateObserver`]. It receives root-addressed change
//! sets one stage at a time, bracketed by `will_perform_batch` and
//! `did_perform_batch`. Stages that need fresh data are handed a
//! [`SectionSource`] describing the tree as it is after the batch.
//!
//! [`SectionMirror`] is a reference observer that keeps per-section element
//! counts by applying every stage exactly as documented in
//! [`crate::changeset`]. Anything it cannot apply is recorded, not panicked
//! on, so it doubles as a consistency checker.

use std::collections::BTreeSet;
use std::sync::Arc;

use horizon_sections_core::logging::targets;
use parking_lot::Mutex;

use crate::changeset::Operation;
use crate::error::SectionResult;
use crate::index_path::IndexPath;

/// Read-only view of a root's flattened index space.
pub trait SectionSource {
    /// Number of sections the root exposes.
    fn number_of_sections(&self) -> SectionResult<usize>;

    /// Number of elements in a root-addressed section.
    fn number_of_elements(&self, section: usize) -> SectionResult<usize>;
}

/// Receives root-addressed change notifications.
///
/// Every stage method defaults to doing nothing, so an observer only needs
/// to implement what it presents. Stage methods are called in the order
/// documented in [`crate::changeset`], skipping empty stages.
pub trait UpdateObserver: Send {
    /// A batch of changes is about to be delivered.
    fn will_perform_batch(&mut self) {}

    /// The batch has been delivered completely.
    fn did_perform_batch(&mut self) {}

    /// Everything changed; rebuild from `source`.
    fn did_reload_all(&mut self, source: &dyn SectionSource);

    /// Stage 1.
    fn delete_sections(&mut self, _sections: &BTreeSet<usize>) {}

    /// Stage 2.
    fn insert_sections(&mut self, _sections: &BTreeSet<usize>, _source: &dyn SectionSource) {}

    /// Stage 3.
    fn reload_sections(&mut self, _sections: &BTreeSet<usize>, _source: &dyn SectionSource) {}

    /// Stage 4, once per pair.
    fn move_section(&mut self, _from: usize, _to: usize) {}

    /// Stage 5.
    fn delete_items(&mut self, _paths: &BTreeSet<IndexPath>) {}

    /// Stage 6.
    fn insert_items(&mut self, _paths: &BTreeSet<IndexPath>) {}

    /// Stage 7.
    fn reload_items(&mut self, _paths: &BTreeSet<IndexPath>) {}

    /// Stage 8, once per pair.
    fn move_item(&mut self, _from: IndexPath, _to: IndexPath) {}
}

#[derive(Debug, Default)]
struct MirrorState {
    counts: Vec<usize>,
    violations: Vec<Operation>,
    batches: usize,
    reloads: usize,
}

impl MirrorState {
    fn reload(&mut self, source: &dyn SectionSource) {
        self.reloads += 1;
        self.counts.clear();
        match source.number_of_sections() {
            Ok(sections) => {
                for section in 0..sections {
                    self.counts.push(source.number_of_elements(section).unwrap_or(0));
                }
            }
            Err(err) => tracing::warn!(target: targets::CHANGES, %err, "mirror could not read the source"),
        }
    }

    fn apply(&mut self, op: Operation, source: Option<&dyn SectionSource>) {
        let applied = match op {
            Operation::RemoveSection(section) => {
                (section < self.counts.len()).then(|| {
                    self.counts.remove(section);
                })
            }
            Operation::InsertSection(section) => (section <= self.counts.len()).then(|| {
                let elements = fresh_count(source, section);
                self.counts.insert(section, elements);
            }),
            Operation::UpdateSection(section) => (section < self.counts.len()).then(|| {
                self.counts[section] = fresh_count(source, section);
            }),
            Operation::MoveSection(from, to) => {
                (from < self.counts.len() && to < self.counts.len()).then(|| {
                    let elements = self.counts.remove(from);
                    self.counts.insert(to, elements);
                })
            }
            Operation::RemoveItem(path) => self.slot(path, false).map(|count| *count -= 1),
            Operation::InsertItem(path) => self.slot(path, true).map(|count| *count += 1),
            Operation::UpdateItem(path) => self.slot(path, false).map(|_| ()),
            Operation::MoveItem(from, to) => {
                if self.slot(from, false).is_some() {
                    self.counts[from.section] -= 1;
                    match self.slot(to, true) {
                        Some(count) => {
                            *count += 1;
                            Some(())
                        }
                        None => {
                            self.counts[from.section] += 1;
                            None
                        }
                    }
                } else {
                    None
                }
            }
        };
        if applied.is_none() {
            tracing::warn!(target: targets::CHANGES, ?op, sections = self.counts.len(), "mirror rejected operation");
            self.violations.push(op);
        }
    }

    /// The count of the path's section, if the item index is valid for an
    /// existing element (or an insertion point when `inserting`).
    fn slot(&mut self, path: IndexPath, inserting: bool) -> Option<&mut usize> {
        let count = self.counts.get_mut(path.section)?;
        let valid = if inserting {
            path.item <= *count
        } else {
            path.item < *count
        };
        valid.then_some(count)
    }
}

fn fresh_count(source: Option<&dyn SectionSource>, section: usize) -> usize {
    source
        .and_then(|source| source.number_of_elements(section).ok())
        .unwrap_or(0)
}

/// An observer that mirrors per-section element counts.
///
/// Clones share state, so one clone can be handed to the tree while another
/// is kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct SectionMirror {
    state: Arc<Mutex<MirrorState>>,
}

impl SectionMirror {
    /// Creates an empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mirror that starts from known counts.
    pub fn with_counts(counts: Vec<usize>) -> Self {
        let mirror = Self::new();
        mirror.state.lock().counts = counts;
        mirror
    }

    /// Current per-section element counts.
    pub fn counts(&self) -> Vec<usize> {
        self.state.lock().counts.clone()
    }

    /// Operations that could not be applied.
    pub fn violations(&self) -> Vec<Operation> {
        self.state.lock().violations.clone()
    }

    /// Number of completed batch brackets.
    pub fn batch_count(&self) -> usize {
        self.state.lock().batches
    }

    /// Number of full reloads received, including the initial one.
    pub fn reload_count(&self) -> usize {
        self.state.lock().reloads
    }

    /// Applies one operation by hand. Section inserts and reloads read their
    /// element count from `source`, or take 0 without one.
    pub fn apply_operation(&self, op: Operation, source: Option<&dyn SectionSource>) {
        self.state.lock().apply(op, source);
    }

    /// Whether the mirrored counts match `source` exactly.
    pub fn is_consistent_with(&self, source: &dyn SectionSource) -> SectionResult<bool> {
        let counts = self.counts();
        if counts.len() != source.number_of_sections()? {
            return Ok(false);
        }
        for (section, &count) in counts.iter().enumerate() {
            if source.number_of_elements(section)? != count {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl UpdateObserver for SectionMirror {
    fn did_perform_batch(&mut self) {
        self.state.lock().batches += 1;
    }

    fn did_reload_all(&mut self, source: &dyn SectionSource) {
        self.state.lock().reload(source);
    }

    fn delete_sections(&mut self, sections: &BTreeSet<usize>) {
        let mut state = self.state.lock();
        for &section in sections.iter().rev() {
            state.apply(Operation::RemoveSection(section), None);
        }
    }

    fn insert_sections(&mut self, sections: &BTreeSet<usize>, source: &dyn SectionSource) {
        let mut state = self.state.lock();
        for &section in sections {
            state.apply(Operation::InsertSection(section), Some(source));
        }
    }

    fn reload_sections(&mut self, sections: &BTreeSet<usize>, source: &dyn SectionSource) {
        let mut state = self.state.lock();
        for &section in sections {
            state.apply(Operation::UpdateSection(section), Some(source));
        }
    }

    fn move_section(&mut self, from: usize, to: usize) {
        self.state.lock().apply(Operation::MoveSection(from, to), None);
    }

    fn delete_items(&mut self, paths: &BTreeSet<IndexPath>) {
        let mut state = self.state.lock();
        for &path in paths.iter().rev() {
            state.apply(Operation::RemoveItem(path), None);
        }
    }

    fn insert_items(&mut self, paths: &BTreeSet<IndexPath>) {
        let mut state = self.state.lock();
        for &path in paths {
            state.apply(Operation::InsertItem(path), None);
        }
    }

    fn reload_items(&mut self, paths: &BTreeSet<IndexPath>) {
        let mut state = self.state.lock();
        for &path in paths {
            state.apply(Operation::UpdateItem(path), None);
        }
    }

    fn move_item(&mut self, from: IndexPath, to: IndexPath) {
        self.state.lock().apply(Operation::MoveItem(from, to), None);
    }
}

static_assertions::assert_impl_all!(SectionMirror: Send, Sync, UpdateObserver);
