//! Change translation, batching and delivery to root observers.
//!
//! A delta raised by a node climbs the tree one hop at a time. At each hop
//! its section components are shifted by the node's offset inside its
//! parent; item components never change. Deltas from an unselected segment
//! stop at the segmented container. At the root the delta is either folded
//! into the open batch or delivered at once, inside its own bracket.

use horizon_sections_core::logging::targets;

use crate::changeset::ChangeSet;
use crate::error::SectionResult;
use crate::node::NodeId;
use crate::observer::{SectionSource, UpdateObserver};
use crate::reducer::ChangeReducer;
use crate::tree::SectionTree;

/// An open batch bracket on a root.
#[derive(Debug)]
pub(crate) struct PendingBatch {
    depth: usize,
    reducer: ChangeReducer,
}

/// Read-only [`SectionSource`] over one root of a tree.
pub struct RootView<'a, T> {
    tree: &'a SectionTree<T>,
    root: NodeId,
}

impl<T> RootView<'_, T> {
    /// The root this view reads.
    pub fn root(&self) -> NodeId {
        self.root
    }
}

impl<T> SectionSource for RootView<'_, T> {
    fn number_of_sections(&self) -> SectionResult<usize> {
        self.tree.number_of_sections(self.root)
    }

    fn number_of_elements(&self, section: usize) -> SectionResult<usize> {
        self.tree.number_of_elements(self.root, section)
    }
}

impl<T> SectionTree<T> {
    /// A read-only view of `root`'s flattened index space.
    pub fn view(&self, root: NodeId) -> RootView<'_, T> {
        RootView { tree: self, root }
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Attaches the observer of `root`, replacing and returning any previous
    /// one. The new observer immediately receives a full reload.
    ///
    /// Inside an open batch the observer joins the bracket instead: it is
    /// told the batch started, and the batch closes with a full reload.
    pub fn set_observer(
        &mut self,
        root: NodeId,
        observer: impl UpdateObserver + 'static,
    ) -> SectionResult<Option<Box<dyn UpdateObserver>>> {
        self.node(root)?;
        let previous = self.observers.insert(root, Box::new(observer));
        if let Some(batch) = self.batches.get_mut(root) {
            batch.reducer.push(&ChangeSet::reload());
            tracing::debug!(target: targets::CHANGES, ?root, "observer joined open batch");
            self.notify(root, |observer, _| observer.will_perform_batch());
        } else {
            self.notify(root, |observer, source| observer.did_reload_all(source));
        }
        Ok(previous)
    }

    /// Detaches and returns the observer of `root`.
    pub fn take_observer(&mut self, root: NodeId) -> Option<Box<dyn UpdateObserver>> {
        self.observers.remove(root)
    }

    /// Whether `root` has an observer attached.
    pub fn has_observer(&self, root: NodeId) -> bool {
        self.observers.contains_key(root)
    }

    /// Runs `f` against the observer of `root`, lending it a view of the
    /// tree. Returns `false` when nobody is listening.
    fn notify(
        &mut self,
        root: NodeId,
        f: impl FnOnce(&mut dyn UpdateObserver, &dyn SectionSource),
    ) -> bool {
        let Some(mut observer) = self.observers.remove(root) else {
            if self.config.log_dropped_events {
                tracing::trace!(target: targets::CHANGES, ?root, "no observer attached");
            }
            return false;
        };
        f(observer.as_mut(), &self.view(root));
        self.observers.insert(root, observer);
        true
    }

    // =========================================================================
    // Translation
    // =========================================================================

    /// Translates a delta raised by `origin` up to its root and delivers it.
    pub(crate) fn forward(&mut self, origin: NodeId, mut changes: ChangeSet) -> SectionResult<()> {
        let mut node = origin;
        while let Some(parent) = self.node(node)?.parent {
            match self.child_offset(parent, node)? {
                Some(offset) => {
                    changes = changes.translated(offset);
                    tracing::trace!(target: targets::CHANGES, ?node, ?parent, offset, "forwarded change");
                }
                None => {
                    tracing::trace!(
                        target: targets::CHANGES,
                        ?node,
                        ?parent,
                        "dropped change from unselected segment"
                    );
                    return Ok(());
                }
            }
            node = parent;
        }
        self.deliver(node, changes);
        Ok(())
    }

    fn deliver(&mut self, root: NodeId, changes: ChangeSet) {
        if changes.is_empty() {
            return;
        }
        if let Some(batch) = self.batches.get_mut(root) {
            batch.reducer.push(&changes);
            return;
        }
        let _span = tracing::trace_span!(target: targets::CHANGES, "dispatch", ?root).entered();
        self.notify(root, |observer, source| {
            observer.will_perform_batch();
            changes.apply_to(observer, source);
            observer.did_perform_batch();
        });
        self.signals.changes_committed.emit((root, changes));
    }

    // =========================================================================
    // Batches
    // =========================================================================

    /// Runs `mutate` inside a batch bracket on the root of `node`.
    ///
    /// The observer is told the batch starts, every delta raised by `mutate`
    /// is folded into one change set, then the change set is delivered and
    /// the observer is told the batch ended. `completion` receives the
    /// delivered change set.
    ///
    /// Brackets nest. Only the outermost one delivers; a nested bracket's
    /// `completion` receives the changes folded so far.
    pub fn perform_batch_updates<R>(
        &mut self,
        node: NodeId,
        mutate: impl FnOnce(&mut Self) -> R,
        completion: impl FnOnce(&ChangeSet),
    ) -> SectionResult<R> {
        let root = self.root_of(node)?;
        self.open_batch(root);
        let result = mutate(self);
        let changes = self.close_batch(root);
        completion(&changes);
        Ok(result)
    }

    /// Whether `root` has an open batch bracket.
    pub fn is_batching(&self, root: NodeId) -> bool {
        self.batches.contains_key(root)
    }

    fn open_batch(&mut self, root: NodeId) {
        if let Some(batch) = self.batches.get_mut(root) {
            batch.depth += 1;
            return;
        }
        self.batches.insert(
            root,
            PendingBatch {
                depth: 1,
                reducer: ChangeReducer::new(self.config.reload_threshold),
            },
        );
        tracing::debug!(target: targets::CHANGES, ?root, "opened batch");
        self.notify(root, |observer, _| observer.will_perform_batch());
    }

    fn close_batch(&mut self, root: NodeId) -> ChangeSet {
        let Some(batch) = self.batches.get_mut(root) else {
            // The root was destroyed inside its own batch.
            return ChangeSet::new();
        };
        batch.depth -= 1;
        if batch.depth > 0 {
            return batch.reducer.snapshot();
        }
        let changes = self
            .batches
            .remove(root)
            .map(|batch| batch.reducer.finish())
            .unwrap_or_default();
        tracing::debug!(
            target: targets::CHANGES,
            ?root,
            operations = changes.operation_count(),
            reload = !changes.has_incremental_changes(),
            "closed batch"
        );

        let _span = tracing::trace_span!(target: targets::CHANGES, "dispatch", ?root).entered();
        self.notify(root, |observer, source| {
            changes.apply_to(observer, source);
            observer.did_perform_batch();
        });
        if !changes.is_empty() {
            self.signals.changes_committed.emit((root, changes.clone()));
        }
        changes
    }
}
