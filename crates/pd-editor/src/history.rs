//! Undo/redo history.
//!
//! Every content mutation records the tree as it was *before* the change.
//! Undo swaps the live tree with the newest past snapshot and keeps the
//! displaced tree for redo, so `undo` followed by `redo` reproduces the
//! exact tree the user saw.
//!
//! Drag gestures use **snapshot batching**: the tree is captured when the
//! gesture starts and the whole gesture undoes in a single step, however
//! many moves it emitted.

use pd_core::{ComponentTree, TreeStore};

/// One undo (or redo) step: the tree to restore and what produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub snapshot: ComponentTree,
    pub description: String,
}

/// Bounded past/future stacks around the live tree held by a `TreeStore`.
pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    /// Maximum undo depth; the oldest entry is dropped beyond it.
    max_depth: usize,
    /// Batch nesting depth (0 = not batching).
    batch_depth: usize,
    /// Tree captured at the start of the outermost batch.
    batch_snapshot: Option<HistoryEntry>,
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth.min(64)),
            redo_stack: Vec::new(),
            max_depth,
            batch_depth: 0,
            batch_snapshot: None,
        }
    }

    /// Record the pre-mutation tree. Clears redo. Inside a batch this is
    /// absorbed by the batch snapshot.
    pub fn record(&mut self, before: ComponentTree, description: &str) {
        if self.batch_depth > 0 {
            return;
        }
        self.push_undo(HistoryEntry {
            snapshot: before,
            description: description.to_string(),
        });
    }

    /// Restore the newest past tree. Returns the undone step's description,
    /// or `None` if there is nothing to undo (or a gesture is in progress).
    pub fn undo(&mut self, store: &mut TreeStore) -> Option<String> {
        if self.batch_depth > 0 {
            log::debug!("undo ignored while a gesture is in progress");
            return None;
        }
        let entry = self.undo_stack.pop()?;
        let current = store.snapshot();
        store.restore(entry.snapshot);
        self.redo_stack.push(HistoryEntry {
            snapshot: current,
            description: entry.description.clone(),
        });
        Some(entry.description)
    }

    /// Re-apply the newest undone step.
    pub fn redo(&mut self, store: &mut TreeStore) -> Option<String> {
        if self.batch_depth > 0 {
            log::debug!("redo ignored while a gesture is in progress");
            return None;
        }
        let entry = self.redo_stack.pop()?;
        let current = store.snapshot();
        store.restore(entry.snapshot);
        self.undo_stack.push(HistoryEntry {
            snapshot: current,
            description: entry.description.clone(),
        });
        Some(entry.description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|e| e.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|e| e.description.as_str())
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    /// Start a gesture. Nested calls extend the outermost gesture.
    pub fn begin_batch(&mut self, store: &TreeStore, description: &str) {
        if self.batch_depth == 0 {
            self.batch_snapshot = Some(HistoryEntry {
                snapshot: store.snapshot(),
                description: description.to_string(),
            });
        }
        self.batch_depth += 1;
    }

    /// End a gesture. When the outermost batch closes and the tree actually
    /// changed, one step is recorded. Returns whether a step was recorded.
    pub fn end_batch(&mut self, store: &TreeStore) -> bool {
        if self.batch_depth == 0 {
            return false;
        }
        self.batch_depth -= 1;
        if self.batch_depth > 0 {
            return false;
        }
        match self.batch_snapshot.take() {
            Some(entry) if entry.snapshot != *store.tree() => {
                self.push_undo(entry);
                true
            }
            _ => false,
        }
    }

    /// Forget all history, e.g. when another document is loaded.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch_depth = 0;
        self.batch_snapshot = None;
    }

    fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);
        if self.undo_stack.len() > self.max_depth {
            let excess = self.undo_stack.len() - self.max_depth;
            self.undo_stack.drain(..excess);
        }
        // New action: the old future is unreachable.
        self.redo_stack.clear();
    }
}
