/// Default number of snapshots kept.
pub const DEFAULT_CAPACITY: usize = 50;

/// A labelled snapshot in the history.
#[derive(Debug, Clone)]
pub struct HistoryEntry<S> {
    pub label: String,
    pub snapshot: S,
}

/// Bounded snapshot history with a cursor.
///
/// Every entry is a full copy of the state after a completed gesture. The
/// cursor always points inside `[0, len - 1]` once anything was pushed.
/// Pushing after an undo drops the abandoned future; pushing past capacity
/// evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct History<S> {
    entries: Vec<HistoryEntry<S>>,
    index: usize,
    capacity: usize,
}

impl<S: Clone> History<S> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: 0,
            capacity: capacity.max(1),
        }
    }

    /// History holding a single baseline entry.
    pub fn with_baseline(capacity: usize, label: impl Into<String>, snapshot: S) -> Self {
        let mut history = Self::new(capacity);
        history.push(label, snapshot);
        history
    }

    /// Record `snapshot` as the newest state.
    pub fn push(&mut self, label: impl Into<String>, snapshot: S) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(HistoryEntry {
            label: label.into(),
            snapshot,
        });
        if self.entries.len() > self.capacity {
            self.entries.remove(0);
        }
        self.index = self.entries.len() - 1;

        tracing::debug!(
            label = %self.entries[self.index].label,
            depth = self.entries.len(),
            "History entry pushed"
        );
    }

    /// Step back one entry. Returns the snapshot to restore.
    pub fn undo(&mut self) -> Option<&S> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        tracing::debug!(index = self.index, "Undo");
        Some(&self.entries[self.index].snapshot)
    }

    /// Step forward one entry. Returns the snapshot to restore.
    pub fn redo(&mut self) -> Option<&S> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        tracing::debug!(index = self.index, "Redo");
        Some(&self.entries[self.index].snapshot)
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.index + 1 < self.entries.len()
    }

    /// Label of the action an undo would revert.
    pub fn undo_description(&self) -> Option<&str> {
        if self.can_undo() {
            Some(self.entries[self.index].label.as_str())
        } else {
            None
        }
    }

    /// Label of the action a redo would reapply.
    pub fn redo_description(&self) -> Option<&str> {
        if self.can_redo() {
            Some(self.entries[self.index + 1].label.as_str())
        } else {
            None
        }
    }

    pub fn current(&self) -> Option<&S> {
        self.entries.get(self.index).map(|e| &e.snapshot)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forget everything and start over from `snapshot`.
    pub fn reset(&mut self, label: impl Into<String>, snapshot: S) {
        self.entries.clear();
        self.index = 0;
        self.push(label, snapshot);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
