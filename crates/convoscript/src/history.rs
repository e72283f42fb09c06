//! Cross-file undo/redo history.
//!
//! One [`HistorySession`] serves every file of a document collection. Each
//! entry stores full before/after snapshots of one file's tree plus the focus
//! on either side, so undo/redo can restore both data and selection even
//! when the entry belongs to a file that is not currently open.
//!
//! # Cursor
//!
//! The cursor points at the most recently applied entry. Undo hands back
//! that entry (apply its `before`) and steps back; redo steps forward and
//! hands back the entry it lands on (apply its `after`). An entry marked
//! `initial` records the state a file was opened in and is never undone.
//!
//! # Replay state
//!
//! While an undo or redo is being applied the session is in
//! [`HistoryState::ApplyingUndo`] or [`HistoryState::ApplyingRedo`] and
//! ignores pushes, so re-rendering a snapshot cannot record itself. The
//! state returns to `Idle` on [`HistorySession::settle`], or when the
//! [`Replay`] guard is dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::focus::FocusPath;
use crate::types::{FileId, Tree, summarize};

/// Default number of entries kept.
pub const DEFAULT_CAPACITY: usize = 100;

pub const INITIAL_LABEL: &str = "Initial state";

/// One undoable change to one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub file_id: FileId,
    pub file_name: String,
    pub before: Tree,
    pub after: Tree,
    pub before_focus: Option<FocusPath>,
    pub after_focus: Option<FocusPath>,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    /// Snapshot of a freshly opened file rather than an edit.
    pub initial: bool,
}

impl HistoryEntry {
    pub fn new(
        file_id: FileId,
        file_name: impl Into<String>,
        before: Tree,
        after: Tree,
        label: impl Into<String>,
    ) -> Self {
        Self {
            file_id,
            file_name: file_name.into(),
            before,
            after,
            before_focus: None,
            after_focus: None,
            label: label.into(),
            timestamp: Utc::now(),
            initial: false,
        }
    }

    /// The state a file was opened in.
    pub fn initial(file_id: FileId, file_name: impl Into<String>, tree: Tree) -> Self {
        Self {
            initial: true,
            ..Self::new(file_id, file_name, Vec::new(), tree, INITIAL_LABEL)
        }
    }

    pub fn with_focus(mut self, before: Option<FocusPath>, after: Option<FocusPath>) -> Self {
        self.before_focus = before;
        self.after_focus = after;
        self
    }
}

/// Whether a snapshot is currently being re-applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryState {
    #[default]
    Idle,
    ApplyingUndo,
    ApplyingRedo,
}

/// Which way a [`Replay`] moved the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Undo,
    Redo,
}

/// One line of [`HistorySession::summary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub index: usize,
    pub label: String,
    pub file_name: String,
    pub timestamp: DateTime<Utc>,
    pub current: bool,
}

/// Undo/redo stack with a cursor and a replay state machine.
#[derive(Debug, Clone)]
pub struct HistorySession {
    entries: Vec<HistoryEntry>,
    cursor: Option<usize>,
    capacity: usize,
    state: HistoryState,
}

impl Default for HistorySession {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl HistorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session keeping at most `capacity` entries (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: None,
            capacity: capacity.max(1),
            state: HistoryState::Idle,
        }
    }

    /// Record an entry. Everything after the cursor is discarded first, and
    /// the oldest entries are dropped past capacity. Ignored (returns
    /// `false`) while a replay is in progress.
    pub fn push(&mut self, entry: HistoryEntry) -> bool {
        if self.state != HistoryState::Idle {
            debug!(state = ?self.state, label = %entry.label, "ignoring push during replay");
            return false;
        }

        let keep = self.cursor.map_or(0, |c| c + 1);
        if keep < self.entries.len() {
            debug!(dropped = self.entries.len() - keep, "truncating redo branch");
            self.entries.truncate(keep);
        }

        debug!(
            label = %entry.label,
            file = %entry.file_name,
            before = %summarize(&entry.before),
            after = %summarize(&entry.after),
            "history push"
        );
        self.entries.push(entry);

        if self.entries.len() > self.capacity {
            let excess = self.entries.len() - self.capacity;
            self.entries.drain(..excess);
        }
        self.cursor = Some(self.entries.len() - 1);
        true
    }

    /// Record the opening state of a file. Only recorded into an empty
    /// history, so the first file opened becomes the undo floor.
    pub fn push_initial(&mut self, file_id: FileId, file_name: &str, tree: &Tree) -> bool {
        if !self.entries.is_empty() {
            return false;
        }
        self.push(HistoryEntry::initial(file_id, file_name, tree.clone()))
    }

    pub fn can_undo(&self) -> bool {
        self.cursor
            .and_then(|c| self.entries.get(c).filter(|_| c > 0))
            .is_some_and(|e| !e.initial)
    }

    pub fn can_redo(&self) -> bool {
        self.next_index().is_some()
    }

    /// The entry [`undo`](Self::undo) would return.
    pub fn peek_undo(&self) -> Option<&HistoryEntry> {
        if !self.can_undo() {
            return None;
        }
        self.entries.get(self.cursor?)
    }

    /// The entry [`redo`](Self::redo) would return.
    pub fn peek_redo(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.next_index()?)
    }

    /// Step back. Returns the entry whose `before` the caller must apply and
    /// enters [`HistoryState::ApplyingUndo`] until [`settle`](Self::settle).
    pub fn undo(&mut self) -> Option<HistoryEntry> {
        if self.state != HistoryState::Idle {
            return None;
        }
        let entry = self.peek_undo()?.clone();
        let cursor = self.cursor?;
        self.cursor = Some(cursor - 1);
        self.state = HistoryState::ApplyingUndo;
        debug!(label = %entry.label, from = cursor, to = cursor - 1, "history undo");
        Some(entry)
    }

    /// Step forward. Returns the entry whose `after` the caller must apply
    /// and enters [`HistoryState::ApplyingRedo`] until [`settle`](Self::settle).
    pub fn redo(&mut self) -> Option<HistoryEntry> {
        if self.state != HistoryState::Idle {
            return None;
        }
        let next = self.next_index()?;
        let entry = self.entries[next].clone();
        debug!(label = %entry.label, from = ?self.cursor, to = next, "history redo");
        self.cursor = Some(next);
        self.state = HistoryState::ApplyingRedo;
        Some(entry)
    }

    /// Leave the replay state. Call once the re-applied snapshot has been
    /// rendered.
    pub fn settle(&mut self) {
        self.state = HistoryState::Idle;
    }

    /// [`undo`](Self::undo) with a guard that settles on drop. The session
    /// stays borrowed, so nothing can push while the guard lives.
    pub fn replay_undo(&mut self) -> Option<Replay<'_>> {
        let entry = self.undo()?;
        Some(Replay {
            session: self,
            entry,
            direction: Direction::Undo,
        })
    }

    /// [`redo`](Self::redo) with a guard that settles on drop.
    pub fn replay_redo(&mut self) -> Option<Replay<'_>> {
        let entry = self.redo()?;
        Some(Replay {
            session: self,
            entry,
            direction: Direction::Redo,
        })
    }

    /// Drop every entry and return to `Idle`.
    pub fn clear(&mut self) {
        debug!(dropped = self.entries.len(), "history cleared");
        self.entries.clear();
        self.cursor = None;
        self.state = HistoryState::Idle;
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor?)
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn state(&self) -> HistoryState {
        self.state
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> Vec<EntrySummary> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, e)| EntrySummary {
                index,
                label: e.label.clone(),
                file_name: e.file_name.clone(),
                timestamp: e.timestamp,
                current: self.cursor == Some(index),
            })
            .collect()
    }

    fn next_index(&self) -> Option<usize> {
        let next = self.cursor.map_or(0, |c| c + 1);
        (next < self.entries.len()).then_some(next)
    }
}

/// An undo or redo in progress. Settles the session when dropped.
#[derive(Debug)]
pub struct Replay<'a> {
    session: &'a mut HistorySession,
    entry: HistoryEntry,
    direction: Direction,
}

impl Replay<'_> {
    pub fn entry(&self) -> &HistoryEntry {
        &self.entry
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The tree to apply: `before` for undo, `after` for redo.
    pub fn tree(&self) -> &Tree {
        match self.direction {
            Direction::Undo => &self.entry.before,
            Direction::Redo => &self.entry.after,
        }
    }

    /// The focus to restore alongside [`tree`](Self::tree).
    pub fn focus(&self) -> Option<FocusPath> {
        match self.direction {
            Direction::Undo => self.entry.before_focus,
            Direction::Redo => self.entry.after_focus,
        }
    }

    pub fn state(&self) -> HistoryState {
        self.session.state
    }

    /// Settle now rather than at the end of scope.
    pub fn settle(self) {}
}

impl Drop for Replay<'_> {
    fn drop(&mut self) {
        self.session.settle();
    }
}
