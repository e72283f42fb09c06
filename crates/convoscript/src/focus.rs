//! Focus paths and the commands that restore them.
//!
//! A [`FocusPath`] is positional: it names a node by its indices in the tree
//! at the time of an edit. [`FocusNavigator::plan`] turns one into the
//! ordered UI commands that bring the node back into view, starting with a
//! file switch when the node lives in another file.

use serde::Serialize;

use crate::types::{FileId, Phase};

/// Positional pointer to one node of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FocusPath {
    Phase {
        phase_index: usize,
    },
    Topic {
        phase_index: usize,
        topic_index: usize,
    },
    Action {
        phase_index: usize,
        topic_index: usize,
        action_index: usize,
    },
}

impl FocusPath {
    pub fn phase(phase_index: usize) -> Self {
        FocusPath::Phase { phase_index }
    }

    pub fn topic(phase_index: usize, topic_index: usize) -> Self {
        FocusPath::Topic {
            phase_index,
            topic_index,
        }
    }

    pub fn action(phase_index: usize, topic_index: usize, action_index: usize) -> Self {
        FocusPath::Action {
            phase_index,
            topic_index,
            action_index,
        }
    }

    pub fn phase_index(&self) -> usize {
        match *self {
            FocusPath::Phase { phase_index }
            | FocusPath::Topic { phase_index, .. }
            | FocusPath::Action { phase_index, .. } => phase_index,
        }
    }

    /// The containing node, if any.
    pub fn parent(&self) -> Option<FocusPath> {
        match *self {
            FocusPath::Phase { .. } => None,
            FocusPath::Topic { phase_index, .. } => Some(FocusPath::phase(phase_index)),
            FocusPath::Action {
                phase_index,
                topic_index,
                ..
            } => Some(FocusPath::topic(phase_index, topic_index)),
        }
    }

    /// Containers from the outermost down, excluding `self`.
    pub fn ancestors(&self) -> Vec<FocusPath> {
        let mut chain = Vec::new();
        let mut current = self.parent();
        while let Some(path) = current {
            chain.push(path);
            current = path.parent();
        }
        chain.reverse();
        chain
    }

    pub fn exists_in(&self, tree: &[Phase]) -> bool {
        match *self {
            FocusPath::Phase { phase_index } => phase_index < tree.len(),
            FocusPath::Topic {
                phase_index,
                topic_index,
            } => tree
                .get(phase_index)
                .is_some_and(|p| topic_index < p.topics.len()),
            FocusPath::Action {
                phase_index,
                topic_index,
                action_index,
            } => tree
                .get(phase_index)
                .and_then(|p| p.topics.get(topic_index))
                .is_some_and(|t| action_index < t.actions.len()),
        }
    }

    /// The path itself if it still exists in `tree`, else its nearest
    /// existing ancestor.
    pub fn resolve(&self, tree: &[Phase]) -> Option<FocusPath> {
        let mut current = Some(*self);
        while let Some(path) = current {
            if path.exists_in(tree) {
                return Some(path);
            }
            current = path.parent();
        }
        None
    }
}

/// A side effect for the UI shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Open another file. The shell must acknowledge when the file is live
    /// before the remaining commands are dispatched.
    SwitchFile { file: FileId },
    Select { path: FocusPath },
    Expand { path: FocusPath },
    ScrollIntoView { path: FocusPath },
}

/// Plans focus restoration. Holds no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct FocusNavigator;

impl FocusNavigator {
    /// Commands that put focus on `focus` inside `target`.
    ///
    /// Order: file switch (only when `target` is not `current`), select,
    /// expand each ancestor from the outside in, scroll into view. No focus
    /// means no commands at all.
    pub fn plan(
        focus: Option<FocusPath>,
        target: &FileId,
        current: Option<&FileId>,
    ) -> Vec<Command> {
        let Some(path) = focus else {
            return Vec::new();
        };

        let mut commands = Vec::new();
        if current != Some(target) {
            commands.push(Command::SwitchFile {
                file: target.clone(),
            });
        }
        commands.push(Command::Select { path });
        commands.extend(
            path.ancestors()
                .into_iter()
                .map(|path| Command::Expand { path }),
        );
        commands.push(Command::ScrollIntoView { path });
        commands
    }
}
