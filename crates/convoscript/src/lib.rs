#![doc = include_str!("../README.md")]

mod action;
mod codec;
mod error;
mod focus;
mod history;
mod ops;
mod repair;
mod types;

pub use error::{FormatError, OpError, ParseError, SerializeError, UnknownActionKind};

/// Crate-level result alias for parse failures.
pub type Result<T, E = ParseError> = std::result::Result<T, E>;

pub mod v1 {
    //! Versioned public API for conversation scripts.
    //!
    //! Everything you need is re-exported from this module:
    //!
    //! # Tree
    //!
    //! - [`Phase`], [`Topic`], [`Action`]: the three levels of a script
    //! - [`ActionBody`] and its variants: the kind-specific fields
    //! - [`OutputField`], [`Variable`]: variable bindings and declarations
    //!
    //! # Text
    //!
    //! - [`parse_document`] / [`serialize_document`]: text to tree and back,
    //!   keeping unmodeled fields through a [`Baseline`]
    //! - [`repair_indentation`], [`format_text`], [`is_repairable`]: recovery from common
    //!   indentation mistakes
    //!
    //! # Editing
    //!
    //! - [`ops`]: validated structural edits, and [`Edit`] to name one
    //! - [`HistorySession`]: cross-file undo/redo
    //! - [`FocusPath`], [`FocusNavigator`]: restoring selection after undo/redo
    //!
    //! # Example: add an Action and write it back
    //!
    //! ```
    //! use convoscript::v1::*;
    //!
    //! let text = "\
    //! session:
    //!   session_id: intro
    //!   phases:
    //!     - phase_id: p1
    //!       topics:
    //!         - topic_id: t1
    //!           actions:
    //!             - action_id: a1
    //!               action_type: ai_say
    //!               config:
    //!                 content: Hello
    //! ";
    //!
    //! let parsed = parse_document(text).unwrap();
    //! let tree = ops::add_action(&parsed.tree, 0, 0, ActionKind::AiAsk).unwrap();
    //! let out = serialize_document(&tree, Some(&parsed.baseline), None).unwrap();
    //!
    //! assert!(out.text.contains("Please enter a question"));
    //! assert_eq!(parse_document(&out.text).unwrap().tree, tree);
    //! ```

    /// Validated structural edits over a tree.
    ///
    /// Each function borrows the tree and returns a new one, or an
    /// [`OpError`](crate::OpError) with the input untouched.
    pub mod ops {
        pub use crate::ops::{
            ActionPatch, Edit, OpResult, PhasePatch, TopicPatch, add_action, add_phase,
            add_topic, default_phase, default_topic, delete_action, delete_phase, delete_topic,
            move_action, move_phase, move_topic, update_action, update_phase, update_topic,
        };
    }
    pub use crate::action::{
        Action, ActionBody, ActionKind, AiAsk, AiSay, AiThink, Line, NodeStyle, Opaque, ShowForm,
        ShowPic, UnmodeledFields, UseSkill, to_model, to_raw,
    };
    pub use crate::codec::{
        Baseline, DocumentShape, LEGACY_PHASE_ID, LEGACY_TOPIC_ID, Parsed, Serialized,
        parse_document, serialize_document,
    };
    pub use crate::error::{FormatError, OpError, ParseError, SerializeError, UnknownActionKind};
    pub use crate::focus::{Command, FocusNavigator, FocusPath};
    pub use crate::history::{
        DEFAULT_CAPACITY, Direction, EntrySummary, HistoryEntry, HistorySession, HistoryState,
        Replay,
    };
    pub use crate::ops::Edit;
    pub use crate::repair::{Formatted, format_text, is_repairable, repair_indentation};
    pub use crate::types::{FileId, OutputField, Phase, Summary, Topic, Tree, Variable, summarize};
}
