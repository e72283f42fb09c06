use anyhow::{Result, bail};
use clap::Subcommand;
use convoscript::v1::ops::{PhasePatch, TopicPatch};
use convoscript::v1::{ActionKind, Edit};
use convoscript_editor::EditorSession;
use std::path::PathBuf;
use tracing::warn;

use crate::input::{compute_diff, display_name, read_script, write_atomic};

#[derive(Subcommand, Debug)]
pub enum EditOp {
    /// Append a new Phase
    AddPhase,
    /// Append a new Topic to a Phase
    AddTopic {
        /// Phase index
        phase: usize,
    },
    /// Append a new Action to a Topic
    AddAction {
        phase: usize,
        topic: usize,
        /// Action kind, e.g. ai_say, ai_ask, use_skill
        #[arg(short, long, default_value = "ai_say")]
        kind: ActionKind,
    },
    /// Remove a Phase
    DeletePhase { phase: usize },
    /// Remove a Topic
    DeleteTopic { phase: usize, topic: usize },
    /// Remove an Action (the last Action of a Topic cannot be removed)
    DeleteAction {
        phase: usize,
        topic: usize,
        action: usize,
    },
    /// Move a Phase to another position
    MovePhase { from: usize, to: usize },
    /// Move a Topic, given as PHASE.TOPIC
    MoveTopic {
        #[arg(value_parser = parse_pair)]
        from: (usize, usize),
        #[arg(value_parser = parse_pair)]
        to: (usize, usize),
    },
    /// Move an Action, given as PHASE.TOPIC.ACTION
    MoveAction {
        #[arg(value_parser = parse_triple)]
        from: (usize, usize, usize),
        #[arg(value_parser = parse_triple)]
        to: (usize, usize, usize),
    },
    /// Rename a Phase
    RenamePhase { phase: usize, name: String },
    /// Rename a Topic
    RenameTopic {
        phase: usize,
        topic: usize,
        name: String,
    },
}

impl From<EditOp> for Edit {
    fn from(op: EditOp) -> Self {
        match op {
            EditOp::AddPhase => Edit::AddPhase,
            EditOp::AddTopic { phase } => Edit::AddTopic { phase },
            EditOp::AddAction { phase, topic, kind } => Edit::AddAction { phase, topic, kind },
            EditOp::DeletePhase { phase } => Edit::DeletePhase { phase },
            EditOp::DeleteTopic { phase, topic } => Edit::DeleteTopic { phase, topic },
            EditOp::DeleteAction {
                phase,
                topic,
                action,
            } => Edit::DeleteAction {
                phase,
                topic,
                action,
            },
            EditOp::MovePhase { from, to } => Edit::MovePhase { from, to },
            EditOp::MoveTopic { from, to } => Edit::MoveTopic {
                from_phase: from.0,
                from_topic: from.1,
                to_phase: to.0,
                to_topic: to.1,
            },
            EditOp::MoveAction { from, to } => Edit::MoveAction { from, to },
            EditOp::RenamePhase { phase, name } => Edit::UpdatePhase {
                phase,
                patch: PhasePatch::name(name),
            },
            EditOp::RenameTopic { phase, topic, name } => Edit::UpdateTopic {
                phase,
                topic,
                patch: TopicPatch::name(name),
            },
        }
    }
}

fn parse_indices(s: &str, expected: usize) -> std::result::Result<Vec<usize>, String> {
    let parts = s
        .split('.')
        .map(|p| p.parse::<usize>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if parts.len() != expected {
        return Err(format!("expected {expected} dot-separated indices, got {s:?}"));
    }
    Ok(parts)
}

fn parse_pair(s: &str) -> std::result::Result<(usize, usize), String> {
    let p = parse_indices(s, 2)?;
    Ok((p[0], p[1]))
}

fn parse_triple(s: &str) -> std::result::Result<(usize, usize, usize), String> {
    let p = parse_indices(s, 3)?;
    Ok((p[0], p[1], p[2]))
}

pub fn run(input: PathBuf, op: EditOp, write: bool, diff: bool) -> Result<()> {
    if write && diff {
        bail!("--write and --diff cannot be combined");
    }
    let original = read_script(&input)?;
    let name = display_name(&input);
    let edited = apply(&name, &original, op.into())?;

    if diff {
        if let Some(diff) = compute_diff(&original, &edited, &name) {
            print!("{diff}");
        }
    } else if write {
        write_atomic(&input, &edited)?;
    } else {
        print!("{edited}");
    }
    Ok(())
}

/// Apply one edit to a script's text through an editor session.
fn apply(name: &str, text: &str, edit: Edit) -> Result<String> {
    let mut session = EditorSession::default();
    let file = session.open_file(name, name, text);
    if let Some(e) = file.parse_error() {
        bail!("{name} does not parse: {e}");
    }

    match session.apply(edit) {
        Ok(file) => Ok(file.text().to_string()),
        Err(e) if e.is_warning() => {
            warn!("{e}");
            bail!("edit refused: {e}")
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "\
session:
  session_id: demo
  phases:
    - phase_id: intro
      topics:
        - topic_id: hello
          actions:
            - action_type: ai_say
              action_id: greet
              config:
                content: Hello
";

    #[test]
    fn test_parse_triple() {
        assert_eq!(parse_triple("0.1.2"), Ok((0, 1, 2)));
        assert!(parse_triple("0.1").is_err());
        assert!(parse_triple("a.b.c").is_err());
        assert_eq!(parse_pair("3.4"), Ok((3, 4)));
    }

    #[test]
    fn test_apply_add_action() {
        let out = apply(
            "demo.yaml",
            SCRIPT,
            Edit::AddAction {
                phase: 0,
                topic: 0,
                kind: ActionKind::AiAsk,
            },
        )
        .unwrap();
        assert!(out.contains("action_id: greet"));
        assert!(out.contains("action_type: ai_ask"));
        assert!(out.starts_with("session:"));
    }

    #[test]
    fn test_apply_refused() {
        let err = apply(
            "demo.yaml",
            SCRIPT,
            Edit::DeleteAction {
                phase: 0,
                topic: 0,
                action: 0,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_apply_rename_phase() {
        let edit: Edit = EditOp::RenamePhase {
            phase: 0,
            name: "Warm-up".into(),
        }
        .into();
        let out = apply("demo.yaml", SCRIPT, edit).unwrap();
        assert!(out.contains("phase_name: Warm-up"));
    }
}
