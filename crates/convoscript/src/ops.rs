//! Validated structural edits over a [`Tree`].
//!
//! Every operation borrows the current tree and returns a new one. On error
//! nothing was changed: the caller still holds the tree it passed in.

use serde::Serialize;

use crate::action::{Action, ActionBody, ActionKind};
use crate::error::OpError;
use crate::focus::FocusPath;
use crate::types::{Phase, Topic, Tree, Variable};

/// Result alias for mutation operations.
pub type OpResult = Result<Tree, OpError>;

const LAST_ACTION_WARNING: &str = "At least one Action is required";

// ============================================================================
// Defaults
// ============================================================================

/// The Phase appended by [`add_phase`] at 1-based position `n`.
pub fn default_phase(n: usize) -> Phase {
    Phase::new(format!("phase_{n}"))
        .with_name(format!("New Phase {n}"))
        .with_topic(default_topic(1))
}

/// The Topic appended by [`add_topic`] at 1-based position `n`.
pub fn default_topic(n: usize) -> Topic {
    Topic::new(format!("topic_{n}"))
        .with_name(format!("New Topic {n}"))
        .with_action(Action::new_default(ActionKind::AiSay, 1))
}

// ============================================================================
// Patches
// ============================================================================

/// Field updates for a Phase. `None` leaves a field alone; `Some(None)`
/// clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhasePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopicPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_variables: Option<Vec<Variable>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Option<String>>,
    /// Replaces the kind-specific fields. May change the kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<ActionBody>,
}

impl PhasePatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(Some(name.into())),
            ..Default::default()
        }
    }
}

impl TopicPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(Some(name.into())),
            ..Default::default()
        }
    }
}

impl ActionPatch {
    pub fn body(body: ActionBody) -> Self {
        Self {
            body: Some(body),
            ..Default::default()
        }
    }
}

fn patch_text(slot: &mut Option<String>, value: &Option<Option<String>>) {
    if let Some(value) = value {
        *slot = value.clone().filter(|s| !s.is_empty());
    }
}

// ============================================================================
// Phase operations
// ============================================================================

/// Append a default Phase with one default Topic and Action.
pub fn add_phase(tree: &[Phase]) -> OpResult {
    let mut next = tree.to_vec();
    next.push(default_phase(tree.len() + 1));
    Ok(next)
}

pub fn delete_phase(tree: &[Phase], index: usize) -> OpResult {
    check_phase(tree, index)?;
    let mut next = tree.to_vec();
    next.remove(index);
    Ok(next)
}

pub fn update_phase(tree: &[Phase], index: usize, patch: &PhasePatch) -> OpResult {
    check_phase(tree, index)?;
    let mut next = tree.to_vec();
    let phase = &mut next[index];
    if let Some(id) = &patch.id {
        phase.id = id.clone();
    }
    patch_text(&mut phase.name, &patch.name);
    patch_text(&mut phase.description, &patch.description);
    Ok(next)
}

/// Move the Phase at `from` so it ends up at `to`.
pub fn move_phase(tree: &[Phase], from: usize, to: usize) -> OpResult {
    check_phase(tree, from)?;
    check_bound("target Phase", to, tree.len())?;
    let mut next = tree.to_vec();
    let phase = next.remove(from);
    next.insert(to, phase);
    Ok(next)
}

// ============================================================================
// Topic operations
// ============================================================================

/// Append a default Topic to the Phase at `phase`.
pub fn add_topic(tree: &[Phase], phase: usize) -> OpResult {
    check_phase(tree, phase)?;
    let mut next = tree.to_vec();
    let topics = &mut next[phase].topics;
    topics.push(default_topic(topics.len() + 1));
    Ok(next)
}

pub fn delete_topic(tree: &[Phase], phase: usize, topic: usize) -> OpResult {
    check_topic(tree, phase, topic)?;
    let mut next = tree.to_vec();
    next[phase].topics.remove(topic);
    Ok(next)
}

pub fn update_topic(tree: &[Phase], phase: usize, topic: usize, patch: &TopicPatch) -> OpResult {
    check_topic(tree, phase, topic)?;
    let mut next = tree.to_vec();
    let target = &mut next[phase].topics[topic];
    if let Some(id) = &patch.id {
        target.id = id.clone();
    }
    patch_text(&mut target.name, &patch.name);
    patch_text(&mut target.description, &patch.description);
    if let Some(vars) = &patch.local_variables {
        target.local_variables = vars.clone();
    }
    Ok(next)
}

/// Move a Topic, possibly into another Phase. `to_topic` may equal the
/// target Phase's Topic count to append.
pub fn move_topic(
    tree: &[Phase],
    from_phase: usize,
    from_topic: usize,
    to_phase: usize,
    to_topic: usize,
) -> OpResult {
    check_topic(tree, from_phase, from_topic)?;
    check_bound("target Phase", to_phase, tree.len())?;
    check_bound("target Topic", to_topic, tree[to_phase].topics.len() + 1)?;

    let mut next = tree.to_vec();
    let moved = next[from_phase].topics.remove(from_topic);
    let topics = &mut next[to_phase].topics;
    let at = to_topic.min(topics.len());
    topics.insert(at, moved);
    Ok(next)
}

// ============================================================================
// Action operations
// ============================================================================

/// Append a default Action of `kind`.
pub fn add_action(tree: &[Phase], phase: usize, topic: usize, kind: ActionKind) -> OpResult {
    check_topic(tree, phase, topic)?;
    let mut next = tree.to_vec();
    let actions = &mut next[phase].topics[topic].actions;
    actions.push(Action::new_default(kind, actions.len() + 1));
    Ok(next)
}

/// Delete an Action. Refused (a warning, not an error) when it is the
/// Topic's only Action.
pub fn delete_action(tree: &[Phase], phase: usize, topic: usize, action: usize) -> OpResult {
    check_action(tree, phase, topic, action)?;
    if tree[phase].topics[topic].actions.len() <= 1 {
        return Err(OpError::Refused(LAST_ACTION_WARNING.into()));
    }
    let mut next = tree.to_vec();
    next[phase].topics[topic].actions.remove(action);
    Ok(next)
}

/// Update an Action's fields. Opaque actions cannot be edited.
pub fn update_action(
    tree: &[Phase],
    phase: usize,
    topic: usize,
    action: usize,
    patch: &ActionPatch,
) -> OpResult {
    check_action(tree, phase, topic, action)?;
    let current = &tree[phase].topics[topic].actions[action];
    if !current.is_editable() {
        return Err(OpError::Refused(format!(
            "action {} has an unrecognised type and is read-only",
            current.id.as_deref().unwrap_or("(unnamed)")
        )));
    }
    if matches!(patch.body, Some(ActionBody::Opaque(_))) {
        return Err(OpError::Refused(
            "an action cannot be turned into an opaque node".into(),
        ));
    }

    let mut next = tree.to_vec();
    let target = &mut next[phase].topics[topic].actions[action];
    if let Some(id) = &patch.id {
        target.id = id.clone();
    }
    if let Some(condition) = &patch.condition {
        target.condition = condition.clone();
    }
    if let Some(body) = &patch.body {
        target.set_body(body.clone());
    }
    target.normalize();
    Ok(next)
}

/// Move an Action, possibly into another Topic or Phase. `to_action` may
/// equal the target Topic's Action count to append.
pub fn move_action(
    tree: &[Phase],
    from: (usize, usize, usize),
    to: (usize, usize, usize),
) -> OpResult {
    let (fp, ft, fa) = from;
    let (tp, tt, ta) = to;
    check_action(tree, fp, ft, fa)?;
    check_bound("target Phase", tp, tree.len())?;
    check_bound("target Topic", tt, tree[tp].topics.len())?;
    check_bound("target Action", ta, tree[tp].topics[tt].actions.len() + 1)?;

    let mut next = tree.to_vec();
    let moved = next[fp].topics[ft].actions.remove(fa);
    let actions = &mut next[tp].topics[tt].actions;
    let at = ta.min(actions.len());
    actions.insert(at, moved);
    Ok(next)
}

// ============================================================================
// Bounds
// ============================================================================

fn check_bound(target: &'static str, index: usize, len: usize) -> Result<(), OpError> {
    if index < len {
        Ok(())
    } else {
        Err(OpError::bounds(target, index, len))
    }
}

fn check_phase(tree: &[Phase], phase: usize) -> Result<(), OpError> {
    check_bound("Phase", phase, tree.len())
}

fn check_topic(tree: &[Phase], phase: usize, topic: usize) -> Result<(), OpError> {
    check_phase(tree, phase)?;
    check_bound("Topic", topic, tree[phase].topics.len())
}

fn check_action(tree: &[Phase], phase: usize, topic: usize, action: usize) -> Result<(), OpError> {
    check_topic(tree, phase, topic)?;
    check_bound("Action", action, tree[phase].topics[topic].actions.len())
}

// ============================================================================
// Edit
// ============================================================================

/// One structural edit, as recorded in history and issued by front ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    AddPhase,
    DeletePhase {
        phase: usize,
    },
    UpdatePhase {
        phase: usize,
        patch: PhasePatch,
    },
    MovePhase {
        from: usize,
        to: usize,
    },
    AddTopic {
        phase: usize,
    },
    DeleteTopic {
        phase: usize,
        topic: usize,
    },
    UpdateTopic {
        phase: usize,
        topic: usize,
        patch: TopicPatch,
    },
    MoveTopic {
        from_phase: usize,
        from_topic: usize,
        to_phase: usize,
        to_topic: usize,
    },
    AddAction {
        phase: usize,
        topic: usize,
        kind: ActionKind,
    },
    DeleteAction {
        phase: usize,
        topic: usize,
        action: usize,
    },
    UpdateAction {
        phase: usize,
        topic: usize,
        action: usize,
        patch: ActionPatch,
    },
    MoveAction {
        from: (usize, usize, usize),
        to: (usize, usize, usize),
    },
}

impl Edit {
    pub fn apply(&self, tree: &[Phase]) -> OpResult {
        match self {
            Edit::AddPhase => add_phase(tree),
            Edit::DeletePhase { phase } => delete_phase(tree, *phase),
            Edit::UpdatePhase { phase, patch } => update_phase(tree, *phase, patch),
            Edit::MovePhase { from, to } => move_phase(tree, *from, *to),
            Edit::AddTopic { phase } => add_topic(tree, *phase),
            Edit::DeleteTopic { phase, topic } => delete_topic(tree, *phase, *topic),
            Edit::UpdateTopic {
                phase,
                topic,
                patch,
            } => update_topic(tree, *phase, *topic, patch),
            Edit::MoveTopic {
                from_phase,
                from_topic,
                to_phase,
                to_topic,
            } => move_topic(tree, *from_phase, *from_topic, *to_phase, *to_topic),
            Edit::AddAction { phase, topic, kind } => add_action(tree, *phase, *topic, *kind),
            Edit::DeleteAction {
                phase,
                topic,
                action,
            } => delete_action(tree, *phase, *topic, *action),
            Edit::UpdateAction {
                phase,
                topic,
                action,
                patch,
            } => update_action(tree, *phase, *topic, *action, patch),
            Edit::MoveAction { from, to } => move_action(tree, *from, *to),
        }
    }

    /// Human-readable label for history lists.
    pub fn label(&self) -> String {
        match self {
            Edit::AddPhase => "Add Phase".into(),
            Edit::DeletePhase { .. } => "Delete Phase".into(),
            Edit::UpdatePhase { .. } => "Edit Phase".into(),
            Edit::MovePhase { .. } => "Move Phase".into(),
            Edit::AddTopic { .. } => "Add Topic".into(),
            Edit::DeleteTopic { .. } => "Delete Topic".into(),
            Edit::UpdateTopic { .. } => "Edit Topic".into(),
            Edit::MoveTopic { .. } => "Move Topic".into(),
            Edit::AddAction { kind, .. } => format!("Add {kind} Action"),
            Edit::DeleteAction { .. } => "Delete Action".into(),
            Edit::UpdateAction { .. } => "Edit Action".into(),
            Edit::MoveAction { .. } => "Move Action".into(),
        }
    }

    /// Where focus was when the edit was made.
    pub fn focus_before(&self) -> Option<FocusPath> {
        use FocusPath as F;
        Some(match *self {
            Edit::AddPhase => return None,
            Edit::DeletePhase { phase }
            | Edit::UpdatePhase { phase, .. }
            | Edit::MovePhase { from: phase, .. }
            | Edit::AddTopic { phase } => F::phase(phase),
            Edit::DeleteTopic { phase, topic }
            | Edit::UpdateTopic { phase, topic, .. }
            | Edit::AddAction { phase, topic, .. } => F::topic(phase, topic),
            Edit::MoveTopic {
                from_phase,
                from_topic,
                ..
            } => F::topic(from_phase, from_topic),
            Edit::DeleteAction {
                phase,
                topic,
                action,
            }
            | Edit::UpdateAction {
                phase,
                topic,
                action,
                ..
            } => F::action(phase, topic, action),
            Edit::MoveAction { from: (p, t, a), .. } => F::action(p, t, a),
        })
    }

    /// Where focus should land in `after`, the tree this edit produced.
    pub fn focus_after(&self, after: &[Phase]) -> Option<FocusPath> {
        use FocusPath as F;
        let last = |len: usize, at: usize| len.checked_sub(1).map(|max| at.min(max));
        let topics = |p: usize| after.get(p).map_or(0, |ph| ph.topics.len());
        let actions = |p: usize, t: usize| {
            after
                .get(p)
                .and_then(|ph| ph.topics.get(t))
                .map_or(0, |tp| tp.actions.len())
        };

        let focus = match *self {
            Edit::AddPhase => F::phase(after.len().checked_sub(1)?),
            Edit::DeletePhase { phase } => F::phase(last(after.len(), phase)?),
            Edit::UpdatePhase { phase, .. } => F::phase(phase),
            Edit::MovePhase { to, .. } => F::phase(to),
            Edit::AddTopic { phase } => F::topic(phase, topics(phase).checked_sub(1)?),
            Edit::DeleteTopic { phase, topic } => match last(topics(phase), topic) {
                Some(t) => F::topic(phase, t),
                None => F::phase(phase),
            },
            Edit::UpdateTopic { phase, topic, .. } => F::topic(phase, topic),
            Edit::MoveTopic {
                to_phase, to_topic, ..
            } => F::topic(to_phase, last(topics(to_phase), to_topic)?),
            Edit::AddAction { phase, topic, .. } => {
                F::action(phase, topic, actions(phase, topic).checked_sub(1)?)
            }
            Edit::DeleteAction {
                phase,
                topic,
                action,
            } => F::action(phase, topic, last(actions(phase, topic), action)?),
            Edit::UpdateAction {
                phase,
                topic,
                action,
                ..
            } => F::action(phase, topic, action),
            Edit::MoveAction { to: (p, t, a), .. } => F::action(p, t, last(actions(p, t), a)?),
        };
        focus.resolve(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::AiSay;
    use crate::codec::{parse_document, serialize_document};

    fn hello_tree() -> Tree {
        let action = Action::from_body(ActionBody::AiSay(AiSay {
            content: "Hello".into(),
            ..Default::default()
        }))
        .with_id("a1");
        vec![Phase::new("p1").with_topic(Topic::new("t1").with_action(action))]
    }

    #[test]
    fn test_add_ai_ask_roundtrips() {
        let tree = add_action(&hello_tree(), 0, 0, ActionKind::AiAsk).unwrap();
        let actions = &tree[0].topics[0].actions;
        assert_eq!(actions.len(), 2);
        let ActionBody::AiAsk(ask) = &actions[1].body else {
            panic!("expected ai_ask, got {:?}", actions[1].body);
        };
        assert_eq!(ask.content, "Please enter a question");
        assert!(ask.output.is_empty());
        assert_eq!(actions[1].id.as_deref(), Some("action_2"));

        let out = serialize_document(&tree, None, Some("s")).unwrap();
        let parsed = parse_document(&out.text).unwrap();
        assert_eq!(parsed.tree, tree);
    }

    #[test]
    fn test_move_action_out_of_bounds_leaves_tree() {
        let tree = add_action(&hello_tree(), 0, 0, ActionKind::AiAsk).unwrap();
        let snapshot = tree.clone();
        let err = move_action(&tree, (0, 0, 0), (0, 0, 5)).unwrap_err();
        assert_eq!(
            err,
            OpError::OutOfBounds {
                target: "target Action",
                index: 5,
                len: 3
            }
        );
        assert!(!err.is_warning());
        assert_eq!(tree, snapshot);
    }

    #[test]
    fn test_move_action_within_topic() {
        let tree = add_action(&hello_tree(), 0, 0, ActionKind::AiAsk).unwrap();
        let moved = move_action(&tree, (0, 0, 0), (0, 0, 2)).unwrap();
        let actions = &moved[0].topics[0].actions;
        assert_eq!(actions[0].kind(), Some(ActionKind::AiAsk));
        assert_eq!(actions[1].id.as_deref(), Some("a1"));
    }

    #[test]
    fn test_move_action_across_phases() {
        let tree = add_phase(&hello_tree()).unwrap();
        let moved = move_action(&tree, (0, 0, 0), (1, 0, 0)).unwrap();
        assert!(moved[0].topics[0].actions.is_empty());
        assert_eq!(moved[1].topics[0].actions.len(), 2);
        assert_eq!(moved[1].topics[0].actions[0].id.as_deref(), Some("a1"));
    }

    #[test]
    fn test_delete_last_action_is_a_warning() {
        let tree = hello_tree();
        let err = delete_action(&tree, 0, 0, 0).unwrap_err();
        assert!(err.is_warning());
        assert_eq!(err.to_string(), "At least one Action is required");
        assert_eq!(tree, hello_tree());
    }

    #[test]
    fn test_delete_action() {
        let tree = add_action(&hello_tree(), 0, 0, ActionKind::AiThink).unwrap();
        let next = delete_action(&tree, 0, 0, 0).unwrap();
        assert_eq!(next[0].topics[0].actions.len(), 1);
        assert_eq!(next[0].topics[0].actions[0].kind(), Some(ActionKind::AiThink));
    }

    #[test]
    fn test_add_phase_defaults() {
        let tree = add_phase(&hello_tree()).unwrap();
        let phase = &tree[1];
        assert_eq!(phase.id, "phase_2");
        assert_eq!(phase.name.as_deref(), Some("New Phase 2"));
        assert_eq!(phase.topics[0].id, "topic_1");
        assert_eq!(
            phase.topics[0].actions[0].body.primary_text(),
            Some("Please edit this content")
        );
    }

    #[test]
    fn test_add_topic_numbering() {
        let tree = add_topic(&hello_tree(), 0).unwrap();
        assert_eq!(tree[0].topics[1].id, "topic_2");
        assert_eq!(tree[0].topics[1].name.as_deref(), Some("New Topic 2"));
        assert!(add_topic(&tree, 3).is_err());
    }

    #[test]
    fn test_update_phase_clears_empty_name() {
        let tree = update_phase(&hello_tree(), 0, &PhasePatch::name("Intro")).unwrap();
        assert_eq!(tree[0].name.as_deref(), Some("Intro"));
        let tree = update_phase(&tree, 0, &PhasePatch::name("")).unwrap();
        assert_eq!(tree[0].name, None);
    }

    #[test]
    fn test_move_phase() {
        let tree = add_phase(&hello_tree()).unwrap();
        let moved = move_phase(&tree, 0, 1).unwrap();
        assert_eq!(moved[0].id, "phase_2");
        assert_eq!(moved[1].id, "p1");
        assert!(move_phase(&tree, 0, 2).is_err());
    }

    #[test]
    fn test_move_topic_across_phases_appends() {
        let tree = add_phase(&hello_tree()).unwrap();
        let moved = move_topic(&tree, 0, 0, 1, 1).unwrap();
        assert!(moved[0].topics.is_empty());
        assert_eq!(moved[1].topics[1].id, "t1");
        assert!(move_topic(&tree, 0, 0, 1, 2).is_err());
    }

    #[test]
    fn test_update_action_changes_kind() {
        let patch = ActionPatch::body(ActionBody::AiThink(crate::action::AiThink {
            content: "reflect".into(),
            output: Vec::new(),
        }));
        let tree = update_action(&hello_tree(), 0, 0, 0, &patch).unwrap();
        let action = &tree[0].topics[0].actions[0];
        assert_eq!(action.kind(), Some(ActionKind::AiThink));
        assert_eq!(action.id.as_deref(), Some("a1"));
    }

    #[test]
    fn test_update_opaque_action_is_refused() {
        let mut tree = hello_tree();
        let node: serde_yaml::Value = serde_yaml::from_str("action_type: teleport").unwrap();
        tree[0].topics[0].actions[0] = crate::action::to_model(&node);
        let patch = ActionPatch {
            condition: Some(Some("x > 1".into())),
            ..Default::default()
        };
        let err = update_action(&tree, 0, 0, 0, &patch).unwrap_err();
        assert!(err.is_warning());
    }

    #[test]
    fn test_edit_sequence_roundtrips() {
        let edits = [
            Edit::AddPhase,
            Edit::AddTopic { phase: 0 },
            Edit::AddAction {
                phase: 0,
                topic: 1,
                kind: ActionKind::UseSkill,
            },
            Edit::AddAction {
                phase: 0,
                topic: 1,
                kind: ActionKind::ShowPic,
            },
            Edit::UpdateTopic {
                phase: 0,
                topic: 0,
                patch: TopicPatch {
                    local_variables: Some(vec![Variable::new("mood")]),
                    ..Default::default()
                },
            },
            Edit::MoveAction {
                from: (0, 1, 2),
                to: (0, 0, 0),
            },
        ];
        let mut tree: Tree = Vec::new();
        for edit in &edits {
            tree = edit.apply(&tree).unwrap();
        }
        let out = serialize_document(&tree, None, Some("demo")).unwrap();
        assert_eq!(parse_document(&out.text).unwrap().tree, tree);
    }

    #[test]
    fn test_edit_focus() {
        let tree = hello_tree();
        let edit = Edit::AddAction {
            phase: 0,
            topic: 0,
            kind: ActionKind::AiAsk,
        };
        let after = edit.apply(&tree).unwrap();
        assert_eq!(edit.focus_before(), Some(FocusPath::topic(0, 0)));
        assert_eq!(edit.focus_after(&after), Some(FocusPath::action(0, 0, 1)));
        assert_eq!(edit.label(), "Add ai_ask Action");

        let edit = Edit::DeletePhase { phase: 0 };
        let after = edit.apply(&tree).unwrap();
        assert_eq!(edit.focus_after(&after), None);
    }
}
