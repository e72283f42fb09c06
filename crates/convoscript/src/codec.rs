//! Whole-document parse and serialize.
//!
//! A document is parsed into a [`Baseline`] (the full YAML value, including
//! everything the tree does not model) and a [`Tree`]. Serializing writes an
//! edited tree back onto a copy of the baseline, reconciling each Phase,
//! Topic, and Action with the node at the same index so unmodeled keys and
//! key order survive.

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::action::{self, KEY_ACTION_ID};
use crate::Result;
use crate::error::{ParseError, SerializeError};
use crate::types::{Phase, Topic, Tree, Variable, summarize};

pub const LEGACY_PHASE_ID: &str = "legacy_phase";
pub const LEGACY_TOPIC_ID: &str = "legacy_topic";
pub const LEGACY_PHASE_NAME: &str = "Legacy Phase";
pub const LEGACY_TOPIC_NAME: &str = "Legacy Topic";

const DEFAULT_SESSION_ID: &str = "new-session";
const DEFAULT_SESSION_NAME: &str = "New Session";

/// Which of the supported document layouts a text uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentShape {
    /// `session.phases[].topics[].actions[]`
    Current,
    /// `sessions[].stages[].steps[].actions[]`, lifted into one synthetic
    /// Phase and Topic.
    Legacy,
}

impl DocumentShape {
    /// Detect the shape of a parsed root value. `Ok(None)` for an empty
    /// document.
    pub fn detect(root: &Value) -> Result<Option<Self>> {
        match root {
            Value::Null => Ok(None),
            Value::Mapping(map) if map.contains_key("session") => Ok(Some(DocumentShape::Current)),
            Value::Mapping(map) if map.contains_key("sessions") => Ok(Some(DocumentShape::Legacy)),
            Value::Mapping(_) => Err(ParseError::Shape(
                "expected a `session` or `sessions` key at the top level".into(),
            )),
            _ => Err(ParseError::Shape("top level is not a mapping".into())),
        }
    }
}

/// The last parsed full document of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    root: Value,
}

impl Baseline {
    /// A minimal current-shape document for a file with no baseline yet.
    pub fn empty(stem: Option<&str>) -> Self {
        Self {
            root: Value::Mapping(session_block(stem)),
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn into_root(self) -> Value {
        self.root
    }

    pub fn shape(&self) -> Option<DocumentShape> {
        DocumentShape::detect(&self.root).ok().flatten()
    }
}

/// Result of [`parse_document`].
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub baseline: Baseline,
    pub tree: Tree,
    /// `None` for an empty document.
    pub shape: Option<DocumentShape>,
}

/// Result of [`serialize_document`].
#[derive(Debug, Clone, PartialEq)]
pub struct Serialized {
    pub text: String,
    /// The document the text was rendered from; the new baseline on commit.
    pub baseline: Baseline,
}

// ============================================================================
// Parse
// ============================================================================

/// Parse a text document into its baseline and tree.
pub fn parse_document(text: &str) -> Result<Parsed> {
    let root: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(text)?
    };

    let shape = DocumentShape::detect(&root)?;
    let tree = match shape {
        None => Vec::new(),
        Some(DocumentShape::Current) => read_current(&root)?,
        Some(DocumentShape::Legacy) => read_legacy(&root)?,
    };

    debug!(?shape, summary = %summarize(&tree), "parsed document");
    Ok(Parsed {
        baseline: Baseline { root },
        tree,
        shape,
    })
}

fn read_current(root: &Value) -> Result<Tree, ParseError> {
    let session = match &root["session"] {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(m) => m,
        _ => return Err(ParseError::Shape("`session` is not a mapping".into())),
    };

    let phases = sequence(session.get("phases"), "session.phases")?;
    phases
        .iter()
        .enumerate()
        .map(|(pi, node)| read_phase(node, pi))
        .collect()
}

fn read_phase(node: &Value, pi: usize) -> Result<Phase, ParseError> {
    let map = node
        .as_mapping()
        .ok_or_else(|| ParseError::Shape(format!("phase {pi} is not a mapping")))?;

    let topics = sequence(map.get("topics"), "topics")?
        .iter()
        .enumerate()
        .map(|(ti, node)| read_topic(node, pi, ti))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Phase {
        id: id_text(map.get("phase_id")).unwrap_or_default(),
        name: text(map.get("phase_name")),
        description: text(map.get("description")),
        topics,
    })
}

fn read_topic(node: &Value, pi: usize, ti: usize) -> Result<Topic, ParseError> {
    let map = node
        .as_mapping()
        .ok_or_else(|| ParseError::Shape(format!("topic {ti} of phase {pi} is not a mapping")))?;

    let local_variables = match map.get("declare") {
        Some(Value::Sequence(items)) => items.iter().cloned().map(Variable).collect(),
        _ => Vec::new(),
    };

    Ok(Topic {
        id: id_text(map.get("topic_id")).unwrap_or_default(),
        name: text(map.get("topic_name")),
        description: text(map.get("description")),
        local_variables,
        actions: read_actions(map.get("actions"))?,
    })
}

fn read_actions(node: Option<&Value>) -> Result<Vec<action::Action>, ParseError> {
    Ok(sequence(node, "actions")?
        .iter()
        .map(action::to_model)
        .collect())
}

fn read_legacy(root: &Value) -> Result<Tree, ParseError> {
    if !root["sessions"].is_sequence() {
        return Err(ParseError::Shape("`sessions` is not a list".into()));
    }
    let Some((_, actions)) = legacy_actions(root) else {
        return Ok(Vec::new());
    };

    let topic = Topic {
        actions: read_actions(Some(actions))?,
        ..Topic::new(LEGACY_TOPIC_ID).with_name(LEGACY_TOPIC_NAME)
    };
    Ok(vec![
        Phase::new(LEGACY_PHASE_ID)
            .with_name(LEGACY_PHASE_NAME)
            .with_topic(topic),
    ])
}

/// The first step of the first stage of the first session that has a
/// non-empty `actions` list, with its index.
fn legacy_actions(root: &Value) -> Option<(usize, &Value)> {
    let steps = root["sessions"][0]["stages"][0]["steps"].as_sequence()?;
    steps.iter().enumerate().find_map(|(i, step)| {
        let actions = step.get("actions")?;
        let non_empty = actions.as_sequence().is_some_and(|s| !s.is_empty());
        non_empty.then_some((i, actions))
    })
}

fn sequence<'a>(node: Option<&'a Value>, what: &str) -> Result<&'a [Value], ParseError> {
    match node {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Sequence(items)) => Ok(items),
        Some(_) => Err(ParseError::Shape(format!("`{what}` is not a list"))),
    }
}

/// Identifiers may be written as numbers or booleans; they are read as text.
fn id_text(node: Option<&Value>) -> Option<String> {
    match node? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
    .filter(|s| !s.is_empty())
}

fn text(node: Option<&Value>) -> Option<String> {
    node?.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

// ============================================================================
// Serialize
// ============================================================================

/// Render `tree` onto a copy of `baseline`.
///
/// Without a baseline (or with the baseline of an empty document) a minimal
/// current-shape document named after `fallback_stem` is used. Neither input
/// is modified.
pub fn serialize_document(
    tree: &[Phase],
    baseline: Option<&Baseline>,
    fallback_stem: Option<&str>,
) -> Result<Serialized, SerializeError> {
    let mut root = match baseline.map(Baseline::root) {
        None | Some(Value::Null) => Baseline::empty(fallback_stem).root,
        Some(root @ Value::Mapping(_)) => root.clone(),
        Some(_) => {
            return Err(SerializeError::InvalidBaseline(
                "top level is not a mapping".into(),
            ));
        }
    };

    let Value::Mapping(doc) = &mut root else {
        return Err(SerializeError::InvalidBaseline(
            "top level is not a mapping".into(),
        ));
    };

    if !doc.contains_key("session") && !write_legacy(doc, tree) {
        debug!("upgrading document to the session layout");
        doc.insert(
            Value::from("session"),
            Value::Mapping(session_block(fallback_stem)),
        );
    }
    if doc.contains_key("session") {
        write_current(doc, tree)?;
    }

    let text = serde_yaml::to_string(&root).map_err(|e| SerializeError::Emit(e.to_string()))?;
    debug!(summary = %summarize(tree), bytes = text.len(), "serialized document");
    Ok(Serialized {
        text,
        baseline: Baseline { root },
    })
}

fn session_block(stem: Option<&str>) -> Mapping {
    let mut session = Mapping::new();
    session.insert(
        Value::from("session_id"),
        Value::from(stem.unwrap_or(DEFAULT_SESSION_ID)),
    );
    session.insert(
        Value::from("session_name"),
        Value::from(stem.unwrap_or(DEFAULT_SESSION_NAME)),
    );
    session.insert(Value::from("phases"), Value::Sequence(Vec::new()));
    session
}

fn write_current(doc: &mut Mapping, tree: &[Phase]) -> Result<(), SerializeError> {
    if doc.get("session").is_some_and(Value::is_null) {
        doc.insert(Value::from("session"), Value::Mapping(Mapping::new()));
    }
    let Some(Value::Mapping(session)) = doc.get_mut("session") else {
        return Err(SerializeError::InvalidBaseline(
            "`session` is not a mapping".into(),
        ));
    };

    let base = base_items(session.get("phases"));
    let phases = tree
        .iter()
        .enumerate()
        .map(|(pi, phase)| Value::Mapping(write_phase(phase, base_node(base, pi))))
        .collect();
    session.insert(Value::from("phases"), Value::Sequence(phases));
    Ok(())
}

fn write_phase(phase: &Phase, base: Mapping) -> Mapping {
    let mut map = base;
    reconcile(&mut map, "phase_id", Some(&phase.id), id_text);
    reconcile(&mut map, "phase_name", phase.name.as_deref(), text);
    reconcile(&mut map, "description", phase.description.as_deref(), text);

    let base_topics = base_items(map.get("topics")).to_vec();
    let topics = phase
        .topics
        .iter()
        .enumerate()
        .map(|(ti, topic)| Value::Mapping(write_topic(topic, base_node(&base_topics, ti))))
        .collect();
    map.insert(Value::from("topics"), Value::Sequence(topics));
    map
}

fn write_topic(topic: &Topic, base: Mapping) -> Mapping {
    let mut map = base;
    reconcile(&mut map, "topic_id", Some(&topic.id), id_text);
    reconcile(&mut map, "topic_name", topic.name.as_deref(), text);
    reconcile(&mut map, "description", topic.description.as_deref(), text);

    if topic.local_variables.is_empty() {
        if map.get("declare").is_some_and(Value::is_sequence) {
            map.shift_remove("declare");
        }
    } else {
        let declare = topic.local_variables.iter().map(|v| v.0.clone()).collect();
        map.insert(Value::from("declare"), Value::Sequence(declare));
    }

    let actions = write_actions(&topic.actions, map.get("actions"));
    map.insert(Value::from("actions"), actions);
    map
}

/// Write actions, passing each the previous node at the same index when it
/// carries the same `action_id`.
fn write_actions(actions: &[action::Action], base: Option<&Value>) -> Value {
    let base = base_items(base);
    let nodes = actions
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let previous = base.get(i).filter(|prev| {
                prev.get(KEY_ACTION_ID).and_then(Value::as_str) == a.id.as_deref()
            });
            action::to_raw(a, previous)
        })
        .collect();
    Value::Sequence(nodes)
}

/// Write the single synthetic Phase/Topic back into the legacy step it came
/// from. An empty tree clears that step's `actions`. Returns `false` when
/// the document is not legacy or the tree no longer fits that layout.
fn write_legacy(doc: &mut Mapping, tree: &[Phase]) -> bool {
    if !doc.get("sessions").is_some_and(Value::is_sequence) {
        return false;
    }
    let actions: &[action::Action] = match tree {
        [] => &[],
        [phase] if fits_legacy(phase) => &phase.topics[0].actions,
        _ => return false,
    };

    let root = Value::Mapping(doc.clone());
    let Some((step, previous)) = legacy_actions(&root) else {
        // No step holds actions, so an empty tree is already written.
        return actions.is_empty();
    };
    let written = write_actions(actions, Some(previous));

    let slot = doc
        .get_mut("sessions")
        .and_then(|s| s.get_mut(0))
        .and_then(|s| s.get_mut("stages"))
        .and_then(|s| s.get_mut(0))
        .and_then(|s| s.get_mut("steps"))
        .and_then(|s| s.get_mut(step))
        .and_then(|s| s.get_mut("actions"));
    match slot {
        Some(slot) => {
            *slot = written;
            true
        }
        None => false,
    }
}

fn fits_legacy(phase: &Phase) -> bool {
    let [topic] = phase.topics.as_slice() else {
        return false;
    };
    phase.id == LEGACY_PHASE_ID
        && phase.name.as_deref() == Some(LEGACY_PHASE_NAME)
        && phase.description.is_none()
        && topic.id == LEGACY_TOPIC_ID
        && topic.name.as_deref() == Some(LEGACY_TOPIC_NAME)
        && topic.description.is_none()
        && topic.local_variables.is_empty()
}

fn base_items(node: Option<&Value>) -> &[Value] {
    node.and_then(Value::as_sequence)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn base_node(items: &[Value], index: usize) -> Mapping {
    items
        .get(index)
        .and_then(Value::as_mapping)
        .cloned()
        .unwrap_or_default()
}

/// Set `key` to `value` unless the existing entry already reads as `value`
/// through `read`. `None` removes the key only if it currently reads as a
/// value, so nodes the tree never saw stay put.
fn reconcile(map: &mut Mapping, key: &str, value: Option<&str>, read: fn(Option<&Value>) -> Option<String>) {
    let value = value.filter(|v| !v.is_empty());
    let current = read(map.get(key));
    if current.as_deref() == value {
        return;
    }
    match value {
        Some(v) => {
            map.insert(Value::from(key), Value::from(v));
        }
        None => {
            map.shift_remove(key);
        }
    }
}
