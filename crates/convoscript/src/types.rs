use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::fmt;

use crate::action::Action;

/// The structural view of one document: its Phases in order.
pub type Tree = Vec<Phase>;

// ============================================================================
// Phase / Topic
// ============================================================================

/// Top level of a conversation script. Groups Topics.
///
/// # YAML shape
///
/// ```yaml
/// - phase_id: phase_1
///   phase_name: Warm-up
///   topics:
///     - topic_id: topic_1
///       actions: [ … ]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phase {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub topics: Vec<Topic>,
}

/// Second level of a conversation script. Groups Actions.
///
/// A Topic produced by the mutation operations always holds at least one
/// Action; deleting the last one is refused.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topic {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Topic-scoped variable declarations, stored under `declare`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_variables: Vec<Variable>,
    pub actions: Vec<Action>,
}

impl Phase {
    /// A Phase with the given id and no Topics.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            topics: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.topics.push(topic);
        self
    }

    /// Total number of Actions across all Topics.
    pub fn action_count(&self) -> usize {
        self.topics.iter().map(|t| t.actions.len()).sum()
    }
}

impl Topic {
    /// A Topic with the given id and no Actions.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            local_variables: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}

// ============================================================================
// Variables and output fields
// ============================================================================

/// One entry of a Topic's `declare` list.
///
/// Declarations come in more than one historical shape (`name`/`type` and
/// `var`/`define`/`value`), so the entry is kept verbatim and read through
/// accessors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Variable(pub Value);

impl Variable {
    /// A declaration in the current `name:` shape.
    pub fn new(name: impl Into<String>) -> Self {
        let mut map = Mapping::new();
        map.insert(Value::from("name"), Value::from(name.into()));
        Variable(Value::Mapping(map))
    }

    /// The declared name, from `name` or the legacy `var`.
    pub fn name(&self) -> Option<&str> {
        self.field("name").or_else(|| self.field("var"))
    }

    /// The description, from `description` or the legacy `define`.
    pub fn description(&self) -> Option<&str> {
        self.field("description").or_else(|| self.field("define"))
    }

    fn field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// One entry of an `input`/`output` list on an Action's config.
///
/// ```yaml
/// output:
///   - get: user_name
///     define: The name the user gave
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputField {
    /// Variable to extract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<String>,
    /// Variable to assign.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<String>,
    /// What the variable means.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub define: Option<String>,
    /// Literal value to assign.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Keys this model does not represent, kept in source order.
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    pub extra: Mapping,
}

const OUTPUT_KEYS: [&str; 4] = ["get", "set", "define", "value"];

impl OutputField {
    /// An output that extracts `name`.
    pub fn get(name: impl Into<String>) -> Self {
        Self {
            get: Some(name.into()),
            ..Default::default()
        }
    }

    /// Reads one list item. Returns `None` for items that are not mappings.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_mapping()?;
        let mut field = OutputField::default();
        for (key, val) in map {
            let slot = match (key.as_str(), val) {
                (Some("get"), Value::String(_)) => Some(&mut field.get),
                (Some("set"), Value::String(_)) => Some(&mut field.set),
                (Some("define"), Value::String(_)) => Some(&mut field.define),
                (Some("value"), Value::String(_)) => Some(&mut field.value),
                _ => None,
            };
            match slot {
                Some(slot) => *slot = val.as_str().map(str::to_string),
                None => {
                    field.extra.insert(key.clone(), val.clone());
                }
            }
        }
        Some(field)
    }

    pub fn to_value(&self) -> Value {
        let mut map = Mapping::new();
        let known = [&self.get, &self.set, &self.define, &self.value];
        for (key, val) in OUTPUT_KEYS.iter().zip(known) {
            if let Some(v) = val {
                map.insert(Value::from(*key), Value::from(v.as_str()));
            }
        }
        for (key, val) in &self.extra {
            if !map.contains_key(key) {
                map.insert(key.clone(), val.clone());
            }
        }
        Value::Mapping(map)
    }
}

// ============================================================================
// File identity
// ============================================================================

/// Identity of one open script file, as assigned by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        FileId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        FileId(s.to_string())
    }
}

impl From<String> for FileId {
    fn from(s: String) -> Self {
        FileId(s)
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Node counts of a tree, for status lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub phases: usize,
    pub topics: usize,
    pub actions: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} phases, {} topics, {} actions",
            self.phases, self.topics, self.actions
        )
    }
}

/// Count Phases, Topics and Actions in `tree`.
pub fn summarize(tree: &[Phase]) -> Summary {
    Summary {
        phases: tree.len(),
        topics: tree.iter().map(|p| p.topics.len()).sum(),
        actions: tree.iter().map(Phase::action_count).sum(),
    }
}
