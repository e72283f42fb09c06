//! Action model and the normalizer that maps raw YAML action nodes onto it.
//!
//! Raw nodes come in two shapes:
//!
//! ```yaml
//! # tagged (current)
//! - action_id: a1
//!   action_type: ai_ask
//!   config:
//!     content: What is your name?
//!     output:
//!       - get: user_name
//!
//! # inline (legacy)
//! - ai_ask: What is your name?
//!   output:
//!     - get: user_name
//! ```
//!
//! [`to_model`] reads either shape, resolving legacy field names by a fixed
//! precedence. [`to_raw`] writes the action back in the shape it was read
//! in, emitting only non-empty fields plus whatever the model does not
//! represent.

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownActionKind;
use crate::types::OutputField;

pub const KEY_ACTION_TYPE: &str = "action_type";
pub const KEY_ACTION_ID: &str = "action_id";
pub const KEY_CONFIG: &str = "config";
pub const KEY_CONDITION: &str = "condition";

// ============================================================================
// Kinds
// ============================================================================

/// The closed set of action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AiSay,
    AiAsk,
    AiThink,
    UseSkill,
    ShowForm,
    ShowPic,
    /// Legacy scripted line spoken by the assistant.
    Say,
    /// Legacy scripted line attributed to the user.
    UserSay,
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        ActionKind::AiSay,
        ActionKind::AiAsk,
        ActionKind::AiThink,
        ActionKind::UseSkill,
        ActionKind::ShowForm,
        ActionKind::ShowPic,
        ActionKind::Say,
        ActionKind::UserSay,
    ];

    /// The `action_type` discriminator.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::AiSay => "ai_say",
            ActionKind::AiAsk => "ai_ask",
            ActionKind::AiThink => "ai_think",
            ActionKind::UseSkill => "use_skill",
            ActionKind::ShowForm => "show_form",
            ActionKind::ShowPic => "show_pic",
            ActionKind::Say => "say",
            ActionKind::UserSay => "user_say",
        }
    }

    pub fn is_legacy(self) -> bool {
        matches!(self, ActionKind::Say | ActionKind::UserSay)
    }

    /// Key used by the inline shape, for kinds that have one.
    fn inline_key(self) -> Option<&'static str> {
        match self {
            ActionKind::AiSay => Some("ai_say"),
            ActionKind::AiAsk => Some("ai_ask"),
            ActionKind::AiThink => Some("think"),
            ActionKind::Say => Some("say"),
            ActionKind::UserSay => Some("user_say"),
            ActionKind::UseSkill | ActionKind::ShowForm | ActionKind::ShowPic => None,
        }
    }

    /// Config keys holding the primary text, newest first.
    fn primary_aliases(self) -> &'static [&'static str] {
        match self {
            ActionKind::AiSay => &["content", "content_template"],
            ActionKind::AiAsk => &["content", "question_template", "content_template"],
            ActionKind::AiThink => &["content", "prompt_template", "think_goal", "think_target"],
            ActionKind::UseSkill => &["skill", "skill_name"],
            ActionKind::ShowForm => &["form_id"],
            ActionKind::ShowPic => &["pic_url"],
            ActionKind::Say | ActionKind::UserSay => &["content"],
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = UnknownActionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownActionKind(s.to_string()))
    }
}

// ============================================================================
// Variants
// ============================================================================

/// `ai_say`: the assistant explains something.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AiSay {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,
}

/// `ai_ask`: the assistant asks and extracts answers into variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AiAsk {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,
    #[serde(default)]
    pub output: Vec<OutputField>,
}

/// `ai_think`: silent reasoning step that fills variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AiThink {
    pub content: String,
    #[serde(default)]
    pub output: Vec<OutputField>,
}

/// `use_skill`: invoke a named skill.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UseSkill {
    pub skill: String,
    #[serde(default)]
    pub input: Vec<OutputField>,
    #[serde(default)]
    pub output: Vec<OutputField>,
}

/// `show_form`: present a form to the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShowForm {
    pub form_id: String,
    #[serde(default)]
    pub output: Vec<OutputField>,
}

/// `show_pic`: present an image.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShowPic {
    pub pic_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Legacy `say` / `user_say` line.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Line {
    pub content: String,
}

/// A node the normalizer does not understand. Written back verbatim and not
/// editable field by field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opaque {
    pub node: Value,
}

/// The kind-specific part of an [`Action`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionBody {
    AiSay(AiSay),
    AiAsk(AiAsk),
    AiThink(AiThink),
    UseSkill(UseSkill),
    ShowForm(ShowForm),
    ShowPic(ShowPic),
    Say(Line),
    UserSay(Line),
    Opaque(Opaque),
}

impl ActionBody {
    pub fn kind(&self) -> Option<ActionKind> {
        Some(match self {
            ActionBody::AiSay(_) => ActionKind::AiSay,
            ActionBody::AiAsk(_) => ActionKind::AiAsk,
            ActionBody::AiThink(_) => ActionKind::AiThink,
            ActionBody::UseSkill(_) => ActionKind::UseSkill,
            ActionBody::ShowForm(_) => ActionKind::ShowForm,
            ActionBody::ShowPic(_) => ActionKind::ShowPic,
            ActionBody::Say(_) => ActionKind::Say,
            ActionBody::UserSay(_) => ActionKind::UserSay,
            ActionBody::Opaque(_) => return None,
        })
    }

    /// The primary text shown in the structural editor.
    pub fn primary_text(&self) -> Option<&str> {
        match self {
            ActionBody::AiSay(b) => Some(&b.content),
            ActionBody::AiAsk(b) => Some(&b.content),
            ActionBody::AiThink(b) => Some(&b.content),
            ActionBody::UseSkill(b) => Some(&b.skill),
            ActionBody::ShowForm(b) => Some(&b.form_id),
            ActionBody::ShowPic(b) => Some(&b.pic_url),
            ActionBody::Say(b) | ActionBody::UserSay(b) => Some(&b.content),
            ActionBody::Opaque(_) => None,
        }
    }

    /// Fields in write order, omitting empty ones. The primary text comes
    /// first under its current key.
    fn fields(&self) -> Mapping {
        let mut map = Mapping::new();
        match self {
            ActionBody::AiSay(b) => {
                put_text(&mut map, "content", &b.content);
                put_opt(&mut map, "tone", &b.tone);
                put_opt(&mut map, "exit", &b.exit);
                put_u32(&mut map, "max_rounds", b.max_rounds);
            }
            ActionBody::AiAsk(b) => {
                put_text(&mut map, "content", &b.content);
                put_opt(&mut map, "tone", &b.tone);
                put_opt(&mut map, "exit", &b.exit);
                put_u32(&mut map, "max_rounds", b.max_rounds);
                put_list(&mut map, "output", &b.output);
            }
            ActionBody::AiThink(b) => {
                put_text(&mut map, "content", &b.content);
                put_list(&mut map, "output", &b.output);
            }
            ActionBody::UseSkill(b) => {
                put_text(&mut map, "skill", &b.skill);
                put_list(&mut map, "input", &b.input);
                put_list(&mut map, "output", &b.output);
            }
            ActionBody::ShowForm(b) => {
                put_text(&mut map, "form_id", &b.form_id);
                put_list(&mut map, "output", &b.output);
            }
            ActionBody::ShowPic(b) => {
                put_text(&mut map, "pic_url", &b.pic_url);
                put_opt(&mut map, "description", &b.description);
            }
            ActionBody::Say(b) | ActionBody::UserSay(b) => {
                put_text(&mut map, "content", &b.content);
            }
            ActionBody::Opaque(_) => {}
        }
        map
    }

    fn read(kind: ActionKind, primary: String, fields: &mut FieldReader) -> Self {
        match kind {
            ActionKind::AiSay => ActionBody::AiSay(AiSay {
                content: primary,
                tone: fields.opt_text("tone"),
                exit: fields.opt_text("exit"),
                max_rounds: fields.u32("max_rounds"),
            }),
            ActionKind::AiAsk => ActionBody::AiAsk(AiAsk {
                content: primary,
                tone: fields.opt_text("tone"),
                exit: fields.opt_text("exit"),
                max_rounds: fields.u32("max_rounds"),
                output: fields.list("output"),
            }),
            ActionKind::AiThink => ActionBody::AiThink(AiThink {
                content: primary,
                output: fields.list("output"),
            }),
            ActionKind::UseSkill => ActionBody::UseSkill(UseSkill {
                skill: primary,
                input: fields.list("input"),
                output: fields.list("output"),
            }),
            ActionKind::ShowForm => ActionBody::ShowForm(ShowForm {
                form_id: primary,
                output: fields.list("output"),
            }),
            ActionKind::ShowPic => ActionBody::ShowPic(ShowPic {
                pic_url: primary,
                description: fields.opt_text("description"),
            }),
            ActionKind::Say => ActionBody::Say(Line { content: primary }),
            ActionKind::UserSay => ActionBody::UserSay(Line { content: primary }),
        }
    }

    fn normalize(&mut self) {
        match self {
            ActionBody::AiSay(b) => {
                clear_empty(&mut b.tone);
                clear_empty(&mut b.exit);
            }
            ActionBody::AiAsk(b) => {
                clear_empty(&mut b.tone);
                clear_empty(&mut b.exit);
            }
            ActionBody::ShowPic(b) => clear_empty(&mut b.description),
            ActionBody::AiThink(_)
            | ActionBody::UseSkill(_)
            | ActionBody::ShowForm(_)
            | ActionBody::Say(_)
            | ActionBody::UserSay(_)
            | ActionBody::Opaque(_) => {}
        }
    }
}

// ============================================================================
// Action
// ============================================================================

/// Which raw shape an action is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStyle {
    /// `action_type` + `config`.
    #[default]
    Tagged,
    /// Legacy flat node keyed by the kind, e.g. `ai_say: ...`.
    Inline,
}

/// Keys of a raw node that the model does not represent, captured at parse
/// time and merged back verbatim when the action is written.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnmodeledFields {
    /// Extra keys on the action node itself.
    #[serde(skip_serializing_if = "Mapping::is_empty")]
    pub node: Mapping,
    /// Extra keys inside `config`.
    #[serde(skip_serializing_if = "Mapping::is_empty")]
    pub config: Mapping,
}

impl UnmodeledFields {
    pub fn is_empty(&self) -> bool {
        self.node.is_empty() && self.config.is_empty()
    }
}

/// One scripted step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub body: ActionBody,
    pub style: NodeStyle,
    #[serde(skip_serializing_if = "UnmodeledFields::is_empty")]
    pub unmodeled: UnmodeledFields,
}

impl Action {
    /// A freshly created action of `kind` at 1-based `position`, with the
    /// placeholder text the structural editor starts from.
    pub fn new_default(kind: ActionKind, position: usize) -> Self {
        let body = match kind {
            ActionKind::AiSay => ActionBody::AiSay(AiSay {
                content: "Please edit this content".into(),
                ..Default::default()
            }),
            ActionKind::AiAsk => ActionBody::AiAsk(AiAsk {
                content: "Please enter a question".into(),
                ..Default::default()
            }),
            ActionKind::AiThink => ActionBody::AiThink(AiThink {
                content: "Please enter the thinking topic".into(),
                ..Default::default()
            }),
            ActionKind::UseSkill => ActionBody::UseSkill(UseSkill {
                skill: "Skill name".into(),
                ..Default::default()
            }),
            ActionKind::ShowForm => ActionBody::ShowForm(ShowForm::default()),
            ActionKind::ShowPic => ActionBody::ShowPic(ShowPic::default()),
            ActionKind::Say => ActionBody::Say(Line::default()),
            ActionKind::UserSay => ActionBody::UserSay(Line::default()),
        };
        let style = if kind.is_legacy() {
            NodeStyle::Inline
        } else {
            NodeStyle::Tagged
        };
        Self {
            id: Some(format!("action_{position}")),
            condition: None,
            body,
            style,
            unmodeled: UnmodeledFields::default(),
        }
    }

    /// A tagged action with the given body and no id.
    pub fn from_body(body: ActionBody) -> Self {
        Self {
            id: None,
            condition: None,
            body,
            style: NodeStyle::Tagged,
            unmodeled: UnmodeledFields::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// `None` for opaque actions.
    pub fn kind(&self) -> Option<ActionKind> {
        self.body.kind()
    }

    /// Opaque actions are displayed but cannot be edited field by field.
    pub fn is_editable(&self) -> bool {
        !matches!(self.body, ActionBody::Opaque(_))
    }

    /// Replace the body. Switching to a different kind drops config extras
    /// that belonged to the old kind, and falls back to the tagged shape when
    /// the new kind has no inline form.
    pub fn set_body(&mut self, body: ActionBody) {
        if body.kind() != self.body.kind() {
            self.unmodeled.config.clear();
        }
        if let Some(kind) = body.kind()
            && kind.inline_key().is_none()
        {
            self.style = NodeStyle::Tagged;
        }
        self.body = body;
    }

    /// Turn empty optional strings into `None`, the form they take after a
    /// write/read cycle.
    pub fn normalize(&mut self) {
        clear_empty(&mut self.id);
        clear_empty(&mut self.condition);
        self.body.normalize();
    }
}

// ============================================================================
// Raw -> model
// ============================================================================

/// Map one raw action node onto the model. Never fails: anything that cannot
/// be read becomes [`ActionBody::Opaque`].
pub fn to_model(node: &Value) -> Action {
    let Some(map) = node.as_mapping() else {
        return opaque(node);
    };

    if let Some(tag) = map.get(KEY_ACTION_TYPE) {
        return match tag.as_str().map(ActionKind::from_str) {
            Some(Ok(kind)) => read_tagged(kind, map).unwrap_or_else(|| opaque(node)),
            _ => opaque(node),
        };
    }

    for kind in ActionKind::ALL {
        if let Some(key) = kind.inline_key()
            && map.get(key).is_some_and(Value::is_string)
        {
            return read_inline(kind, key, map);
        }
    }

    opaque(node)
}

fn read_tagged(kind: ActionKind, map: &Mapping) -> Option<Action> {
    let mut node = FieldReader::new(map.clone());
    node.remove(KEY_ACTION_TYPE);

    let config = match node.remove(KEY_CONFIG) {
        None | Some(Value::Null) => Mapping::new(),
        Some(Value::Mapping(m)) => m,
        Some(_) => return None,
    };

    let mut config = FieldReader::new(config);
    let primary = config.primary(kind.primary_aliases());
    let body = ActionBody::read(kind, primary, &mut config);

    Some(Action {
        id: node.opt_text(KEY_ACTION_ID),
        condition: node.opt_text(KEY_CONDITION),
        body,
        style: NodeStyle::Tagged,
        unmodeled: UnmodeledFields {
            node: node.into_rest(),
            config: config.into_rest(),
        },
    })
}

fn read_inline(kind: ActionKind, key: &str, map: &Mapping) -> Action {
    let mut node = FieldReader::new(map.clone());
    let primary = node.primary(&[key]);
    let body = ActionBody::read(kind, primary, &mut node);

    Action {
        id: node.opt_text(KEY_ACTION_ID),
        condition: node.opt_text(KEY_CONDITION),
        body,
        style: NodeStyle::Inline,
        unmodeled: UnmodeledFields {
            node: node.into_rest(),
            config: Mapping::new(),
        },
    }
}

fn opaque(node: &Value) -> Action {
    let id = node
        .get(KEY_ACTION_ID)
        .and_then(Value::as_str)
        .map(str::to_string);
    Action {
        id,
        condition: None,
        body: ActionBody::Opaque(Opaque { node: node.clone() }),
        style: NodeStyle::Tagged,
        unmodeled: UnmodeledFields::default(),
    }
}

/// Consumes typed fields out of a mapping, leaving everything it did not
/// understand behind.
struct FieldReader {
    rest: Mapping,
}

impl FieldReader {
    fn new(rest: Mapping) -> Self {
        Self { rest }
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.rest.shift_remove(key)
    }

    /// First non-empty string among `aliases`. Every alias holding a string
    /// or null is consumed, so legacy names are rewritten to the current one.
    fn primary(&mut self, aliases: &[&str]) -> String {
        let mut found: Option<String> = None;
        for alias in aliases {
            match self.rest.get(*alias) {
                Some(Value::String(s)) => {
                    if found.as_deref().is_none_or(str::is_empty) {
                        found = Some(s.clone());
                    }
                }
                Some(Value::Null) => {}
                _ => continue,
            }
            self.rest.shift_remove(*alias);
        }
        found.unwrap_or_default()
    }

    fn opt_text(&mut self, key: &str) -> Option<String> {
        match self.rest.get(key)? {
            Value::String(s) => {
                let s = s.clone();
                self.rest.shift_remove(key);
                (!s.is_empty()).then_some(s)
            }
            Value::Null => {
                self.rest.shift_remove(key);
                None
            }
            _ => None,
        }
    }

    fn u32(&mut self, key: &str) -> Option<u32> {
        match self.rest.get(key)? {
            Value::Number(n) => {
                let n = n.as_u64().and_then(|n| u32::try_from(n).ok())?;
                self.rest.shift_remove(key);
                Some(n)
            }
            Value::Null => {
                self.rest.shift_remove(key);
                None
            }
            _ => None,
        }
    }

    /// A list of [`OutputField`]s. If any item is not a mapping the whole
    /// list is left untouched as an unmodeled field.
    fn list(&mut self, key: &str) -> Vec<OutputField> {
        let parsed = match self.rest.get(key) {
            Some(Value::Sequence(items)) => items
                .iter()
                .map(OutputField::from_value)
                .collect::<Option<Vec<_>>>(),
            Some(Value::Null) => Some(Vec::new()),
            _ => None,
        };
        match parsed {
            Some(fields) => {
                self.rest.shift_remove(key);
                fields
            }
            None => Vec::new(),
        }
    }

    fn into_rest(self) -> Mapping {
        self.rest
    }
}

// ============================================================================
// Model -> raw
// ============================================================================

/// Write an action back to a raw node.
///
/// `previous` is the node this action was read from, when the caller still
/// has it; its key order is reused so that re-serializing does not shuffle
/// the author's layout. Opaque actions are returned verbatim.
pub fn to_raw(action: &Action, previous: Option<&Value>) -> Value {
    let ActionBody::Opaque(opaque) = &action.body else {
        let node = match action.style {
            NodeStyle::Inline => write_inline(action),
            NodeStyle::Tagged => None,
        }
        .unwrap_or_else(|| write_tagged(action));
        return Value::Mapping(match previous.and_then(Value::as_mapping) {
            Some(prev) => reorder_like(node, prev),
            None => node,
        });
    };
    opaque.node.clone()
}

fn write_tagged(action: &Action) -> Mapping {
    let mut node = Mapping::new();
    if let Some(id) = non_empty(&action.id) {
        node.insert(Value::from(KEY_ACTION_ID), Value::from(id));
    }
    if let Some(kind) = action.kind() {
        node.insert(Value::from(KEY_ACTION_TYPE), Value::from(kind.as_str()));
    }

    let mut config = action.body.fields();
    merge_missing(&mut config, &action.unmodeled.config);
    node.insert(Value::from(KEY_CONFIG), Value::Mapping(config));

    if let Some(condition) = non_empty(&action.condition) {
        node.insert(Value::from(KEY_CONDITION), Value::from(condition));
    }
    merge_missing(&mut node, &action.unmodeled.node);
    node
}

fn write_inline(action: &Action) -> Option<Mapping> {
    let key = action.kind()?.inline_key()?;
    let mut fields = action.body.fields();
    let primary = action.body.primary_text().unwrap_or_default();
    fields.shift_remove("content");

    let mut node = Mapping::new();
    node.insert(Value::from(key), Value::from(primary));
    if let Some(id) = non_empty(&action.id) {
        node.insert(Value::from(KEY_ACTION_ID), Value::from(id));
    }
    merge_missing(&mut node, &fields);
    if let Some(condition) = non_empty(&action.condition) {
        node.insert(Value::from(KEY_CONDITION), Value::from(condition));
    }
    merge_missing(&mut node, &action.unmodeled.node);
    Some(node)
}

/// Reorder `map` so keys also present in `template` come first, in the
/// template's order. Nested mappings, and mapping items of lists such as
/// `output`, are reordered against the template node in the same place.
fn reorder_like(mut map: Mapping, template: &Mapping) -> Mapping {
    let mut ordered = Mapping::with_capacity(map.len());
    for (key, previous) in template {
        if let Some(value) = map.shift_remove(key) {
            ordered.insert(key.clone(), reorder_value(value, previous));
        }
    }
    for (key, value) in map {
        ordered.insert(key, value);
    }
    ordered
}

fn reorder_value(value: Value, template: &Value) -> Value {
    match (value, template) {
        (Value::Mapping(map), Value::Mapping(prev)) => Value::Mapping(reorder_like(map, prev)),
        (Value::Sequence(items), Value::Sequence(prev)) => Value::Sequence(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match prev.get(i) {
                    Some(p) => reorder_value(item, p),
                    None => item,
                })
                .collect(),
        ),
        (value, _) => value,
    }
}

fn merge_missing(target: &mut Mapping, extra: &Mapping) {
    for (key, value) in extra {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn put_text(map: &mut Mapping, key: &str, value: &str) {
    if !value.is_empty() {
        map.insert(Value::from(key), Value::from(value));
    }
}

fn put_opt(map: &mut Mapping, key: &str, value: &Option<String>) {
    if let Some(v) = non_empty(value) {
        map.insert(Value::from(key), Value::from(v));
    }
}

fn put_u32(map: &mut Mapping, key: &str, value: Option<u32>) {
    if let Some(v) = value {
        map.insert(Value::from(key), Value::from(v));
    }
}

fn put_list(map: &mut Mapping, key: &str, items: &[OutputField]) {
    if !items.is_empty() {
        let seq = items.iter().map(OutputField::to_value).collect();
        map.insert(Value::from(key), Value::Sequence(seq));
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn clear_empty(value: &mut Option<String>) {
    if value.as_deref() == Some("") {
        *value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_kind_roundtrip_through_str() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.as_str().parse::<ActionKind>().unwrap(), kind);
        }
        assert!("dance".parse::<ActionKind>().is_err());
    }

    #[test]
    fn test_ai_say_prefers_content_over_template() {
        let action = to_model(&yaml(
            "action_id: a1\naction_type: ai_say\nconfig:\n  content: new\n  content_template: old",
        ));
        let ActionBody::AiSay(body) = &action.body else {
            panic!("expected ai_say, got {:?}", action.body);
        };
        assert_eq!(body.content, "new");
        assert_eq!(action.id.as_deref(), Some("a1"));
        assert!(action.unmodeled.is_empty());
    }

    #[test]
    fn test_ai_say_falls_back_to_template() {
        let action = to_model(&yaml(
            "action_type: ai_say\nconfig:\n  content_template: Hi there\n  tone: warm",
        ));
        let ActionBody::AiSay(body) = &action.body else {
            panic!("expected ai_say");
        };
        assert_eq!(body.content, "Hi there");
        assert_eq!(body.tone.as_deref(), Some("warm"));
    }

    #[test]
    fn test_empty_content_falls_back_to_older_name() {
        let action = to_model(&yaml(
            "action_type: ai_ask\nconfig:\n  content: ''\n  question_template: Name?",
        ));
        assert_eq!(action.body.primary_text(), Some("Name?"));
    }

    #[test]
    fn test_ai_ask_reads_output() {
        let action = to_model(&yaml(
            "action_type: ai_ask\nconfig:\n  content: What is your name?\n  max_rounds: 3\n  output:\n    - get: user_name",
        ));
        let ActionBody::AiAsk(body) = &action.body else {
            panic!("expected ai_ask");
        };
        assert_eq!(body.content, "What is your name?");
        assert_eq!(body.max_rounds, Some(3));
        assert_eq!(body.output, vec![OutputField::get("user_name")]);
    }

    #[test]
    fn test_ai_think_alias_chain() {
        let action = to_model(&yaml("action_type: ai_think\nconfig:\n  think_goal: ponder"));
        assert_eq!(action.kind(), Some(ActionKind::AiThink));
        assert_eq!(action.body.primary_text(), Some("ponder"));

        let action = to_model(&yaml("action_type: ai_think\nconfig:\n  think_target: ponder"));
        assert_eq!(action.body.primary_text(), Some("ponder"));
    }

    #[test]
    fn test_use_skill_reads_legacy_skill_name() {
        let action = to_model(&yaml(
            "action_type: use_skill\nconfig:\n  skill_name: summarize\n  input:\n    - get: notes",
        ));
        let ActionBody::UseSkill(body) = &action.body else {
            panic!("expected use_skill");
        };
        assert_eq!(body.skill, "summarize");
        assert_eq!(body.input.len(), 1);
    }

    #[test]
    fn test_unknown_type_is_opaque_and_verbatim() {
        let node = yaml("action_id: x\naction_type: teleport\nconfig:\n  target: mars");
        let action = to_model(&node);
        assert!(!action.is_editable());
        assert_eq!(action.kind(), None);
        assert_eq!(action.id.as_deref(), Some("x"));
        assert_eq!(to_raw(&action, None), node);
    }

    #[test]
    fn test_non_mapping_config_is_opaque() {
        let node = yaml("action_type: ai_say\nconfig: just text");
        assert!(!to_model(&node).is_editable());
    }

    #[test]
    fn test_scalar_node_is_opaque() {
        let node = yaml("hello");
        let action = to_model(&node);
        assert!(matches!(action.body, ActionBody::Opaque(_)));
        assert_eq!(to_raw(&action, None), node);
    }

    #[test]
    fn test_inline_shapes() {
        let cases = [
            ("ai_say: Hello", ActionKind::AiSay),
            ("ai_ask: Name?", ActionKind::AiAsk),
            ("think: Hmm", ActionKind::AiThink),
            ("say: Welcome", ActionKind::Say),
            ("user_say: Thanks", ActionKind::UserSay),
        ];
        for (src, kind) in cases {
            let action = to_model(&yaml(src));
            assert_eq!(action.kind(), Some(kind), "{src}");
            assert_eq!(action.style, NodeStyle::Inline);
        }
    }

    #[test]
    fn test_inline_written_back_inline() {
        let node = yaml("ai_ask: Name?\ntone: gentle\noutput:\n  - get: name");
        let action = to_model(&node);
        assert_eq!(to_raw(&action, Some(&node)), node);
    }

    #[test]
    fn test_to_raw_omits_empty_fields() {
        let action = Action::from_body(ActionBody::AiAsk(AiAsk {
            content: "Q?".into(),
            tone: Some(String::new()),
            ..Default::default()
        }))
        .with_id("a1");
        assert_eq!(
            to_raw(&action, None),
            yaml("action_id: a1\naction_type: ai_ask\nconfig:\n  content: Q?")
        );
    }

    #[test]
    fn test_to_raw_rewrites_legacy_names() {
        let node = yaml("action_id: a1\naction_type: ai_ask\nconfig:\n  question_template: Q?");
        let action = to_model(&node);
        assert_eq!(
            to_raw(&action, Some(&node)),
            yaml("action_id: a1\naction_type: ai_ask\nconfig:\n  content: Q?")
        );
    }

    #[test]
    fn test_unmodeled_fields_survive() {
        let node = yaml(
            "action_id: a1\naction_type: ai_say\nnote: keep me\nconfig:\n  content: Hi\n  require_acknowledgment: true",
        );
        let action = to_model(&node);
        assert_eq!(action.unmodeled.node.get("note"), Some(&Value::from("keep me")));
        assert_eq!(
            action.unmodeled.config.get("require_acknowledgment"),
            Some(&Value::Bool(true))
        );
        assert_eq!(to_raw(&action, Some(&node)), node);
    }

    #[test]
    fn test_previous_key_order_is_kept() {
        let node = yaml("action_type: ai_say\nconfig:\n  tone: calm\n  content: Hi\naction_id: a1");
        let action = to_model(&node);
        let raw = to_raw(&action, Some(&node));
        let keys: Vec<_> = raw
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, ["action_type", "config", "action_id"]);
        let config_keys: Vec<_> = raw["config"]
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap().to_string())
            .collect();
        assert_eq!(config_keys, ["tone", "content"]);
    }

    #[test]
    fn test_output_item_key_order_is_kept() {
        let node = yaml(
            "action_type: ai_ask\nconfig:\n  content: Name?\n  output:\n    - define: The user's name\n      get: user_name\n      note: keep\n    - set: asked\n      value: 'yes'",
        );
        let action = to_model(&node);
        let raw = to_raw(&action, Some(&node));
        assert_eq!(raw, node);
        let item_keys: Vec<_> = raw["config"]["output"][0]
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap().to_string())
            .collect();
        assert_eq!(item_keys, ["define", "get", "note"]);
    }

    #[test]
    fn test_non_string_id_stays_unmodeled() {
        let node = yaml("action_id: 7\naction_type: ai_say\nconfig:\n  content: Hi");
        let action = to_model(&node);
        assert!(action.id.is_none());
        assert_eq!(to_raw(&action, Some(&node)), node);
    }

    #[test]
    fn test_malformed_output_list_kept_verbatim() {
        let node = yaml("action_type: ai_ask\nconfig:\n  content: Q\n  output:\n    - plain");
        let action = to_model(&node);
        let ActionBody::AiAsk(body) = &action.body else {
            panic!("expected ai_ask");
        };
        assert!(body.output.is_empty());
        assert_eq!(to_raw(&action, Some(&node)), node);
    }

    #[test]
    fn test_defaults_roundtrip_for_every_kind() {
        for (i, kind) in ActionKind::ALL.into_iter().enumerate() {
            let action = Action::new_default(kind, i + 1);
            let back = to_model(&to_raw(&action, None));
            assert_eq!(back, action, "{kind}");
        }
    }

    #[test]
    fn test_default_ai_ask() {
        let action = Action::new_default(ActionKind::AiAsk, 2);
        assert_eq!(action.id.as_deref(), Some("action_2"));
        let ActionBody::AiAsk(body) = &action.body else {
            panic!("expected ai_ask");
        };
        assert_eq!(body.content, "Please enter a question");
        assert!(body.output.is_empty());
    }

    #[test]
    fn test_set_body_switches_inline_to_tagged_for_kinds_without_inline_form() {
        let mut action = to_model(&yaml("ai_say: Hello"));
        action.set_body(ActionBody::ShowPic(ShowPic {
            pic_url: "cat.png".into(),
            description: None,
        }));
        assert_eq!(action.style, NodeStyle::Tagged);
        assert_eq!(
            to_raw(&action, None),
            yaml("action_type: show_pic\nconfig:\n  pic_url: cat.png")
        );
    }

    #[test]
    fn test_normalize_clears_empty_strings() {
        let mut action = Action::new_default(ActionKind::AiSay, 1).with_condition("");
        if let ActionBody::AiSay(body) = &mut action.body {
            body.tone = Some(String::new());
        }
        action.normalize();
        assert!(action.condition.is_none());
        let back = to_model(&to_raw(&action, None));
        assert_eq!(back, action);
    }
}
