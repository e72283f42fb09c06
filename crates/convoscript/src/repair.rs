//! Best-effort indentation repair and canonical formatting.
//!
//! The repair pass only knows about the fixed fields of an action node
//! (`action_type`, `action_id`, `config`, `condition`) and the fixed fields
//! of its `config` block. Lines with those keys are moved to the depth they
//! must have relative to the enclosing list item or `config:` line. Anything
//! else passes through untouched.

use regex::Regex;
use serde_yaml::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::codec::parse_document;
use crate::error::FormatError;

const ACTION_FIELDS: [&str; 4] = ["action_type", "action_id", "config", "condition"];
const CONFIG_FIELDS: [&str; 7] = [
    "content",
    "tone",
    "exit",
    "max_rounds",
    "output",
    "skill",
    "input",
];

static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-\s+\w+:").unwrap());
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-\s*$").unwrap());
static KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\w+):").unwrap());

/// Rewrite the leading whitespace of misindented action lines.
///
/// Comments, blank lines, and lines the rules do not cover are returned
/// unchanged, so valid documents come back byte-identical.
pub fn repair_indentation(text: &str) -> String {
    let mut state = RepairState::default();
    let mut fixed: Vec<String> = Vec::new();

    for line in text.split('\n') {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            fixed.push(line.to_string());
            continue;
        }

        let indent = line.len() - trimmed.len();
        let prev = fixed.last().map(String::as_str);
        match state.step(trimmed, indent, prev) {
            Some(corrected) => {
                debug!(from = indent, to = corrected, line = trimmed, "re-indented line");
                fixed.push(format!("{}{trimmed}", " ".repeat(corrected)));
            }
            None => fixed.push(line.to_string()),
        }
    }

    fixed.join("\n")
}

#[derive(Debug, Default)]
struct RepairState {
    /// Indent of the `-` of the list item we are inside.
    list_indent: Option<usize>,
    /// Indent of the most recent key line.
    key_indent: Option<usize>,
    in_item: bool,
}

impl RepairState {
    /// Returns the corrected indent when the line must move.
    fn step(&mut self, trimmed: &str, indent: usize, prev: Option<&str>) -> Option<usize> {
        if LIST_ITEM.is_match(trimmed) || LIST_MARKER.is_match(trimmed) {
            self.list_indent = Some(indent);
            self.key_indent = None;
            self.in_item = true;
            return None;
        }

        let key = KEY
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
        let is_action_field = key.is_some_and(|k| ACTION_FIELDS.contains(&k));

        // Action fields sit two columns right of their list item's dash.
        if self.in_item
            && is_action_field
            && let Some(list) = self.list_indent
            && indent != list + 2
        {
            return self.moved(list + 2);
        }

        if self.in_item
            && !is_action_field
            && self.list_indent.is_some_and(|list| indent <= list)
        {
            self.leave_item();
        }

        let key = key?;
        let prev_trimmed = prev.map(str::trim_start).unwrap_or_default();
        let prev_indent = prev.map(|p| p.len() - p.trim_start().len()).unwrap_or(0);
        let is_config_field = CONFIG_FIELDS.contains(&key);

        if let Some(list) = self.list_indent
            && prev.is_some()
        {
            if LIST_ITEM.is_match(prev_trimmed) {
                if indent != list + 2 {
                    return self.moved(list + 2);
                }
            } else if self.key_indent.is_some()
                && !prev_trimmed.starts_with('-')
                && let Some(prev_key) = KEY.captures(prev_trimmed).and_then(|c| c.get(1))
            {
                if prev_key.as_str() == "config" && is_config_field {
                    if indent != prev_indent + 2 {
                        return self.moved(prev_indent + 2);
                    }
                } else if indent < prev_indent {
                    self.key_indent = Some(indent);
                    if indent <= list {
                        self.leave_item();
                    }
                    return None;
                } else if self.in_item && indent != prev_indent && indent != prev_indent + 2 {
                    // Siblings inside one item line up.
                    return self.moved(prev_indent);
                }
            }
        }

        if is_config_field && prev_trimmed.starts_with("config:") && indent != prev_indent + 2 {
            return self.moved(prev_indent + 2);
        }

        if key == "config"
            && let Some(list) = self.list_indent
            && indent != list + 2
        {
            return self.moved(list + 2);
        }

        self.key_indent = Some(indent);
        None
    }

    fn moved(&mut self, indent: usize) -> Option<usize> {
        self.key_indent = Some(indent);
        Some(indent)
    }

    fn leave_item(&mut self) {
        self.in_item = false;
        self.list_indent = None;
    }
}

/// Output of [`format_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatted {
    pub text: String,
    /// `true` when the input only parsed after indentation repair.
    pub auto_fixed: bool,
}

/// Re-render `text` in the canonical YAML style.
///
/// The text is parsed as a script first; indentation repair is only tried
/// when that fails, and only adopted if the repaired text parses as a script.
pub fn format_text(text: &str) -> Result<Formatted, FormatError> {
    let (parsed, auto_fixed) = match parse_document(text) {
        Ok(parsed) => (parsed, false),
        Err(first) => {
            debug!(error = %first, "text does not parse, trying indentation repair");
            match parse_document(&repair_indentation(text)) {
                Ok(parsed) => (parsed, true),
                Err(source) => {
                    warn!(error = %source, "indentation repair did not help");
                    return Err(FormatError::Unrepairable { source });
                }
            }
        }
    };

    let text = match parsed.baseline.root() {
        Value::Null => String::new(),
        root => serde_yaml::to_string(root).map_err(|e| FormatError::Emit(e.to_string()))?,
    };
    Ok(Formatted { text, auto_fixed })
}

/// Whether `text` parses as a script once its indentation is repaired.
pub fn is_repairable(text: &str) -> bool {
    parse_document(&repair_indentation(text)).is_ok()
}
