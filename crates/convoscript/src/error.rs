use thiserror::Error;

/// The text could not be turned into a tree.
///
/// Recoverable: callers typically retry after [`repair_indentation`](crate::v1::repair_indentation).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The YAML notation itself is malformed.
    #[error("YAML syntax error{}: {message}", location_suffix(.line, .column))]
    Syntax {
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },

    /// Well-formed YAML that matches neither supported document shape.
    #[error("unsupported document shape: {0}")]
    Shape(String),
}

fn location_suffix(line: &Option<usize>, column: &Option<usize>) -> String {
    match (*line, *column) {
        (Some(l), Some(c)) => format!(" at line {l}, column {c}"),
        (Some(l), None) => format!(" at line {l}"),
        _ => String::new(),
    }
}

impl From<serde_yaml::Error> for ParseError {
    fn from(err: serde_yaml::Error) -> Self {
        let location = err.location();
        // serde_yaml appends its own "at line X column Y" to Display; keep the
        // bare message and report the position through the typed fields.
        let message = err.to_string();
        let message = match message.find(" at line ") {
            Some(idx) if location.is_some() => message[..idx].to_string(),
            _ => message,
        };
        ParseError::Syntax {
            message,
            line: location.as_ref().map(|l| l.line()),
            column: location.as_ref().map(|l| l.column()),
        }
    }
}

/// Rendering a tree back to text failed. The caller's state is untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    #[error("baseline document is not usable: {0}")]
    InvalidBaseline(String),

    #[error("failed to emit YAML: {0}")]
    Emit(String),
}

/// A mutation was not applied. The input tree is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpError {
    /// An index argument is outside the current bounds.
    #[error("invalid {target} index {index} (have {len})")]
    OutOfBounds {
        target: &'static str,
        index: usize,
        len: usize,
    },

    /// The edit was deliberately refused, e.g. deleting the last Action of a Topic.
    #[error("{0}")]
    Refused(String),
}

impl OpError {
    /// `true` for intentional refusals that should be shown as a warning
    /// rather than an error.
    pub fn is_warning(&self) -> bool {
        matches!(self, OpError::Refused(_))
    }

    pub(crate) fn bounds(target: &'static str, index: usize, len: usize) -> Self {
        OpError::OutOfBounds { target, index, len }
    }
}

/// Formatting gave up. The caller's text should be left as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The text did not parse even after indentation repair. Carries the
    /// parse error of the repaired text, i.e. the defect that remains.
    #[error("could not repair YAML automatically, please fix it by hand: {source}")]
    Unrepairable {
        #[source]
        source: ParseError,
    },

    #[error("failed to emit YAML: {0}")]
    Emit(String),
}

/// An action kind name that is not one of the supported kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action kind: {0}")]
pub struct UnknownActionKind(pub String);
