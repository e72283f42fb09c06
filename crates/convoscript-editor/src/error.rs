use convoscript::v1::{FileId, FormatError, OpError, ParseError, SerializeError};
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EditorError>;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Serialize error: {0}")]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    Op(#[from] OpError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("File is not open: {0}")]
    UnknownFile(FileId),

    #[error("No file is open")]
    NoOpenFile,

    #[error("File {0} does not parse; fix the text before editing structurally")]
    Unparsed(FileId),

    #[error("Shell dropped the switch to {0} without acknowledging it")]
    SwitchAborted(FileId),

    #[error("Timed out after {timeout:?} waiting for the shell to open {file}")]
    SwitchTimedOut { file: FileId, timeout: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "watcher")]
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl EditorError {
    /// `true` for refused edits that should be shown as a warning.
    pub fn is_warning(&self) -> bool {
        matches!(self, EditorError::Op(e) if e.is_warning())
    }
}
