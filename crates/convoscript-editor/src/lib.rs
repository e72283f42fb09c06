#![doc = include_str!("../README.md")]

pub mod debounce;
pub mod error;
pub mod session;
pub mod shell;
#[cfg(feature = "watcher")]
pub mod watcher;

pub use debounce::{DebounceHandle, Debouncer};
pub use error::{EditorError, Result};
pub use session::{EditorConfig, EditorSession, OpenFile, ReparseRequest, Restored};
pub use shell::{ChannelShell, ShellRequest, SwitchAck, SwitchTicket, UiShell, restore_focus};
#[cfg(feature = "watcher")]
pub use watcher::{ScriptWatcher, WatchReport, WatchStatus, WatcherConfig, WatcherHandle};
