//! The port between the editor and whatever renders it.
//!
//! Restoring focus after an undo/redo may require opening another file
//! first. Opening a file is owned by the shell and completes whenever the
//! shell has rendered it, so [`UiShell::switch_file`] returns a
//! [`SwitchTicket`] that resolves on the shell's acknowledgement. Selection
//! commands are only dispatched once that ticket resolves.

use convoscript::v1::{Command, FileId};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{EditorError, Result};

/// The rendering side of an editor.
pub trait UiShell {
    /// Start opening `file`. The ticket resolves once the file is live.
    fn switch_file(&mut self, file: &FileId) -> SwitchTicket;

    /// Apply select/expand/scroll commands in order.
    fn dispatch(&mut self, commands: Vec<Command>);
}

/// Completion signal for a file switch.
#[derive(Debug)]
pub struct SwitchTicket {
    rx: Option<oneshot::Receiver<()>>,
}

/// The shell's half of a [`SwitchTicket`].
#[derive(Debug)]
pub struct SwitchAck {
    tx: oneshot::Sender<()>,
}

impl SwitchTicket {
    pub fn channel() -> (SwitchAck, SwitchTicket) {
        let (tx, rx) = oneshot::channel();
        (SwitchAck { tx }, SwitchTicket { rx: Some(rx) })
    }

    /// A ticket for a switch that has already happened.
    pub fn ready() -> Self {
        SwitchTicket { rx: None }
    }

    /// Wait for the acknowledgement, at most `timeout`.
    pub async fn wait(self, file: &FileId, timeout: Duration) -> Result<()> {
        let Some(rx) = self.rx else {
            return Ok(());
        };
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(EditorError::SwitchAborted(file.clone())),
            Err(_) => Err(EditorError::SwitchTimedOut {
                file: file.clone(),
                timeout,
            }),
        }
    }
}

impl SwitchAck {
    /// Report the file as live.
    pub fn complete(self) {
        let _ = self.tx.send(());
    }
}

/// Run focus commands against `shell`, waiting out any file switch before
/// the commands that follow it.
pub async fn restore_focus<S: UiShell + ?Sized>(
    shell: &mut S,
    commands: Vec<Command>,
    timeout: Duration,
) -> Result<()> {
    let mut pending = Vec::new();
    for command in commands {
        if let Command::SwitchFile { file } = &command {
            if !pending.is_empty() {
                shell.dispatch(std::mem::take(&mut pending));
            }
            debug!(%file, "waiting for shell to open file");
            shell.switch_file(file).wait(file, timeout).await?;
        } else {
            pending.push(command);
        }
    }
    if !pending.is_empty() {
        shell.dispatch(pending);
    }
    Ok(())
}

/// A request forwarded by [`ChannelShell`].
#[derive(Debug)]
pub enum ShellRequest {
    Switch { file: FileId, ack: SwitchAck },
    Dispatch(Vec<Command>),
}

/// A [`UiShell`] that forwards everything over a channel, for front ends
/// that run their own event loop.
#[derive(Debug, Clone)]
pub struct ChannelShell {
    tx: mpsc::UnboundedSender<ShellRequest>,
}

impl ChannelShell {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ShellRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl UiShell for ChannelShell {
    fn switch_file(&mut self, file: &FileId) -> SwitchTicket {
        let (ack, ticket) = SwitchTicket::channel();
        // A closed channel drops the ack, which the ticket reports as aborted.
        let _ = self.tx.send(ShellRequest::Switch {
            file: file.clone(),
            ack,
        });
        ticket
    }

    fn dispatch(&mut self, commands: Vec<Command>) {
        let _ = self.tx.send(ShellRequest::Dispatch(commands));
    }
}
