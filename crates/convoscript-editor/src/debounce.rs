//! Trailing-edge debouncer.
//!
//! One pending value and one timer: every [`schedule`](Debouncer::schedule)
//! replaces the pending value and restarts the timer, and the value is
//! delivered once the timer runs out with nothing newer arriving.
//! [`cancel`](Debouncer::cancel) drops the pending value.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

enum Message<T> {
    Schedule(T),
    Cancel,
}

/// Owns the timer task. Dropping the debouncer stops it and discards
/// anything pending.
#[derive(Debug)]
pub struct Debouncer<T> {
    handle: DebounceHandle<T>,
    task: JoinHandle<()>,
}

/// Cloneable sender into a [`Debouncer`], usable from non-async code such as
/// filesystem callbacks.
#[derive(Debug)]
pub struct DebounceHandle<T> {
    tx: mpsc::UnboundedSender<Message<T>>,
}

impl<T> Clone for DebounceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> Debouncer<T> {
    /// Start a debouncer delivering to `out` after `delay` of quiet.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(delay: Duration, out: mpsc::Sender<T>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message<T>>();

        let task = tokio::spawn(async move {
            let mut pending: Option<T> = None;
            let timer = tokio::time::sleep(delay);
            tokio::pin!(timer);

            loop {
                tokio::select! {
                    message = rx.recv() => match message {
                        Some(Message::Schedule(value)) => {
                            pending = Some(value);
                            timer.as_mut().reset(Instant::now() + delay);
                        }
                        Some(Message::Cancel) => pending = None,
                        None => break,
                    },

                    () = &mut timer, if pending.is_some() => {
                        if let Some(value) = pending.take()
                            && out.send(value).await.is_err()
                        {
                            break; // Receiver dropped
                        }
                    }
                }
            }
        });

        Self {
            handle: DebounceHandle { tx },
            task,
        }
    }
}

impl<T> Debouncer<T> {
    pub fn schedule(&self, value: T) {
        self.handle.schedule(value);
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn handle(&self) -> DebounceHandle<T> {
        self.handle.clone()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl<T> DebounceHandle<T> {
    /// Replace the pending value and restart the timer. Returns `false` if
    /// the debouncer is gone.
    pub fn schedule(&self, value: T) -> bool {
        self.tx.send(Message::Schedule(value)).is_ok()
    }

    pub fn cancel(&self) -> bool {
        self.tx.send(Message::Cancel).is_ok()
    }
}
