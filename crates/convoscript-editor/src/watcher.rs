//! Script file watching.
//!
//! Watches one script file on disk and reports whether it still parses each
//! time its content changes. Uses the `notify` crate for filesystem events,
//! debounced, with a periodic fallback poll.

use crate::debounce::Debouncer;
use crate::error::Result;
use convoscript::v1::{
    DocumentShape, ParseError, Summary, is_repairable, parse_document, summarize,
};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Configuration for the watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Fallback poll interval (safety net for missed events)
    pub poll_interval: Duration,
    /// Quiet period after the last filesystem event before re-reading
    pub debounce: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            debounce: Duration::from_millis(500),
        }
    }
}

/// The state of a watched file after a change.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchStatus {
    Valid {
        shape: Option<DocumentShape>,
        summary: Summary,
    },
    Invalid {
        error: ParseError,
        /// Whether indentation repair would make it parse.
        repairable: bool,
    },
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchReport {
    pub path: PathBuf,
    pub status: WatchStatus,
}

impl WatchReport {
    pub fn is_valid(&self) -> bool {
        matches!(self.status, WatchStatus::Valid { .. })
    }
}

/// Watches a script file and reports its parse status on change.
#[derive(Debug)]
pub struct ScriptWatcher {
    path: PathBuf,
    config: WatcherConfig,
}

impl ScriptWatcher {
    /// Create a new watcher for a script file.
    ///
    /// # Arguments
    /// * `path` - Path to the YAML script
    /// * `config` - Optional configuration (uses defaults if None)
    pub fn new(path: impl Into<PathBuf>, config: Option<WatcherConfig>) -> Self {
        Self {
            path: path.into(),
            config: config.unwrap_or_default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and check the file once.
    pub fn check(&self) -> WatchReport {
        check_text(&self.path, read(&self.path))
    }

    /// Start watching. The current status is sent right away, then again
    /// every time the file content changes.
    ///
    /// Returns a handle that can be used to stop the watcher.
    pub async fn start(self, tx: mpsc::Sender<WatchReport>) -> Result<WatcherHandle> {
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let (event_tx, mut event_rx) = mpsc::channel::<()>(1);
        let debouncer = Debouncer::spawn(self.config.debounce, event_tx);
        let events = debouncer.handle();

        let file_path = self.path.clone();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
                if let Ok(event) = res
                    && (event.kind.is_modify() || event.kind.is_create())
                    && event.paths.iter().any(|p| p == &file_path)
                {
                    events.schedule(());
                }
            })?;
        // Editors often replace the file, so watch its directory.
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        watcher.watch(parent, RecursiveMode::NonRecursive)?;

        let path = self.path;
        let poll_interval = self.config.poll_interval;
        let task = tokio::spawn(async move {
            let _watcher = watcher;
            let _debouncer = debouncer;
            let mut poll_timer = tokio::time::interval(poll_interval);
            let mut last: Option<std::result::Result<String, String>> = None;

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    Some(()) = event_rx.recv() => {}
                    _ = poll_timer.tick() => {}
                }

                let text = read(&path);
                if last.as_ref() == Some(&text) {
                    continue;
                }
                debug!(path = %path.display(), "script changed");
                let report = check_text(&path, text.clone());
                last = Some(text);
                if tx.send(report).await.is_err() {
                    break; // Receiver dropped
                }
            }
        });

        Ok(WatcherHandle {
            stop_tx,
            _task: task,
        })
    }
}

fn read(path: &Path) -> std::result::Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| e.to_string())
}

fn check_text(path: &Path, text: std::result::Result<String, String>) -> WatchReport {
    let status = match text {
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read script");
            WatchStatus::Unreadable(e)
        }
        Ok(text) => match parse_document(&text) {
            Ok(parsed) => WatchStatus::Valid {
                shape: parsed.shape,
                summary: summarize(&parsed.tree),
            },
            Err(error) => WatchStatus::Invalid {
                repairable: is_repairable(&text),
                error,
            },
        },
    };
    WatchReport {
        path: path.to_path_buf(),
        status,
    }
}

/// Handle to control a running watcher
#[derive(Debug)]
pub struct WatcherHandle {
    stop_tx: mpsc::Sender<()>,
    _task: tokio::task::JoinHandle<()>,
}

impl WatcherHandle {
    /// Stop the watcher
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio::time::timeout;

    const SCRIPT: &str = "\
session:
  session_id: demo
  phases:
    - phase_id: p
      topics:
        - topic_id: t
          actions:
            - action_type: ai_say
              config:
                content: Hi
";

    fn script_file(text: &str) -> NamedTempFile {
        let mut temp = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        temp.write_all(text.as_bytes()).unwrap();
        temp.flush().unwrap();
        temp
    }

    #[test]
    fn test_check_valid() {
        let temp = script_file(SCRIPT);
        let report = ScriptWatcher::new(temp.path(), None).check();
        assert_eq!(
            report.status,
            WatchStatus::Valid {
                shape: Some(DocumentShape::Current),
                summary: Summary {
                    phases: 1,
                    topics: 1,
                    actions: 1
                },
            }
        );
    }

    #[test]
    fn test_check_repairable() {
        let temp = script_file(
            "\
session:
  phases:
    - phase_id: p
      topics:
        - topic_id: t
          actions:
            - action_id: a1
            action_type: ai_say
              config:
            content: Hi
",
        );
        let report = ScriptWatcher::new(temp.path(), None).check();
        match report.status {
            WatchStatus::Invalid { repairable, .. } => assert!(repairable),
            other => panic!("expected invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_check_shape_error_is_not_repairable() {
        let temp = script_file("title:     not a script\n");
        let report = ScriptWatcher::new(temp.path(), None).check();
        match report.status {
            WatchStatus::Invalid { error, repairable } => {
                assert!(matches!(error, ParseError::Shape(_)));
                assert!(!repairable);
            }
            other => panic!("expected invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_check_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = ScriptWatcher::new(dir.path().join("gone.yaml"), None).check();
        assert!(matches!(report.status, WatchStatus::Unreadable(_)));
        assert!(!report.is_valid());
    }

    #[tokio::test]
    async fn test_watcher_reports_changes() {
        let temp = script_file(SCRIPT);
        let config = WatcherConfig {
            poll_interval: Duration::from_millis(50),
            debounce: Duration::from_millis(10),
        };
        let watcher = ScriptWatcher::new(temp.path(), Some(config));
        let (tx, mut rx) = mpsc::channel(16);
        let handle = watcher.start(tx).await.unwrap();

        let first = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed");
        assert!(first.is_valid());

        std::fs::write(temp.path(), "session: [broken").unwrap();
        let second = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed");
        assert!(matches!(second.status, WatchStatus::Invalid { .. }));

        handle.stop().await;
    }
}
