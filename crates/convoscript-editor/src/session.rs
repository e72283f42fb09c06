//! The editor controller.
//!
//! An [`EditorSession`] owns the open files of one document collection
//! (text, last parsed baseline, and tree per file) and the single
//! [`HistorySession`] shared by all of them. Structural edits go through
//! [`EditorSession::apply`]; raw text edits through
//! [`EditorSession::set_text`] and a debounced [`EditorSession::reparse`].

use convoscript::v1::{
    Baseline, Direction, Edit, FileId, FocusNavigator, FocusPath, HistoryEntry, HistorySession,
    ParseError, Parsed, Tree, format_text, parse_document, serialize_document, summarize,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::debounce::Debouncer;
use crate::error::{EditorError, Result};
use crate::shell::{UiShell, restore_focus};

/// Editor tuning knobs.
#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Maximum number of history entries.
    pub history_capacity: usize,
    /// Quiet period before a text edit is re-parsed.
    pub debounce: Duration,
    /// Longest wait for the shell to acknowledge a file switch.
    pub switch_timeout: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_capacity: convoscript::v1::DEFAULT_CAPACITY,
            debounce: Duration::from_millis(500),
            switch_timeout: Duration::from_secs(5),
        }
    }
}

impl EditorConfig {
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_switch_timeout(mut self, timeout: Duration) -> Self {
        self.switch_timeout = timeout;
        self
    }
}

/// One open script file.
#[derive(Debug, Clone)]
pub struct OpenFile {
    id: FileId,
    name: String,
    text: String,
    baseline: Option<Baseline>,
    tree: Tree,
    revision: u64,
    /// Revision the tree and `parse_error` describe.
    checked_revision: u64,
    parse_error: Option<ParseError>,
}

impl OpenFile {
    fn new(id: FileId, name: String, text: String) -> Self {
        let mut file = Self {
            id,
            name,
            text,
            baseline: None,
            tree: Vec::new(),
            revision: 0,
            checked_revision: 0,
            parse_error: None,
        };
        // A broken file still opens; its structural view stays empty.
        let _ = file.parse();
        file
    }

    pub fn id(&self) -> &FileId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }

    /// Bumped on every text change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Why the current text does not parse, if it doesn't.
    pub fn parse_error(&self) -> Option<&ParseError> {
        self.parse_error.as_ref()
    }

    /// File name without its `.yaml` / `.yml` extension; names new documents.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    /// Parse the current text. On failure only `parse_error` changes.
    fn parse(&mut self) -> std::result::Result<(), ParseError> {
        self.checked_revision = self.revision;
        match parse_document(&self.text) {
            Ok(parsed) => {
                self.adopt(parsed);
                Ok(())
            }
            Err(e) => {
                warn!(file = %self.id, error = %e, "file does not parse");
                self.parse_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Bring the tree up to date with text edits whose debounced re-parse
    /// has not run yet. Returns whether the current text parses.
    fn sync(&mut self) -> bool {
        if self.checked_revision != self.revision {
            debug!(file = %self.id, revision = self.revision, "parsing pending text edit");
            let _ = self.parse();
        }
        self.parse_error.is_none()
    }

    fn adopt(&mut self, parsed: Parsed) {
        self.baseline = Some(parsed.baseline);
        self.tree = parsed.tree;
        self.parse_error = None;
        self.checked_revision = self.revision;
    }

    fn commit(&mut self, tree: Tree, text: String, baseline: Baseline) {
        self.tree = tree;
        self.text = text;
        self.baseline = Some(baseline);
        self.parse_error = None;
        self.revision += 1;
        self.checked_revision = self.revision;
    }
}

/// A debounced request to re-parse one revision of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReparseRequest {
    pub file: FileId,
    pub revision: u64,
}

/// What an undo/redo restored.
#[derive(Debug, Clone, PartialEq)]
pub struct Restored {
    pub direction: Direction,
    pub file: FileId,
    pub label: String,
    pub focus: Option<FocusPath>,
}

/// Editor state for one document collection.
#[derive(Debug)]
pub struct EditorSession {
    config: EditorConfig,
    collection: Option<String>,
    files: BTreeMap<FileId, OpenFile>,
    current: Option<FileId>,
    history: HistorySession,
    reparse: Option<Debouncer<ReparseRequest>>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl EditorSession {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            history: HistorySession::with_capacity(config.history_capacity),
            config,
            collection: None,
            files: BTreeMap::new(),
            current: None,
            reparse: None,
        }
    }

    /// Route [`set_text`](Self::set_text) through a debouncer. Feed each
    /// request from the returned receiver back into
    /// [`reparse`](Self::reparse).
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_debounced(&mut self) -> mpsc::Receiver<ReparseRequest> {
        let (tx, rx) = mpsc::channel(16);
        self.reparse = Some(Debouncer::spawn(self.config.debounce, tx));
        rx
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &HistorySession {
        &self.history
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn file(&self, id: &FileId) -> Option<&OpenFile> {
        self.files.get(id)
    }

    pub fn files(&self) -> impl Iterator<Item = &OpenFile> {
        self.files.values()
    }

    pub fn current_file(&self) -> Option<&OpenFile> {
        self.files.get(self.current.as_ref()?)
    }

    /// Open (or reopen) a file and make it current. A file whose text does
    /// not parse still opens, with its parse error recorded.
    pub fn open_file(
        &mut self,
        id: impl Into<FileId>,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> &OpenFile {
        let id = id.into();
        let file = OpenFile::new(id.clone(), name.into(), text.into());
        if file.parse_error.is_none() {
            self.history.push_initial(id.clone(), &file.name, &file.tree);
        }
        info!(file = %id, summary = %summarize(&file.tree), "opened file");

        self.current = Some(id.clone());
        self.files.insert(id.clone(), file);
        &self.files[&id]
    }

    /// Make an already open file current.
    pub fn switch_file(&mut self, id: &FileId) -> Result<()> {
        if !self.files.contains_key(id) {
            return Err(EditorError::UnknownFile(id.clone()));
        }
        self.current = Some(id.clone());
        Ok(())
    }

    /// Apply a structural edit to the current file.
    ///
    /// A text edit still waiting for its re-parse is parsed first, so the
    /// edit builds on what the author typed. The new tree is serialized
    /// against the file's baseline before anything is committed, so a failed
    /// edit changes nothing. On success
    /// the text, baseline and tree are replaced together and the edit is
    /// recorded in history.
    pub fn apply(&mut self, edit: Edit) -> Result<&OpenFile> {
        let id = self.current.clone().ok_or(EditorError::NoOpenFile)?;
        let file = self
            .files
            .get_mut(&id)
            .ok_or_else(|| EditorError::UnknownFile(id.clone()))?;
        if !file.sync() {
            return Err(EditorError::Unparsed(id));
        }

        let after = edit.apply(&file.tree).inspect_err(|e| {
            if e.is_warning() {
                warn!(file = %id, edit = %edit.label(), "{e}");
            }
        })?;
        let out = serialize_document(&after, file.baseline.as_ref(), Some(file.stem()))?;

        let before = std::mem::take(&mut file.tree);
        let entry = HistoryEntry::new(
            id.clone(),
            file.name.clone(),
            before,
            after.clone(),
            edit.label(),
        )
        .with_focus(edit.focus_before(), edit.focus_after(&after));
        file.commit(after, out.text, out.baseline);
        if let Some(debouncer) = &self.reparse {
            debouncer.cancel();
        }

        debug!(file = %id, edit = %entry.label, revision = file.revision, "applied edit");
        self.history.push(entry);
        Ok(file)
    }

    /// Replace the current file's text (text-mode editing). With a debouncer
    /// the re-parse is scheduled; otherwise call [`reparse`](Self::reparse)
    /// with the returned request.
    pub fn set_text(&mut self, text: impl Into<String>) -> Result<ReparseRequest> {
        let id = self.current.clone().ok_or(EditorError::NoOpenFile)?;
        let file = self
            .files
            .get_mut(&id)
            .ok_or_else(|| EditorError::UnknownFile(id.clone()))?;
        file.text = text.into();
        file.revision += 1;

        let request = ReparseRequest {
            file: id,
            revision: file.revision,
        };
        if let Some(debouncer) = &self.reparse {
            debouncer.schedule(request.clone());
        }
        Ok(request)
    }

    /// Re-parse the text a request refers to. Returns `false` for a stale
    /// request (the text changed again since). A parse failure is recorded
    /// on the file and returned; baseline, tree and history are kept.
    pub fn reparse(&mut self, request: &ReparseRequest) -> Result<bool> {
        let file = self
            .files
            .get_mut(&request.file)
            .ok_or_else(|| EditorError::UnknownFile(request.file.clone()))?;
        if file.revision != request.revision {
            debug!(file = %request.file, "skipping stale re-parse");
            return Ok(false);
        }
        file.parse()?;
        debug!(file = %request.file, summary = %summarize(&file.tree), "re-parsed");
        Ok(true)
    }

    /// Canonically re-render the current file's text, repairing indentation
    /// if needed. Returns whether a repair was applied. On failure the text
    /// is left as it was.
    pub fn format(&mut self) -> Result<bool> {
        let id = self.current.clone().ok_or(EditorError::NoOpenFile)?;
        let file = self
            .files
            .get_mut(&id)
            .ok_or_else(|| EditorError::UnknownFile(id.clone()))?;

        let formatted = format_text(&file.text)?;
        let parsed = parse_document(&formatted.text)?;
        if formatted.auto_fixed {
            info!(file = %id, "indentation repaired");
        }
        file.text = formatted.text;
        file.revision += 1;
        file.adopt(parsed);
        Ok(formatted.auto_fixed)
    }

    /// Undo the most recent edit, in whichever file it was made, and restore
    /// the focus it had before. Returns `None` when there is nothing to undo.
    ///
    /// The history stays in its replay state until the focus has been
    /// restored, so edits the shell reports meanwhile are not recorded.
    /// Fails with [`EditorError::Unparsed`] while the target file holds
    /// text that does not parse; that text is kept.
    pub async fn undo<S: UiShell + ?Sized>(&mut self, shell: &mut S) -> Result<Option<Restored>> {
        self.replay(Direction::Undo, shell).await
    }

    /// Redo the next edit, in whichever file it was made.
    pub async fn redo<S: UiShell + ?Sized>(&mut self, shell: &mut S) -> Result<Option<Restored>> {
        self.replay(Direction::Redo, shell).await
    }

    async fn replay<S: UiShell + ?Sized>(
        &mut self,
        direction: Direction,
        shell: &mut S,
    ) -> Result<Option<Restored>> {
        let peeked = match direction {
            Direction::Undo => self.history.peek_undo(),
            Direction::Redo => self.history.peek_redo(),
        };
        let Some(entry) = peeked else {
            return Ok(None);
        };
        let target = entry.file_id.clone();
        let tree = match direction {
            Direction::Undo => &entry.before,
            Direction::Redo => &entry.after,
        };

        // Render first: nothing moves unless the snapshot can be written.
        let file = self
            .files
            .get_mut(&target)
            .ok_or_else(|| EditorError::UnknownFile(target.clone()))?;
        if !file.sync() {
            return Err(EditorError::Unparsed(target));
        }
        let out = serialize_document(tree, file.baseline.as_ref(), Some(file.stem()))?;

        let replay = match direction {
            Direction::Undo => self.history.replay_undo(),
            Direction::Redo => self.history.replay_redo(),
        };
        let Some(replay) = replay else {
            return Ok(None);
        };

        let tree = replay.tree().clone();
        let focus = replay.focus().and_then(|f| f.resolve(&tree));
        let label = replay.entry().label.clone();
        let commands = FocusNavigator::plan(focus, &target, self.current.as_ref());
        if let Some(file) = self.files.get_mut(&target) {
            file.commit(tree, out.text, out.baseline);
        }
        if let Some(debouncer) = &self.reparse {
            debouncer.cancel();
        }
        info!(?direction, file = %target, edit = %label, "replaying history");

        // The content is already restored; a shell that never shows the file
        // only costs the focus.
        let focus = match restore_focus(shell, commands, self.config.switch_timeout).await {
            Ok(()) => {
                self.current = Some(target.clone());
                focus
            }
            Err(e) => {
                warn!(file = %target, error = %e, "could not restore focus");
                None
            }
        };
        replay.settle();

        Ok(Some(Restored {
            direction,
            file: target,
            label,
            focus,
        }))
    }

    /// Switch to another document collection. History is per collection, so
    /// it is cleared along with the open files.
    pub fn switch_collection(&mut self, collection: impl Into<String>) {
        let collection = collection.into();
        info!(%collection, "switching collection");
        if let Some(debouncer) = &self.reparse {
            debouncer.cancel();
        }
        self.history.clear();
        self.files.clear();
        self.current = None;
        self.collection = Some(collection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{ChannelShell, ShellRequest};
    use convoscript::v1::{ActionKind, Command, HistoryState};
    use tokio::sync::mpsc::UnboundedReceiver;

    const DOC_A: &str = "\
session:
  session_id: a
  phases:
    - phase_id: warmup
      topics:
        - topic_id: hello
          actions:
            - action_type: ai_say
              action_id: greet
              config:
                content: Hello
";

    const DOC_B: &str = "\
session:
  session_id: b
  phases: []
";

    /// Acknowledges every switch and records what the shell was asked to do.
    fn drive(mut rx: UnboundedReceiver<ShellRequest>) -> tokio::task::JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(request) = rx.recv().await {
                match request {
                    ShellRequest::Switch { file, ack } => {
                        seen.push(format!("switch {file}"));
                        ack.complete();
                    }
                    ShellRequest::Dispatch(commands) => {
                        for command in commands {
                            seen.push(match command {
                                Command::Select { .. } => "select".to_string(),
                                Command::Expand { .. } => "expand".to_string(),
                                Command::ScrollIntoView { .. } => "scroll".to_string(),
                                Command::SwitchFile { file } => format!("switch {file}"),
                            });
                        }
                    }
                }
            }
            seen
        })
    }

    fn add_ask() -> Edit {
        Edit::AddAction {
            phase: 0,
            topic: 0,
            kind: ActionKind::AiAsk,
        }
    }

    #[test]
    fn test_open_records_initial_state() {
        let mut session = EditorSession::default();
        let file = session.open_file("a", "a.yaml", DOC_A);
        assert_eq!(file.tree().len(), 1);
        assert_eq!(file.stem(), "a");
        assert!(file.parse_error().is_none());

        assert_eq!(session.history().len(), 1);
        assert!(session.history().entries()[0].initial);
        assert!(!session.history().can_undo());
    }

    #[test]
    fn test_open_broken_file() {
        let mut session = EditorSession::default();
        let file = session.open_file("a", "a.yaml", "session: [unclosed");
        assert!(file.parse_error().is_some());
        assert!(session.history().is_empty());

        let err = session.apply(Edit::AddPhase).unwrap_err();
        assert!(matches!(err, EditorError::Unparsed(_)));
    }

    #[test]
    fn test_apply_updates_text_and_history() {
        let mut session = EditorSession::default();
        session.open_file("a", "a.yaml", DOC_A);

        let file = session.apply(add_ask()).unwrap();
        assert_eq!(file.revision(), 1);
        assert!(file.text().contains("ai_ask"));
        assert!(file.text().contains("greet"));
        assert_eq!(file.tree()[0].topics[0].actions.len(), 2);

        let entry = session.history().current().unwrap();
        assert_eq!(entry.label, "Add ai_ask Action");
        assert_eq!(entry.before[0].topics[0].actions.len(), 1);
        assert!(session.history().can_undo());
    }

    #[test]
    fn test_apply_after_text_edit_keeps_text() {
        let mut session = EditorSession::default();
        session.open_file("a", "a.yaml", DOC_A);

        // The debounced re-parse has not run yet.
        session
            .set_text(DOC_A.replace("Hello", "Changed by author"))
            .unwrap();
        let file = session.apply(add_ask()).unwrap();
        assert!(file.text().contains("Changed by author"), "{}", file.text());
        assert!(file.text().contains("ai_ask"));
        assert_eq!(file.revision(), 2);

        let entry = session.history().current().unwrap();
        assert_eq!(
            entry.before[0].topics[0].actions[0].body.primary_text(),
            Some("Changed by author")
        );
    }

    #[test]
    fn test_apply_after_broken_text_edit_is_refused() {
        let mut session = EditorSession::default();
        session.open_file("a", "a.yaml", DOC_A);
        session.set_text("session: [broken").unwrap();

        let err = session.apply(add_ask()).unwrap_err();
        assert!(matches!(err, EditorError::Unparsed(_)));
        let file = session.current_file().unwrap();
        assert_eq!(file.text(), "session: [broken");
        assert!(file.parse_error().is_some());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_refused_edit_changes_nothing() {
        let mut session = EditorSession::default();
        session.open_file("a", "a.yaml", DOC_A);

        let err = session
            .apply(Edit::DeleteAction {
                phase: 0,
                topic: 0,
                action: 0,
            })
            .unwrap_err();
        assert!(err.is_warning());

        let file = session.current_file().unwrap();
        assert_eq!(file.text(), DOC_A);
        assert_eq!(file.revision(), 0);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_out_of_bounds_edit_is_an_error() {
        let mut session = EditorSession::default();
        session.open_file("a", "a.yaml", DOC_A);
        let err = session.apply(Edit::DeletePhase { phase: 4 }).unwrap_err();
        assert!(!err.is_warning());
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn test_undo_redo_in_one_file() {
        let (mut shell, rx) = ChannelShell::new();
        let driver = drive(rx);
        let mut session = EditorSession::default();
        session.open_file("a", "a.yaml", DOC_A);
        session.apply(add_ask()).unwrap();

        let restored = session.undo(&mut shell).await.unwrap().unwrap();
        assert_eq!(restored.direction, Direction::Undo);
        assert_eq!(restored.focus, Some(FocusPath::topic(0, 0)));
        assert_eq!(
            session.current_file().unwrap().tree()[0].topics[0].actions.len(),
            1
        );
        assert_eq!(session.history().state(), HistoryState::Idle);
        assert!(session.undo(&mut shell).await.unwrap().is_none());

        let restored = session.redo(&mut shell).await.unwrap().unwrap();
        assert_eq!(restored.focus, Some(FocusPath::action(0, 0, 1)));
        assert_eq!(
            session.current_file().unwrap().tree()[0].topics[0].actions.len(),
            2
        );
        assert!(session.redo(&mut shell).await.unwrap().is_none());

        drop(shell);
        let seen = driver.await.unwrap();
        assert!(!seen.iter().any(|s| s.starts_with("switch")));
        assert_eq!(seen[0], "select");
        assert_eq!(seen.last().map(String::as_str), Some("scroll"));
    }

    #[tokio::test]
    async fn test_undo_switches_back_to_edited_file() {
        let (mut shell, rx) = ChannelShell::new();
        let driver = drive(rx);
        let mut session = EditorSession::default();

        session.open_file("a", "a.yaml", DOC_A);
        session.apply(add_ask()).unwrap();
        session.open_file("b", "b.yaml", DOC_B);
        session.apply(Edit::AddPhase).unwrap();
        assert_eq!(session.current_file().unwrap().id().as_str(), "b");

        let restored = session.undo(&mut shell).await.unwrap().unwrap();
        assert_eq!(restored.file.as_str(), "b");
        assert!(session.file(&"b".into()).unwrap().tree().is_empty());

        let restored = session.undo(&mut shell).await.unwrap().unwrap();
        assert_eq!(restored.file.as_str(), "a");
        assert_eq!(session.current_file().unwrap().id().as_str(), "a");
        assert_eq!(
            session.file(&"a".into()).unwrap().tree()[0].topics[0].actions.len(),
            1
        );

        drop(shell);
        let seen = driver.await.unwrap();
        let switch = seen.iter().position(|s| s == "switch a").unwrap();
        assert_eq!(seen[switch + 1], "select");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unacknowledged_switch_keeps_content() {
        // Nobody acknowledges switches.
        let (mut shell, _rx) = ChannelShell::new();
        let mut session = EditorSession::new(
            EditorConfig::default().with_switch_timeout(Duration::from_millis(200)),
        );
        session.open_file("a", "a.yaml", DOC_A);
        session.apply(add_ask()).unwrap();
        session.open_file("b", "b.yaml", DOC_B);

        let restored = session.undo(&mut shell).await.unwrap().unwrap();
        assert_eq!(restored.focus, None);
        assert_eq!(session.current_file().unwrap().id().as_str(), "b");
        assert_eq!(
            session.file(&"a".into()).unwrap().tree()[0].topics[0].actions.len(),
            1
        );
        assert_eq!(session.history().state(), HistoryState::Idle);
    }

    #[tokio::test]
    async fn test_undo_after_text_edit_keeps_new_fields() {
        let (mut shell, rx) = ChannelShell::new();
        let _driver = drive(rx);
        let mut session = EditorSession::default();
        session.open_file("a", "a.yaml", DOC_A);
        session.apply(add_ask()).unwrap();

        let edited = session
            .current_file()
            .unwrap()
            .text()
            .replacen("session:\n", "session:\n  owner: author\n", 1);
        session.set_text(edited).unwrap();
        session.undo(&mut shell).await.unwrap().unwrap();

        let file = session.current_file().unwrap();
        assert!(file.text().contains("owner: author"), "{}", file.text());
        assert_eq!(file.tree()[0].topics[0].actions.len(), 1);
    }

    #[tokio::test]
    async fn test_undo_into_broken_text_is_refused() {
        let (mut shell, rx) = ChannelShell::new();
        let _driver = drive(rx);
        let mut session = EditorSession::default();
        session.open_file("a", "a.yaml", DOC_A);
        session.apply(add_ask()).unwrap();
        session.set_text("session: [broken").unwrap();

        let err = session.undo(&mut shell).await.unwrap_err();
        assert!(matches!(err, EditorError::Unparsed(_)));
        assert_eq!(session.current_file().unwrap().text(), "session: [broken");
        assert_eq!(session.history().state(), HistoryState::Idle);
        assert!(session.history().can_undo());
    }

    #[tokio::test]
    async fn test_edit_after_undo_drops_redo() {
        let (mut shell, rx) = ChannelShell::new();
        let _driver = drive(rx);
        let mut session = EditorSession::default();
        session.open_file("a", "a.yaml", DOC_A);
        session.apply(add_ask()).unwrap();
        session.undo(&mut shell).await.unwrap();
        assert!(session.history().can_redo());

        session.apply(Edit::AddPhase).unwrap();
        assert!(!session.history().can_redo());
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn test_reparse_keeps_last_good_tree() {
        let mut session = EditorSession::default();
        session.open_file("a", "a.yaml", DOC_A);

        let request = session.set_text("session: [broken").unwrap();
        assert!(session.reparse(&request).is_err());
        let file = session.current_file().unwrap();
        assert!(file.parse_error().is_some());
        assert_eq!(file.tree().len(), 1);
        assert_eq!(session.history().len(), 1);

        let request = session.set_text(DOC_B).unwrap();
        assert!(session.reparse(&request).unwrap());
        let file = session.current_file().unwrap();
        assert!(file.parse_error().is_none());
        assert!(file.tree().is_empty());
    }

    #[test]
    fn test_stale_reparse_is_skipped() {
        let mut session = EditorSession::default();
        session.open_file("a", "a.yaml", DOC_A);
        let stale = session.set_text("session: [broken").unwrap();
        session.set_text(DOC_B).unwrap();
        assert!(!session.reparse(&stale).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_reparse_takes_last_text() {
        let mut session =
            EditorSession::new(EditorConfig::default().with_debounce(Duration::from_millis(300)));
        let mut requests = session.spawn_debounced();
        session.open_file("a", "a.yaml", DOC_A);

        session.set_text("session: [half").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.set_text(DOC_B).unwrap();

        let request = requests.recv().await.unwrap();
        assert_eq!(request.revision, 2);
        assert!(session.reparse(&request).unwrap());
        assert!(session.current_file().unwrap().tree().is_empty());
    }

    #[test]
    fn test_format_repairs_text() {
        let mut session = EditorSession::default();
        session.open_file("a", "a.yaml", DOC_B);
        session
            .set_text("session:\n  session_id: b\n  phases:\n  - phase_id: p\n    topics: []\n")
            .unwrap();
        session.format().unwrap();
        let file = session.current_file().unwrap();
        assert!(file.parse_error().is_none());
        assert_eq!(file.tree()[0].id, "p");
    }

    #[test]
    fn test_failed_format_leaves_text() {
        let mut session = EditorSession::default();
        session.open_file("a", "a.yaml", DOC_B);
        session.set_text("session: [broken").unwrap();
        assert!(session.format().is_err());
        assert_eq!(session.current_file().unwrap().text(), "session: [broken");
    }

    #[test]
    fn test_format_refuses_yaml_that_is_not_a_script() {
        let mut session = EditorSession::default();
        session.open_file("a", "a.yaml", DOC_B);
        let request = session.set_text("title:     nope").unwrap();

        assert!(session.format().is_err());
        let file = session.current_file().unwrap();
        assert_eq!(file.text(), "title:     nope");
        assert_eq!(file.revision(), request.revision);
        assert!(file.tree().is_empty());
    }

    #[test]
    fn test_switch_collection_clears_history() {
        let mut session = EditorSession::default();
        session.open_file("a", "a.yaml", DOC_A);
        session.apply(add_ask()).unwrap();

        session.switch_collection("other");
        assert_eq!(session.collection(), Some("other"));
        assert!(session.history().is_empty());
        assert!(session.current_file().is_none());
        assert!(matches!(
            session.switch_file(&"a".into()),
            Err(EditorError::UnknownFile(_))
        ));
    }
}
