//! Editing view-model.
//!
//! [`Editor`] owns the loaded [`Session`] together with the UI state that
//! goes with it (filter text, per-command execution status, the last moved
//! command). It is created on load and replaced wholesale on the next load.
//!
//! Commands are addressed by their *true* index in the unfiltered sequence.
//! The filtered view is only for display: callers translate a visible row to
//! a true index with [`Editor::resolve`] at the moment of the action.
//! Asynchronous completions come back with the [`RunId`] handed out by
//! [`Editor::begin_run`] and land on whichever row still holds that marker,
//! so moves and edits made while they were in flight do not matter.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::error::CoreError;
use crate::session::{Command, Session, SessionMetadata};

/// Ephemeral per-command execution state. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExecStatus {
    #[default]
    NotRun,
    Running(RunId),
    Succeeded,
    Failed(String),
}

static GENERATIONS: AtomicU64 = AtomicU64::new(1);

/// One execution request against one loaded session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId {
    generation: u64,
    seq: u64,
}

impl RunId {
    /// The [`Editor::generation`] this run was started in.
    pub fn generation(self) -> u64 {
        self.generation
    }
}

/// One row of the filtered view.
#[derive(Debug, Clone, Copy)]
pub struct VisibleCommand<'a> {
    /// Position within the filtered view.
    pub position: usize,
    /// Index within the full sequence.
    pub index: usize,
    pub command: &'a Command,
    pub status: &'a ExecStatus,
    /// This is the most recently moved command.
    pub last_moved: bool,
}

/// Application state for one loaded session.
#[derive(Debug)]
pub struct Editor {
    session: Session,
    statuses: Vec<ExecStatus>,
    filter: String,
    last_moved: Option<usize>,
    generation: u64,
    next_run: u64,
}

impl Editor {
    pub fn new(session: Session) -> Self {
        let statuses = vec![ExecStatus::NotRun; session.commands.len()];
        Self {
            session,
            statuses,
            filter: String::new(),
            last_moved: None,
            generation: GENERATIONS.fetch_add(1, Ordering::Relaxed),
            next_run: 0,
        }
    }

    /// Parse a session and build an editor for it.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Parse` for malformed input.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        Session::from_slice(bytes).map(Self::new)
    }

    /// Open a session file and build an editor for it.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` or `CoreError::Parse`.
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        Session::open(path).map(Self::new)
    }

    /// Distinct for every editor built in this process.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn metadata_mut(&mut self) -> &mut SessionMetadata {
        &mut self.session.metadata
    }

    pub fn len(&self) -> usize {
        self.session.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.session.commands.is_empty()
    }

    pub fn command(&self, index: usize) -> Option<&Command> {
        self.session.commands.get(index)
    }

    // ── Filtering ──────────────────────────────────────────────

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    fn matches_filter(&self, command: &Command) -> bool {
        self.filter.is_empty()
            || command
                .tool
                .to_lowercase()
                .contains(&self.filter.to_lowercase())
    }

    /// Commands whose tool name contains the filter text, case-insensitively.
    pub fn visible(&self) -> Vec<VisibleCommand<'_>> {
        self.session
            .commands
            .iter()
            .zip(&self.statuses)
            .enumerate()
            .filter(|(_, (command, _))| self.matches_filter(command))
            .enumerate()
            .map(|(position, (index, (command, status)))| VisibleCommand {
                position,
                index,
                command,
                status,
                last_moved: self.last_moved == Some(index),
            })
            .collect()
    }

    /// Translate a position in the filtered view into a true index.
    pub fn resolve(&self, position: usize) -> Option<usize> {
        self.session
            .commands
            .iter()
            .enumerate()
            .filter(|(_, command)| self.matches_filter(command))
            .nth(position)
            .map(|(index, _)| index)
    }

    /// Find `command` in the live sequence by value, preferring `hint` when
    /// the command is still there.
    pub fn locate(&self, command: &Command, hint: usize) -> Option<usize> {
        if self.session.commands.get(hint) == Some(command) {
            return Some(hint);
        }
        self.session.commands.iter().position(|c| c == command)
    }

    // ── Reorder and delete ─────────────────────────────────────

    /// Swap the command at `index` with its predecessor. No-op for the first command.
    pub fn move_up(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.len() {
            return false;
        }
        self.swap(index, index - 1);
        true
    }

    /// Swap the command at `index` with its successor. No-op for the last command.
    pub fn move_down(&mut self, index: usize) -> bool {
        if index + 1 >= self.len() {
            return false;
        }
        self.swap(index, index + 1);
        true
    }

    fn swap(&mut self, from: usize, to: usize) {
        self.session.commands.swap(from, to);
        self.statuses.swap(from, to);
        self.last_moved = Some(to);
        debug!(from, to, "moved command");
    }

    /// The most recently moved command's true index.
    pub fn last_moved(&self) -> Option<usize> {
        self.last_moved
    }

    /// Remove the command at `index`. Irreversible.
    pub fn remove(&mut self, index: usize) -> Option<Command> {
        if index >= self.len() {
            return None;
        }
        let command = self.session.commands.remove(index);
        self.statuses.remove(index);

        self.last_moved = match self.last_moved {
            Some(moved) if moved == index => None,
            Some(moved) if moved > index => Some(moved - 1),
            other => other,
        };
        debug!(index, tool = %command.tool, "removed command");
        Some(command)
    }

    // ── Field edits ────────────────────────────────────────────

    /// Pretty JSON text of the arguments, as shown in the argument editor.
    pub fn arguments_text(&self, index: usize) -> Option<String> {
        self.command(index)
            .and_then(|c| serde_json::to_string_pretty(&c.arguments).ok())
    }

    /// Commit edited argument text. Invalid JSON leaves the command untouched.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidArguments` if the text is not a JSON object
    /// and `CoreError::NoSuchCommand` if `index` is out of range.
    pub fn set_arguments_text(&mut self, index: usize, text: &str) -> Result<(), CoreError> {
        let arguments = parse_arguments(text)?;
        let command = self
            .session
            .commands
            .get_mut(index)
            .ok_or(CoreError::NoSuchCommand(index))?;
        command.arguments = arguments;
        Ok(())
    }

    /// Replace the description. Empty text clears it.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NoSuchCommand` if `index` is out of range.
    pub fn set_description(&mut self, index: usize, text: &str) -> Result<(), CoreError> {
        let command = self
            .session
            .commands
            .get_mut(index)
            .ok_or(CoreError::NoSuchCommand(index))?;
        command.description = (!text.is_empty()).then(|| text.to_owned());
        Ok(())
    }

    // ── Execution status ───────────────────────────────────────

    pub fn status(&self, index: usize) -> Option<&ExecStatus> {
        self.statuses.get(index)
    }

    pub fn set_status(&mut self, index: usize, status: ExecStatus) {
        if let Some(slot) = self.statuses.get_mut(index) {
            *slot = status;
        }
    }

    /// Mark `index` running. The result must be reported with the returned id.
    pub fn begin_run(&mut self, index: usize) -> Option<RunId> {
        let slot = self.statuses.get_mut(index)?;
        self.next_run += 1;
        let run = RunId {
            generation: self.generation,
            seq: self.next_run,
        };
        *slot = ExecStatus::Running(run);
        Some(run)
    }

    /// Replace the marker left by `run` with `status` and return its row.
    ///
    /// Changes nothing when the run belongs to another session or its marker
    /// is gone (the row was deleted, or playback stopped, or reset).
    pub fn finish_run(&mut self, run: RunId, status: ExecStatus) -> Option<usize> {
        if run.generation != self.generation {
            return None;
        }
        let running = ExecStatus::Running(run);
        let index = self.statuses.iter().position(|s| *s == running)?;
        self.statuses[index] = status;
        Some(index)
    }

    /// Whether the per-command run control is enabled.
    pub fn can_run(&self, index: usize) -> bool {
        matches!(
            self.statuses.get(index),
            Some(ExecStatus::NotRun | ExecStatus::Failed(_))
        )
    }

    /// Clear every in-progress marker, leaving results in place.
    pub fn clear_running(&mut self) {
        for status in &mut self.statuses {
            if matches!(status, ExecStatus::Running(_)) {
                *status = ExecStatus::NotRun;
            }
        }
    }

    /// Clear every marker and re-enable every run control.
    pub fn reset_execution(&mut self) {
        self.statuses.fill(ExecStatus::NotRun);
    }

    // ── Save ───────────────────────────────────────────────────

    /// Sanitize the session in place and write it into `dir`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` or `CoreError::Serialize`.
    #[instrument(skip(self))]
    pub fn save_to_dir(&mut self, dir: &Path) -> Result<PathBuf, CoreError> {
        self.session.sanitize();
        self.session.save_to_dir(dir)
    }
}

/// Parse argument editor text. Only JSON objects are accepted.
///
/// # Errors
///
/// Returns `CoreError::InvalidArguments` otherwise.
pub fn parse_arguments(text: &str) -> Result<Map<String, Value>, CoreError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CoreError::InvalidArguments(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(CoreError::InvalidArguments(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn editor(tools: &[&str]) -> Editor {
        let commands = tools
            .iter()
            .enumerate()
            .map(|(i, tool)| Command::new(*tool, Map::new(), 1000 + i as u64))
            .collect();
        Editor::new(Session {
            commands,
            ..Session::default()
        })
    }

    fn tools(editor: &Editor) -> Vec<&str> {
        editor
            .session()
            .commands
            .iter()
            .map(|c| c.tool.as_str())
            .collect()
    }

    #[test]
    fn test_should_filter_by_tool_but_act_on_true_index() {
        let session = Session {
            commands: vec![
                Command::new("create_cube", args(json!({ "size": 2 })), 1000),
                Command::new("undo", Map::new(), 1001),
            ],
            ..Session::default()
        };
        let mut editor = Editor::new(session);
        editor.set_filter("cube");

        let visible = editor.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].command.tool, "create_cube");
        assert_eq!(visible[0].index, 0);

        let index = editor.resolve(0).expect("should resolve");
        assert_eq!(index, 0);
        assert!(!editor.move_up(index));
        assert!(editor.move_down(index));
        assert_eq!(tools(&editor), vec!["undo", "create_cube"]);
    }

    #[test]
    fn test_should_resolve_filtered_position_to_true_index() {
        let mut editor = editor(&["undo", "create_cube", "redo", "Cube_Array"]);
        editor.set_filter("CUBE");

        assert_eq!(editor.resolve(0), Some(1));
        assert_eq!(editor.resolve(1), Some(3));
        assert_eq!(editor.resolve(2), None);

        let removed = editor.remove(editor.resolve(1).expect("resolves")).expect("removed");
        assert_eq!(removed.tool, "Cube_Array");
        assert_eq!(tools(&editor), vec!["undo", "create_cube", "redo"]);
    }

    #[test]
    fn test_should_not_mutate_sequence_when_filtering() {
        let mut editor = editor(&["a", "b", "c"]);
        editor.set_filter("zzz");
        assert!(editor.visible().is_empty());
        editor.set_filter("");
        assert_eq!(editor.visible().len(), 3);
        assert_eq!(tools(&editor), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_should_not_move_past_boundaries() {
        let mut editor = editor(&["a", "b", "c"]);
        assert!(!editor.move_up(0));
        assert!(!editor.move_down(2));
        assert!(!editor.move_down(7));
        assert_eq!(tools(&editor), vec!["a", "b", "c"]);
        assert_eq!(editor.last_moved(), None);
    }

    #[test]
    fn test_should_track_last_moved_command() {
        let mut editor = editor(&["a", "b", "c"]);
        assert!(editor.move_up(2));
        assert_eq!(tools(&editor), vec!["a", "c", "b"]);
        assert_eq!(editor.last_moved(), Some(1));

        let flagged: Vec<_> = editor
            .visible()
            .into_iter()
            .filter(|v| v.last_moved)
            .map(|v| v.command.tool.as_str())
            .collect();
        assert_eq!(flagged, vec!["c"]);

        editor.remove(0);
        assert_eq!(editor.last_moved(), Some(0));
        editor.remove(0);
        assert_eq!(editor.last_moved(), None);
    }

    #[test]
    fn test_should_move_status_with_command() {
        let mut editor = editor(&["a", "b"]);
        editor.set_status(0, ExecStatus::Succeeded);
        editor.move_down(0);
        assert_eq!(editor.status(1), Some(&ExecStatus::Succeeded));
        assert_eq!(editor.status(0), Some(&ExecStatus::NotRun));
    }

    #[test]
    fn test_should_remove_exactly_one_and_shift_following() {
        let mut editor = editor(&["a", "b", "c", "d"]);
        editor.set_status(2, ExecStatus::Failed("x".to_owned()));

        let removed = editor.remove(1).expect("should remove");
        assert_eq!(removed.tool, "b");
        assert_eq!(tools(&editor), vec!["a", "c", "d"]);
        assert_eq!(editor.status(1), Some(&ExecStatus::Failed("x".to_owned())));
        assert!(editor.remove(3).is_none());
    }

    #[test]
    fn test_should_locate_command_after_edits() {
        let mut editor = editor(&["a", "b", "c"]);
        let captured = editor.command(2).cloned().expect("exists");

        editor.remove(0);
        assert_eq!(editor.locate(&captured, 2), Some(1));

        editor.remove(1);
        assert_eq!(editor.locate(&captured, 1), None);
    }

    #[test]
    fn test_should_commit_only_valid_argument_json() {
        let mut editor = editor(&["create_cube"]);

        editor
            .set_arguments_text(0, r#"{ "size": 4, "name": "Box" }"#)
            .expect("valid json should commit");
        assert_eq!(editor.command(0).map(|c| c.arguments["size"].clone()), Some(json!(4)));

        let result = editor.set_arguments_text(0, r#"{ "size": "#);
        assert!(matches!(result, Err(CoreError::InvalidArguments(_))));
        let result = editor.set_arguments_text(0, "[1, 2]");
        assert!(matches!(result, Err(CoreError::InvalidArguments(msg)) if msg.contains("an array")));
        assert_eq!(editor.command(0).map(|c| c.arguments["size"].clone()), Some(json!(4)));

        let result = editor.set_arguments_text(5, "{}");
        assert!(matches!(result, Err(CoreError::NoSuchCommand(5))));
    }

    #[test]
    fn test_should_render_arguments_as_pretty_json() {
        let mut editor = editor(&["t"]);
        editor.set_arguments_text(0, r#"{"a":1}"#).expect("valid");
        assert_eq!(editor.arguments_text(0).as_deref(), Some("{\n  \"a\": 1\n}"));
        assert!(editor.arguments_text(1).is_none());
    }

    #[test]
    fn test_should_set_and_clear_description() {
        let mut editor = editor(&["t"]);
        editor.set_description(0, "build the base").expect("exists");
        assert_eq!(
            editor.command(0).and_then(|c| c.description.as_deref()),
            Some("build the base")
        );
        editor.set_description(0, "").expect("exists");
        assert_eq!(editor.command(0).and_then(|c| c.description.clone()), None);
    }

    #[test]
    fn test_should_gate_run_until_reset() {
        let mut editor = editor(&["a", "b", "c"]);
        editor.set_status(0, ExecStatus::Succeeded);
        editor.begin_run(1);
        editor.set_status(2, ExecStatus::Failed("nope".to_owned()));

        assert!(!editor.can_run(0));
        assert!(!editor.can_run(1));
        assert!(editor.can_run(2));

        editor.clear_running();
        assert_eq!(editor.status(1), Some(&ExecStatus::NotRun));
        assert_eq!(editor.status(0), Some(&ExecStatus::Succeeded));

        editor.reset_execution();
        assert!((0..3).all(|i| editor.can_run(i)));
    }

    #[test]
    fn test_should_finish_run_on_its_row_after_edits_and_moves() {
        let mut editor = editor(&["a", "b"]);
        let run = editor.begin_run(0).expect("exists");
        editor.set_description(0, "edited while running").expect("exists");
        editor.set_arguments_text(0, r#"{"size":2}"#).expect("valid");
        editor.move_down(0);

        assert_eq!(editor.finish_run(run, ExecStatus::Succeeded), Some(1));
        assert_eq!(editor.status(1), Some(&ExecStatus::Succeeded));
        assert!(editor.can_run(0));
        assert_eq!(editor.finish_run(run, ExecStatus::Succeeded), None);
    }

    #[test]
    fn test_should_drop_run_whose_marker_is_gone() {
        let mut editor = editor(&["a", "a"]);
        let run = editor.begin_run(0).expect("exists");
        editor.remove(0);

        assert_eq!(editor.finish_run(run, ExecStatus::Failed("late".to_owned())), None);
        assert_eq!(editor.status(0), Some(&ExecStatus::NotRun));
    }

    #[test]
    fn test_should_ignore_run_from_another_session() {
        let mut first = editor(&["a"]);
        let run = first.begin_run(0).expect("exists");
        let mut second = editor(&["a"]);
        assert_ne!(first.generation(), second.generation());

        second.begin_run(0);
        assert_eq!(second.finish_run(run, ExecStatus::Succeeded), None);
        assert!(matches!(second.status(0), Some(ExecStatus::Running(_))));
    }

    #[test]
    fn test_should_keep_prior_editor_when_load_fails() {
        let editor = editor(&["a"]);
        let reloaded = Editor::from_slice(b"not json");
        assert!(matches!(reloaded, Err(CoreError::Parse(_))));
        assert_eq!(tools(&editor), vec!["a"]);
    }

    #[test]
    fn test_should_sanitize_in_place_on_save() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let mut editor = editor(&["a"]);
        editor.metadata_mut().name = "Café Scene".to_owned();
        editor.set_description(0, "done ✓").expect("exists");

        let path = editor.save_to_dir(dir.path()).expect("should save");
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("Caf_Scene_edited.json"));
        assert_eq!(editor.session().metadata.name, "Caf Scene");
        assert_eq!(
            editor.command(0).and_then(|c| c.description.as_deref()),
            Some("done ")
        );
    }
}
