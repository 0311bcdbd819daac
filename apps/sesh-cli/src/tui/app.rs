//! Editor state and input handling.
//!
//! [`App`] is only touched from the UI loop. Network calls and playback
//! delays run as tokio tasks and report back through [`Message`]s, so edits
//! and completions never race on the command list.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use serde_json::{Value, json};
use sesh_core::{
    Command, ConnectionStatus, CoreError, Editor, ExecStatus, Executor, LocalState, McpClient,
    Outcome, PlaybackAction, PlaybackController, RemoteAction, RunId, ScheduledStep, StepTicket, Theme,
    parse_delay, save_local_state,
};
use sesh_prompt::{Prompt, PromptManager, PromptSlot};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Completions delivered back to the UI loop.
#[derive(Debug)]
pub enum Message {
    /// A command finished executing.
    Executed {
        origin: Origin,
        run: RunId,
        /// The command as it was sent.
        command: Command,
        /// Index at the time it was sent.
        hint: usize,
        outcome: Outcome,
    },
    /// The delay before the next playback step elapsed.
    StepDue { generation: u64, ticket: StepTicket },
    /// An undo, redo or clear-scene call finished.
    Remote { action: RemoteAction, outcome: Outcome },
}

/// Who asked for an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Single,
    Playback(StepTicket),
}

/// Follow-up attached to a prompt.
#[derive(Debug)]
pub enum PromptTag {
    Notice,
    ContinuePlayback(StepTicket),
    DeleteCommand { command: Command, hint: usize },
    ClearScene,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaField {
    Name,
    Model,
    Description,
}

impl MetaField {
    fn next(self) -> Self {
        match self {
            Self::Name => Self::Model,
            Self::Model => Self::Description,
            Self::Description => Self::Name,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Model => "Model",
            Self::Description => "Description",
        }
    }
}

/// Input mode. Modal editors hold their own text buffer until committed.
#[derive(Debug, Default)]
pub enum Mode {
    #[default]
    Normal,
    Filter,
    Arguments {
        index: usize,
        input: String,
        error: Option<String>,
    },
    Description {
        index: usize,
        input: String,
    },
    Metadata {
        field: MetaField,
        input: String,
    },
    Delay {
        input: String,
    },
    Open {
        input: String,
    },
}

/// Everything [`App::new`] needs besides the loaded session.
#[derive(Debug)]
pub struct AppContext {
    pub client: Arc<McpClient>,
    pub prompts: PromptManager,
    pub out_dir: PathBuf,
    pub state_path: PathBuf,
    pub step_delay: std::time::Duration,
    pub theme: Theme,
}

#[derive(Debug)]
pub struct App {
    pub editor: Editor,
    pub source: PathBuf,
    pub controller: PlaybackController,
    pub slot: PromptSlot<PromptTag>,
    pub connection: ConnectionStatus,
    pub mode: Mode,
    /// Position in the filtered view.
    pub selected: usize,
    pub theme: Theme,
    pub notice: Option<String>,
    pub server_url: String,
    out_dir: PathBuf,
    state_path: PathBuf,
    client: Arc<McpClient>,
    prompts: PromptManager,
    waiting: VecDeque<(Prompt, PromptTag)>,
    scheduled: Option<ScheduledStep>,
    tx: UnboundedSender<Message>,
    quit: bool,
}

enum LineInput {
    Edited,
    Submit,
    Cancel,
    Ignored,
}

fn edit_line(input: &mut String, key: KeyEvent) -> LineInput {
    match key.code {
        KeyCode::Enter => LineInput::Submit,
        KeyCode::Esc => LineInput::Cancel,
        KeyCode::Backspace => {
            input.pop();
            LineInput::Edited
        }
        KeyCode::Char(c) => {
            input.push(c);
            LineInput::Edited
        }
        _ => LineInput::Ignored,
    }
}

impl App {
    pub fn new(editor: Editor, source: PathBuf, ctx: AppContext, tx: UnboundedSender<Message>) -> Self {
        Self {
            editor,
            source,
            controller: PlaybackController::new(ctx.step_delay),
            slot: PromptSlot::new(),
            connection: ConnectionStatus::Unknown,
            mode: Mode::Normal,
            selected: 0,
            theme: ctx.theme,
            notice: None,
            server_url: ctx.client.base_url().to_owned(),
            out_dir: ctx.out_dir,
            state_path: ctx.state_path,
            client: ctx.client,
            prompts: ctx.prompts,
            waiting: VecDeque::new(),
            scheduled: None,
            tx,
            quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn set_connection(&mut self, status: ConnectionStatus) {
        self.connection = status;
    }

    /// Prompts waiting behind the open one.
    pub fn waiting_prompts(&self) -> usize {
        self.waiting.len()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.editor.resolve(self.selected)
    }

    fn clamp_selection(&mut self) {
        let visible = self.editor.visible().len();
        self.selected = self.selected.min(visible.saturating_sub(1));
    }

    fn select_index(&mut self, index: usize) {
        if let Some(row) = self.editor.visible().iter().find(|row| row.index == index) {
            self.selected = row.position;
        }
    }

    // ── Input ──────────────────────────────────────────────────

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit();
            return;
        }
        if self.slot.is_open() {
            self.handle_prompt_key(key);
            return;
        }

        match std::mem::take(&mut self.mode) {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Filter => self.handle_filter_key(key),
            Mode::Arguments {
                index,
                input,
                error,
            } => self.handle_arguments_key(key, index, input, error),
            Mode::Description { index, mut input } => match edit_line(&mut input, key) {
                LineInput::Submit => {
                    if let Err(e) = self.editor.set_description(index, &input) {
                        warn!(index, error = %e, "description not applied");
                    }
                }
                LineInput::Cancel => {}
                LineInput::Edited | LineInput::Ignored => {
                    self.mode = Mode::Description { index, input };
                }
            },
            Mode::Metadata { field, input } => self.handle_metadata_key(key, field, input),
            Mode::Delay { mut input } => match edit_line(&mut input, key) {
                LineInput::Submit => {
                    let delay = parse_delay(&input);
                    self.controller.set_delay(delay);
                    self.notice = Some(format!("Delay set to {} ms", delay.as_millis()));
                }
                LineInput::Cancel => {}
                LineInput::Edited | LineInput::Ignored => self.mode = Mode::Delay { input },
            },
            Mode::Open { mut input } => match edit_line(&mut input, key) {
                LineInput::Submit => self.load(PathBuf::from(input.trim())),
                LineInput::Cancel => {}
                LineInput::Edited | LineInput::Ignored => self.mode = Mode::Open { input },
            },
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.quit(),
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected += 1;
                self.clamp_selection();
            }
            KeyCode::Char('K') => self.move_selected(Editor::move_up),
            KeyCode::Char('J') => self.move_selected(Editor::move_down),
            KeyCode::Char('/') => self.mode = Mode::Filter,
            KeyCode::Char('d') | KeyCode::Delete => self.confirm_delete(),
            KeyCode::Char('e') => {
                if let Some(index) = self.selected_index()
                    && let Some(input) = self.editor.arguments_text(index)
                {
                    self.mode = Mode::Arguments {
                        index,
                        input,
                        error: None,
                    };
                }
            }
            KeyCode::Char('n') => {
                if let Some(index) = self.selected_index() {
                    let input = self
                        .editor
                        .command(index)
                        .and_then(|c| c.description.clone())
                        .unwrap_or_default();
                    self.mode = Mode::Description { index, input };
                }
            }
            KeyCode::Char('m') => {
                self.mode = Mode::Metadata {
                    field: MetaField::Name,
                    input: self.editor.session().metadata.name.clone(),
                };
            }
            KeyCode::Enter | KeyCode::Char('r') => self.run_selected(),
            KeyCode::Char('p') => self.start_playback(),
            KeyCode::Char('s') => self.stop_playback(),
            KeyCode::Char('t') => {
                self.mode = Mode::Delay {
                    input: self.controller.delay().as_millis().to_string(),
                };
            }
            KeyCode::Char('u') => self.send_remote(RemoteAction::Undo),
            KeyCode::Char('U') => self.send_remote(RemoteAction::Redo),
            KeyCode::Char('X') => self.show("clear_scene", json!({}), PromptTag::ClearScene),
            KeyCode::Char('z') => {
                self.editor.reset_execution();
                self.notice = Some("Execution state reset".to_owned());
            }
            KeyCode::Char('w') => self.save(),
            KeyCode::Char('T') => self.toggle_theme(),
            KeyCode::Char('o') => {
                self.mode = Mode::Open {
                    input: self.source.display().to_string(),
                };
            }
            _ => {}
        }
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        let mut filter = self.editor.filter().to_owned();
        match edit_line(&mut filter, key) {
            LineInput::Submit => {}
            LineInput::Cancel => self.editor.set_filter(""),
            LineInput::Edited => {
                self.editor.set_filter(filter);
                self.mode = Mode::Filter;
            }
            LineInput::Ignored => self.mode = Mode::Filter,
        }
        self.clamp_selection();
    }

    fn handle_arguments_key(&mut self, key: KeyEvent, index: usize, mut input: String, error: Option<String>) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let edited = match key.code {
            KeyCode::Esc => return,
            KeyCode::Char('s') if ctrl => {
                match self.editor.set_arguments_text(index, &input) {
                    Ok(()) => {
                        self.notice = Some(format!("Arguments of #{} updated", index + 1));
                        return;
                    }
                    Err(e) => {
                        self.mode = Mode::Arguments {
                            index,
                            input,
                            error: Some(e.to_string()),
                        };
                        return;
                    }
                }
            }
            KeyCode::Enter => {
                input.push('\n');
                true
            }
            KeyCode::Tab => {
                input.push_str("  ");
                true
            }
            KeyCode::Backspace => input.pop().is_some(),
            KeyCode::Char(c) if !ctrl => {
                input.push(c);
                true
            }
            _ => false,
        };

        // Commits as soon as the text parses; Esc only closes the editor.
        let error = if edited {
            self.editor
                .set_arguments_text(index, &input)
                .err()
                .map(|e| e.to_string())
        } else {
            error
        };
        self.mode = Mode::Arguments {
            index,
            input,
            error,
        };
    }

    fn handle_metadata_key(&mut self, key: KeyEvent, field: MetaField, mut input: String) {
        if key.code == KeyCode::Tab {
            self.set_metadata(field, input);
            let field = field.next();
            self.mode = Mode::Metadata {
                field,
                input: self.metadata_value(field),
            };
            return;
        }
        match edit_line(&mut input, key) {
            LineInput::Submit => self.set_metadata(field, input),
            LineInput::Cancel => {}
            LineInput::Edited | LineInput::Ignored => self.mode = Mode::Metadata { field, input },
        }
    }

    fn metadata_value(&self, field: MetaField) -> String {
        let meta = &self.editor.session().metadata;
        match field {
            MetaField::Name => meta.name.clone(),
            MetaField::Model => meta.model.clone(),
            MetaField::Description => meta.description.clone(),
        }
    }

    fn set_metadata(&mut self, field: MetaField, value: String) {
        let meta = self.editor.metadata_mut();
        match field {
            MetaField::Name => meta.name = value,
            MetaField::Model => meta.model = value,
            MetaField::Description => meta.description = value,
        }
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        let answer = match key.code {
            KeyCode::Enter | KeyCode::Char('y') => self.slot.confirm(),
            KeyCode::Esc | KeyCode::Char('n') => self.slot.cancel(),
            _ => return,
        };
        if let Some(answer) = answer {
            debug!(title = %answer.prompt.title, outcome = ?answer.outcome, "prompt answered");
            self.resolve_prompt(answer.tag, answer.outcome.is_confirmed());
        }
        self.open_next_prompt();
    }

    // ── Prompts ────────────────────────────────────────────────

    /// Render template `name` and show it, or queue it behind the open prompt.
    fn show(&mut self, name: &str, ctx: Value, tag: PromptTag) {
        let prompt = self.prompts.render(name, ctx).unwrap_or_else(|e| {
            warn!(template = name, error = %e, "failed to render prompt");
            Prompt::alert(name, e.to_string())
        });

        if self.slot.is_open() || !self.waiting.is_empty() {
            self.waiting.push_back((prompt, tag));
        } else if let Err((e, prompt, tag)) = self.slot.open(prompt, tag) {
            debug!(error = %e, "prompt slot busy, queueing");
            self.waiting.push_back((prompt, tag));
        }
    }

    fn open_next_prompt(&mut self) {
        if self.slot.is_open() {
            return;
        }
        if let Some((prompt, tag)) = self.waiting.pop_front()
            && let Err((_, prompt, tag)) = self.slot.open(prompt, tag)
        {
            self.waiting.push_front((prompt, tag));
        }
    }

    fn resolve_prompt(&mut self, tag: PromptTag, confirmed: bool) {
        match tag {
            PromptTag::Notice => {}
            PromptTag::ContinuePlayback(ticket) => {
                let action = self.controller.on_confirm(ticket, confirmed);
                self.apply(action);
            }
            PromptTag::DeleteCommand { command, hint } => {
                if !confirmed {
                    return;
                }
                if let Some(index) = self.editor.locate(&command, hint) {
                    self.editor.remove(index);
                    self.clamp_selection();
                    self.notice = Some(format!("Deleted #{} ({})", index + 1, command.tool));
                }
            }
            PromptTag::ClearScene => {
                if confirmed {
                    self.send_remote(RemoteAction::ClearScene);
                }
            }
        }
    }

    // ── Editing ────────────────────────────────────────────────

    fn move_selected(&mut self, op: fn(&mut Editor, usize) -> bool) {
        let Some(index) = self.selected_index() else {
            return;
        };
        if op(&mut self.editor, index)
            && let Some(moved) = self.editor.last_moved()
        {
            self.select_index(moved);
        }
    }

    fn confirm_delete(&mut self) {
        let Some(index) = self.selected_index() else {
            return;
        };
        let Some(command) = self.editor.command(index).cloned() else {
            return;
        };
        self.show(
            "delete_command",
            json!({ "index": index + 1, "tool": command.tool }),
            PromptTag::DeleteCommand {
                command,
                hint: index,
            },
        );
    }

    fn save(&mut self) {
        match self.editor.save_to_dir(&self.out_dir) {
            Ok(path) => {
                info!(path = %path.display(), "session saved");
                self.show(
                    "session_saved",
                    json!({ "path": path.display().to_string() }),
                    PromptTag::Notice,
                );
            }
            Err(e) => {
                warn!(error = %e, "failed to save session");
                let path = self.out_dir.join(self.editor.session().export_file_name());
                self.show(
                    "save_failed",
                    json!({ "path": path.display().to_string(), "error": e.to_string() }),
                    PromptTag::Notice,
                );
            }
        }
    }

    /// Replace the session with the one at `path`. On failure the current
    /// session stays loaded.
    pub fn load(&mut self, path: PathBuf) {
        match Editor::open(&path) {
            Ok(editor) => {
                self.stop_playback();
                self.notice = Some(format!("Loaded {} commands", editor.len()));
                self.editor = editor;
                self.source = path;
                self.selected = 0;
            }
            Err(e) => self.show_load_error(&path, &e),
        }
    }

    pub fn show_load_error(&mut self, path: &Path, error: &CoreError) {
        warn!(path = %path.display(), %error, "failed to load session");
        self.show(
            "parse_error",
            json!({ "path": path.display().to_string(), "error": error.to_string() }),
            PromptTag::Notice,
        );
    }

    fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        let state = LocalState { theme: self.theme };
        if let Err(e) = save_local_state(&self.state_path, &state) {
            warn!(error = %e, "failed to persist theme");
        }
    }

    fn quit(&mut self) {
        self.stop_playback();
        self.quit = true;
    }

    // ── Execution ──────────────────────────────────────────────

    fn run_selected(&mut self) {
        let Some(index) = self.selected_index() else {
            return;
        };
        if !self.editor.can_run(index) {
            self.notice = Some(format!("#{} already ran; reset to run it again", index + 1));
            return;
        }
        self.execute(index, Origin::Single);
    }

    /// Mark `index` running and send it. Returns `false` if there is no such command.
    fn execute(&mut self, index: usize, origin: Origin) -> bool {
        let Some(command) = self.editor.command(index).cloned() else {
            return false;
        };
        let Some(run) = self.editor.begin_run(index) else {
            return false;
        };

        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = client.execute(&command.tool, &command.arguments).await;
            let _ = tx.send(Message::Executed {
                origin,
                run,
                command,
                hint: index,
                outcome,
            });
        });
        true
    }

    fn send_remote(&mut self, action: RemoteAction) {
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = action.send(client.as_ref()).await;
            let _ = tx.send(Message::Remote { action, outcome });
        });
    }

    fn start_playback(&mut self) {
        match self.controller.start(self.editor.len()) {
            PlaybackAction::Ignore => {
                self.notice = Some(if self.controller.is_active() {
                    "Playback already running".to_owned()
                } else {
                    "Nothing to play".to_owned()
                });
            }
            action => {
                self.notice = Some("Playing".to_owned());
                self.apply(action);
            }
        }
    }

    fn stop_playback(&mut self) {
        if !self.controller.stop() {
            return;
        }
        if let Some(step) = self.scheduled.take() {
            step.cancel();
        }
        self.editor.clear_running();
        self.notice = Some("Playback stopped".to_owned());
    }

    fn apply(&mut self, action: PlaybackAction) {
        match action {
            PlaybackAction::Execute(ticket) => {
                if !self.execute(ticket.index, Origin::Playback(ticket)) {
                    self.controller.stop();
                }
            }
            PlaybackAction::Schedule { ticket, delay } => {
                let tx = self.tx.clone();
                let generation = self.editor.generation();
                self.scheduled = Some(ScheduledStep::spawn(ticket, delay, move |due| {
                    let _ = tx.send(Message::StepDue {
                        generation,
                        ticket: due,
                    });
                }));
            }
            PlaybackAction::Confirm { ticket, error } => self.show(
                "playback_error",
                json!({ "index": ticket.index + 1, "error": error }),
                PromptTag::ContinuePlayback(ticket),
            ),
            PlaybackAction::Finished => {
                self.scheduled = None;
                self.notice = Some("Playback finished".to_owned());
            }
            PlaybackAction::Ignore => {}
        }
    }

    pub fn handle_message(&mut self, message: Message) {
        match message {
            Message::Executed {
                origin,
                run,
                command,
                hint,
                outcome,
            } => {
                if run.generation() != self.editor.generation() {
                    debug!(tool = %command.tool, "dropping result from a previously loaded session");
                    return;
                }
                let status = match &outcome {
                    Outcome::Success(_) => ExecStatus::Succeeded,
                    Outcome::Failure(error) => ExecStatus::Failed(error.clone()),
                };
                let index = self.editor.finish_run(run, status);
                if index.is_none() {
                    debug!(tool = %command.tool, "result for a command no longer running");
                }

                match origin {
                    Origin::Playback(ticket) => {
                        let action = self.controller.on_outcome(ticket, &outcome);
                        self.apply(action);
                    }
                    Origin::Single => match outcome {
                        Outcome::Success(_) => {
                            self.notice = Some(format!("#{} {} succeeded", index.unwrap_or(hint) + 1, command.tool));
                        }
                        Outcome::Failure(error) => self.show(
                            "execution_error",
                            json!({ "index": index.unwrap_or(hint) + 1, "tool": command.tool, "error": error }),
                            PromptTag::Notice,
                        ),
                    },
                }
            }
            Message::StepDue { generation, ticket } => {
                if generation != self.editor.generation() {
                    debug!(?ticket, "dropping step from a previously loaded session");
                    return;
                }
                if self.scheduled.as_ref().is_some_and(|s| s.ticket() == ticket) {
                    self.scheduled = None;
                }
                let action = self.controller.on_step_due(ticket, self.editor.len());
                self.apply(action);
            }
            Message::Remote { action, outcome } => match outcome {
                Outcome::Success(_) if action == RemoteAction::ClearScene => {
                    self.editor.reset_execution();
                    self.show("scene_cleared", json!({}), PromptTag::Notice);
                }
                Outcome::Success(_) => self.notice = Some(format!("{} sent", action.label())),
                Outcome::Failure(error) => self.show(
                    "remote_failed",
                    json!({ "action": action.label(), "error": error }),
                    PromptTag::Notice,
                ),
            },
        }
    }
}
