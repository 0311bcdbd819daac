//! Interactive session editor.

mod app;
mod theme;
mod view;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use sesh_core::{
    ConnectionMonitor, ConnectionStatus, Editor, LocalState, McpClient, RuntimeConfig, Session,
    load_local_state,
};
use sesh_prompt::PromptManager;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use self::app::{App, AppContext, Message};

/// Where the editor reads and writes.
#[derive(Debug)]
pub struct EditTarget {
    pub file: PathBuf,
    pub out_dir: PathBuf,
    pub state_path: PathBuf,
}

/// Run the editor until the user quits.
///
/// # Errors
///
/// Returns an error if the terminal cannot be driven. Session, server and
/// state-file problems are reported inside the editor instead.
pub async fn run(config: &RuntimeConfig, target: EditTarget) -> Result<()> {
    let client = Arc::new(McpClient::new(config.server_url.as_str())?);
    let prompts = PromptManager::new().context("failed to load prompt templates")?;
    let local = load_local_state(&target.state_path).unwrap_or_else(|e| {
        warn!(error = %e, "ignoring unreadable local state");
        LocalState::default()
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let monitor = ConnectionMonitor::spawn(Arc::clone(&client), config.poll_interval);
    let mut status = monitor.subscribe();

    let (editor, load_error) = match Editor::open(&target.file) {
        Ok(editor) => (editor, None),
        Err(e) => (Editor::new(Session::default()), Some(e)),
    };
    let ctx = AppContext {
        client,
        prompts,
        out_dir: target.out_dir,
        state_path: target.state_path,
        step_delay: config.step_delay,
        theme: local.theme,
    };
    let mut app = App::new(editor, target.file.clone(), ctx, tx);
    if let Some(e) = load_error {
        app.show_load_error(&target.file, &e);
    }
    info!(file = %target.file.display(), commands = app.editor.len(), "editor started");

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut app, &mut rx, &mut status).await;
    ratatui::restore();
    drop(monitor);
    result
}

async fn event_loop(
    terminal: &mut DefaultTerminal,
    app: &mut App,
    rx: &mut mpsc::UnboundedReceiver<Message>,
    status: &mut watch::Receiver<ConnectionStatus>,
) -> Result<()> {
    let mut events = EventStream::new();

    while !app.should_quit() {
        terminal.draw(|frame| view::draw(frame, app))?;

        tokio::select! {
            Some(message) = rx.recv() => app.handle_message(message),
            Ok(()) = status.changed() => {
                let current = *status.borrow_and_update();
                app.set_connection(current);
            }
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) => app.handle_key(key),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("failed to read terminal event"),
                None => break,
            },
        }
    }

    Ok(())
}
