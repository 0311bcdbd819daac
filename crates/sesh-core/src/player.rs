//! Headless playback.
//!
//! [`Player`] drives a [`PlaybackController`] straight against an
//! [`Executor`] and a [`Prompter`], without a UI event loop. It backs the
//! `sesh play` command and reports progress through [`PlayerEvent`]s.

use std::time::Duration;

use serde_json::{Value, json};
use sesh_prompt::{PromptManager, Prompter};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::CoreError;
use crate::executor::{Executor, Outcome};
use crate::playback::{PlaybackAction, PlaybackController, ScheduledStep};
use crate::session::Command;

/// Progress emitted while playing.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A step is about to be executed.
    StepStarted {
        index: usize,
        tool: String,
        description: Option<String>,
    },
    /// The step succeeded with the given payload.
    StepSucceeded { index: usize, payload: Value },
    /// The step failed.
    StepFailed { index: usize, error: String },
}

/// Summary of one headless run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Commands in the session.
    pub total: usize,
    /// Steps that succeeded.
    pub succeeded: usize,
    /// Steps that failed.
    pub failed: usize,
    /// The run reached the end of the session.
    pub completed: bool,
    /// The run was cancelled through its token.
    pub stopped: bool,
}

/// Plays a command list sequentially with a fixed delay between steps.
#[derive(Debug)]
pub struct Player<'a, E, P> {
    executor: &'a E,
    prompter: &'a P,
    prompts: &'a PromptManager,
    delay: Duration,
}

impl<'a, E, P> Player<'a, E, P>
where
    E: Executor,
    P: Prompter,
{
    pub fn new(executor: &'a E, prompter: &'a P, prompts: &'a PromptManager, delay: Duration) -> Self {
        Self {
            executor,
            prompter,
            prompts,
            delay,
        }
    }

    /// Play `commands` in order until the end, a declined error, or `cancel`.
    ///
    /// Cancelling during the inter-step delay prevents the next call from
    /// being issued. A call already in flight is allowed to finish; only its
    /// continuation is dropped.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Prompt` if the error prompt cannot be rendered.
    #[instrument(skip_all, fields(commands = commands.len(), delay_ms = self.delay.as_millis() as u64))]
    pub async fn play<F>(
        &self,
        commands: &[Command],
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> Result<PlaybackReport, CoreError>
    where
        F: FnMut(PlayerEvent),
    {
        let mut controller = PlaybackController::new(self.delay);
        let mut report = PlaybackReport {
            total: commands.len(),
            ..PlaybackReport::default()
        };
        let mut declined = false;
        let mut action = controller.start(commands.len());

        loop {
            action = match action {
                PlaybackAction::Execute(ticket) => {
                    let Some(command) = commands.get(ticket.index) else {
                        break;
                    };
                    on_event(PlayerEvent::StepStarted {
                        index: ticket.index,
                        tool: command.tool.clone(),
                        description: command.description.clone(),
                    });

                    let outcome = self.executor.execute(&command.tool, &command.arguments).await;
                    match &outcome {
                        Outcome::Success(payload) => {
                            report.succeeded += 1;
                            on_event(PlayerEvent::StepSucceeded {
                                index: ticket.index,
                                payload: payload.clone(),
                            });
                        }
                        Outcome::Failure(error) => {
                            report.failed += 1;
                            on_event(PlayerEvent::StepFailed {
                                index: ticket.index,
                                error: error.clone(),
                            });
                        }
                    }

                    if cancel.is_cancelled() {
                        controller.stop();
                        report.stopped = true;
                        break;
                    }
                    controller.on_outcome(ticket, &outcome)
                }
                PlaybackAction::Confirm { ticket, error } => {
                    let prompt = self.prompts.render(
                        "playback_error",
                        json!({ "index": ticket.index + 1, "error": error }),
                    )?;
                    let proceed = self.prompter.confirm(&prompt).await;
                    declined = !proceed;
                    controller.on_confirm(ticket, proceed)
                }
                PlaybackAction::Schedule { ticket, delay } => {
                    let (due_tx, due_rx) = oneshot::channel();
                    let step = ScheduledStep::spawn(ticket, delay, move |t| {
                        let _ = due_tx.send(t);
                    });

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            step.cancel();
                            controller.stop();
                            report.stopped = true;
                            break;
                        }
                        due = due_rx => match due {
                            Ok(ticket) => controller.on_step_due(ticket, commands.len()),
                            Err(_) => {
                                warn!("scheduled step dropped without firing");
                                break;
                            }
                        }
                    }
                }
                PlaybackAction::Finished => {
                    report.completed = !declined;
                    break;
                }
                PlaybackAction::Ignore => break,
            };
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            completed = report.completed,
            stopped = report.stopped,
            "playback finished"
        );
        Ok(report)
    }
}
