//! Playback state machine.
//!
//! [`PlaybackController`] decides what happens next during playback; it never
//! performs I/O itself. Callers feed it step results and user answers and act
//! on the returned [`PlaybackAction`]: execute a command, arm a
//! [`ScheduledStep`] for the inter-step delay, ask whether to continue after
//! a failure, or finish.
//!
//! ```text
//! Idle ──start──▶ Running ──failure──▶ PausedOnError ──decline──▶ Stopped
//!                   ▲  │                     │
//!                   │  └──success: delay─────┤confirm: delay
//!                   └────────step due────────┘
//! ```
//!
//! Every step is identified by a [`StepTicket`] carrying the run generation,
//! so results that arrive after a `stop()` (or from an earlier run) are
//! ignored instead of driving the current run.
//!
//! # Edge cases
//!
//! - **Empty session**: `start(0)` is a no-op.
//! - **Start while active**: a no-op; only one run exists at a time.
//! - **Commands deleted mid-run**: the due index is checked against the live
//!   length, and playback stops once it runs past the end.
//! - **Hung call**: no timeout; the run waits until the user stops it.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::executor::Outcome;

/// Inter-step delay used when none (or an invalid one) is configured.
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(500);

/// Parse a user-entered delay in milliseconds.
///
/// Empty, non-numeric and zero input fall back to [`DEFAULT_STEP_DELAY`].
pub fn parse_delay(input: &str) -> Duration {
    input
        .trim()
        .parse::<u64>()
        .map_or(DEFAULT_STEP_DELAY, normalize_delay)
}

/// Milliseconds to a step delay; zero falls back to [`DEFAULT_STEP_DELAY`].
pub fn normalize_delay(ms: u64) -> Duration {
    if ms == 0 {
        DEFAULT_STEP_DELAY
    } else {
        Duration::from_millis(ms)
    }
}

/// Identifies one step of one playback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTicket {
    run: u64,
    /// Index into the live command sequence.
    pub index: usize,
}

impl StepTicket {
    fn next(self) -> Self {
        Self {
            run: self.run,
            index: self.index + 1,
        }
    }
}

/// Playback lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing has been played yet.
    #[default]
    Idle,
    /// A step is executing or waiting for its delay.
    Running(StepTicket),
    /// A step failed and the user is being asked whether to continue.
    PausedOnError(StepTicket),
    /// The last run finished or was stopped.
    Stopped,
}

/// What the caller should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackAction {
    /// Execute the command at `ticket.index` now.
    Execute(StepTicket),
    /// Wait `delay`, then report [`PlaybackController::on_step_due`] for `ticket`.
    Schedule { ticket: StepTicket, delay: Duration },
    /// Ask the user whether to continue after a failed step.
    Confirm { ticket: StepTicket, error: String },
    /// The run ended (completed, declined, or stopped).
    Finished,
    /// Nothing to do: stale ticket or invalid transition.
    Ignore,
}

/// The playback state machine.
#[derive(Debug)]
pub struct PlaybackController {
    state: PlaybackState,
    delay: Duration,
    run: u64,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_DELAY)
    }
}

impl PlaybackController {
    pub fn new(delay: Duration) -> Self {
        Self {
            state: PlaybackState::Idle,
            delay,
            run: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Returns `true` while a run is executing or paused on an error.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            PlaybackState::Running(_) | PlaybackState::PausedOnError(_)
        )
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Change the inter-step delay. Takes effect for the next scheduled step.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Begin a new run over `len` commands.
    #[instrument(skip(self))]
    pub fn start(&mut self, len: usize) -> PlaybackAction {
        if self.is_active() {
            debug!("playback already active, ignoring start");
            return PlaybackAction::Ignore;
        }
        if len == 0 {
            debug!("no commands to play");
            return PlaybackAction::Ignore;
        }

        self.run += 1;
        let ticket = StepTicket {
            run: self.run,
            index: 0,
        };
        self.state = PlaybackState::Running(ticket);
        info!(run = self.run, len, "playback started");
        PlaybackAction::Execute(ticket)
    }

    /// Report the outcome of the step identified by `ticket`.
    pub fn on_outcome(&mut self, ticket: StepTicket, outcome: &Outcome) -> PlaybackAction {
        if self.state != PlaybackState::Running(ticket) {
            debug!(?ticket, state = ?self.state, "ignoring stale step outcome");
            return PlaybackAction::Ignore;
        }

        match outcome {
            Outcome::Success(_) => self.schedule_after(ticket),
            Outcome::Failure(error) => {
                self.state = PlaybackState::PausedOnError(ticket);
                PlaybackAction::Confirm {
                    ticket,
                    error: error.clone(),
                }
            }
        }
    }

    /// Report the user's answer to a [`PlaybackAction::Confirm`].
    pub fn on_confirm(&mut self, ticket: StepTicket, proceed: bool) -> PlaybackAction {
        if self.state != PlaybackState::PausedOnError(ticket) {
            debug!(?ticket, state = ?self.state, "ignoring stale confirmation");
            return PlaybackAction::Ignore;
        }

        if proceed {
            self.schedule_after(ticket)
        } else {
            info!(index = ticket.index, "playback declined after error");
            self.finish()
        }
    }

    /// Report that the delay before `ticket` elapsed. `len` is the live
    /// length of the command sequence.
    pub fn on_step_due(&mut self, ticket: StepTicket, len: usize) -> PlaybackAction {
        if self.state != PlaybackState::Running(ticket) {
            debug!(?ticket, state = ?self.state, "ignoring stale step");
            return PlaybackAction::Ignore;
        }
        if ticket.index >= len {
            info!(steps = ticket.index, "playback completed");
            return self.finish();
        }
        PlaybackAction::Execute(ticket)
    }

    /// Stop the active run. Returns `true` if a run was active.
    pub fn stop(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        info!(run = self.run, "playback stopped");
        self.state = PlaybackState::Stopped;
        true
    }

    fn schedule_after(&mut self, ticket: StepTicket) -> PlaybackAction {
        let next = ticket.next();
        self.state = PlaybackState::Running(next);
        PlaybackAction::Schedule {
            ticket: next,
            delay: self.delay,
        }
    }

    fn finish(&mut self) -> PlaybackAction {
        self.state = PlaybackState::Stopped;
        PlaybackAction::Finished
    }
}

/// A queued step waiting for its delay, cancellable until it fires.
#[derive(Debug)]
pub struct ScheduledStep {
    ticket: StepTicket,
    handle: JoinHandle<()>,
}

impl ScheduledStep {
    /// Arm a timer that calls `on_due(ticket)` after `delay`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(ticket: StepTicket, delay: Duration, on_due: F) -> Self
    where
        F: FnOnce(StepTicket) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_due(ticket);
        });
        Self { ticket, handle }
    }

    pub fn ticket(&self) -> StepTicket {
        self.ticket
    }

    /// Cancel the step. `on_due` will not run unless it already has.
    pub fn cancel(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde_json::json;

    use super::*;

    fn success() -> Outcome {
        Outcome::Success(json!({}))
    }

    fn failure() -> Outcome {
        Outcome::Failure("boom".to_owned())
    }

    fn expect_execute(action: PlaybackAction) -> StepTicket {
        match action {
            PlaybackAction::Execute(ticket) => ticket,
            other => panic!("expected Execute, got {other:?}"),
        }
    }

    fn expect_schedule(action: PlaybackAction) -> StepTicket {
        match action {
            PlaybackAction::Schedule { ticket, .. } => ticket,
            other => panic!("expected Schedule, got {other:?}"),
        }
    }

    #[test]
    fn test_should_parse_delay_with_fallback() {
        assert_eq!(parse_delay("250"), Duration::from_millis(250));
        assert_eq!(parse_delay(" 1000 "), Duration::from_millis(1000));
        assert_eq!(parse_delay(""), DEFAULT_STEP_DELAY);
        assert_eq!(parse_delay("fast"), DEFAULT_STEP_DELAY);
        assert_eq!(parse_delay("0"), DEFAULT_STEP_DELAY);
        assert_eq!(parse_delay("-5"), DEFAULT_STEP_DELAY);
    }

    #[test]
    fn test_should_ignore_start_with_no_commands() {
        let mut controller = PlaybackController::default();
        assert_eq!(controller.start(0), PlaybackAction::Ignore);
        assert_eq!(controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_should_walk_all_steps_then_finish() {
        let mut controller = PlaybackController::new(Duration::from_millis(10));
        let mut ticket = expect_execute(controller.start(2));
        assert_eq!(ticket.index, 0);

        let next = controller.on_outcome(ticket, &success());
        assert_eq!(
            next,
            PlaybackAction::Schedule {
                ticket: ticket.next(),
                delay: Duration::from_millis(10),
            }
        );
        ticket = expect_execute(controller.on_step_due(expect_schedule(next), 2));
        assert_eq!(ticket.index, 1);

        let due = expect_schedule(controller.on_outcome(ticket, &success()));
        assert_eq!(controller.on_step_due(due, 2), PlaybackAction::Finished);
        assert_eq!(controller.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_should_ignore_start_while_running() {
        let mut controller = PlaybackController::default();
        let ticket = expect_execute(controller.start(3));
        assert_eq!(controller.start(3), PlaybackAction::Ignore);
        assert_eq!(controller.state(), PlaybackState::Running(ticket));
    }

    #[test]
    fn test_should_pause_on_failure_and_continue_when_confirmed() {
        let mut controller = PlaybackController::default();
        let ticket = expect_execute(controller.start(3));

        let action = controller.on_outcome(ticket, &failure());
        assert_eq!(
            action,
            PlaybackAction::Confirm {
                ticket,
                error: "boom".to_owned()
            }
        );
        assert_eq!(controller.state(), PlaybackState::PausedOnError(ticket));

        let due = expect_schedule(controller.on_confirm(ticket, true));
        assert_eq!(due.index, 1);
    }

    #[test]
    fn test_should_stop_when_continuation_declined() {
        let mut controller = PlaybackController::default();
        let ticket = expect_execute(controller.start(3));
        controller.on_outcome(ticket, &failure());

        assert_eq!(controller.on_confirm(ticket, false), PlaybackAction::Finished);
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(!controller.is_active());
    }

    #[test]
    fn test_should_ignore_events_after_stop() {
        let mut controller = PlaybackController::default();
        let ticket = expect_execute(controller.start(3));
        assert!(controller.stop());
        assert!(!controller.stop());

        assert_eq!(controller.on_outcome(ticket, &success()), PlaybackAction::Ignore);
        assert_eq!(controller.on_step_due(ticket.next(), 3), PlaybackAction::Ignore);
    }

    #[test]
    fn test_should_ignore_tickets_from_previous_run() {
        let mut controller = PlaybackController::default();
        let old = expect_execute(controller.start(2));
        controller.stop();

        let new = expect_execute(controller.start(2));
        assert_eq!(old.index, new.index);
        assert_ne!(old, new);
        assert_eq!(controller.on_outcome(old, &success()), PlaybackAction::Ignore);
        assert_eq!(controller.state(), PlaybackState::Running(new));
    }

    #[test]
    fn test_should_finish_when_commands_removed_mid_run() {
        let mut controller = PlaybackController::default();
        let ticket = expect_execute(controller.start(3));
        let due = expect_schedule(controller.on_outcome(ticket, &success()));

        // Two commands were deleted while the delay was pending.
        assert_eq!(controller.on_step_due(due, 1), PlaybackAction::Finished);
    }

    #[test]
    fn test_should_apply_new_delay_to_next_step() {
        let mut controller = PlaybackController::new(Duration::from_millis(500));
        let ticket = expect_execute(controller.start(2));
        controller.set_delay(Duration::from_millis(50));

        match controller.on_outcome(ticket, &success()) {
            PlaybackAction::Schedule { delay, .. } => assert_eq!(delay, Duration::from_millis(50)),
            other => panic!("expected Schedule, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_should_fire_scheduled_step_after_delay() {
        let mut controller = PlaybackController::default();
        let ticket = expect_execute(controller.start(2));
        let (tx, rx) = tokio::sync::oneshot::channel();

        let start = std::time::Instant::now();
        let step = ScheduledStep::spawn(ticket.next(), Duration::from_millis(30), move |t| {
            let _ = tx.send(t);
        });
        assert_eq!(step.ticket(), ticket.next());

        let fired = rx.await.expect("step should fire");
        assert_eq!(fired, ticket.next());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_should_not_fire_cancelled_step() {
        let mut controller = PlaybackController::default();
        let ticket = expect_execute(controller.start(2));
        let fired = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&fired);
        let step = ScheduledStep::spawn(ticket.next(), Duration::from_millis(20), move |_| {
            flag.store(true, Ordering::SeqCst);
        });
        step.cancel();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
