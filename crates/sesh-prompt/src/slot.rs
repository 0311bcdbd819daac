//! Single open-prompt holder.
//!
//! A [`PromptSlot`] holds at most one open prompt together with a caller
//! supplied tag that says what to do once the prompt is answered. Prompts do
//! not stack: opening a second prompt while one is visible fails.

use crate::error::PromptError;
use crate::template::{Prompt, PromptKind};

/// How an open prompt was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    /// An alert was dismissed.
    Acknowledged,
    /// A confirm prompt was accepted.
    Confirmed,
    /// A confirm prompt was declined or closed.
    Cancelled,
}

impl PromptOutcome {
    /// Returns `true` only for [`PromptOutcome::Confirmed`].
    pub fn is_confirmed(self) -> bool {
        self == Self::Confirmed
    }
}

/// The answered prompt handed back to the caller together with its tag.
#[derive(Debug)]
pub struct PromptAnswer<T> {
    pub prompt: Prompt,
    pub tag: T,
    pub outcome: PromptOutcome,
}

/// Holds the one visible prompt, if any.
#[derive(Debug)]
pub struct PromptSlot<T> {
    open: Option<(Prompt, T)>,
}

impl<T> Default for PromptSlot<T> {
    fn default() -> Self {
        Self { open: None }
    }
}

impl<T> PromptSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `prompt`, remembering `tag` until it is answered.
    ///
    /// # Errors
    ///
    /// Returns `PromptError::AlreadyOpen` (and drops nothing) if a prompt is
    /// already visible. The rejected prompt and tag are handed back.
    pub fn open(&mut self, prompt: Prompt, tag: T) -> Result<(), (PromptError, Prompt, T)> {
        if let Some((current, _)) = &self.open {
            let err = PromptError::AlreadyOpen(current.title.clone());
            return Err((err, prompt, tag));
        }
        self.open = Some((prompt, tag));
        Ok(())
    }

    /// The visible prompt.
    pub fn current(&self) -> Option<&Prompt> {
        self.open.as_ref().map(|(prompt, _)| prompt)
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Accept the visible prompt. Alerts resolve as acknowledged.
    pub fn confirm(&mut self) -> Option<PromptAnswer<T>> {
        self.close(true)
    }

    /// Decline or close the visible prompt. Alerts resolve as acknowledged.
    pub fn cancel(&mut self) -> Option<PromptAnswer<T>> {
        self.close(false)
    }

    fn close(&mut self, accepted: bool) -> Option<PromptAnswer<T>> {
        let (prompt, tag) = self.open.take()?;
        let outcome = match (prompt.kind, accepted) {
            (PromptKind::Alert, _) => PromptOutcome::Acknowledged,
            (PromptKind::Confirm, true) => PromptOutcome::Confirmed,
            (PromptKind::Confirm, false) => PromptOutcome::Cancelled,
        };
        Some(PromptAnswer {
            prompt,
            tag,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_reject_second_prompt_while_open() {
        let mut slot = PromptSlot::new();
        slot.open(Prompt::alert("First", "one"), 1)
            .expect("first prompt should open");

        let (err, prompt, tag) = slot
            .open(Prompt::confirm("Second", "two"), 2)
            .expect_err("second prompt should be rejected");

        assert!(matches!(err, PromptError::AlreadyOpen(title) if title == "First"));
        assert_eq!(prompt.title, "Second");
        assert_eq!(tag, 2);
        assert_eq!(slot.current().map(|p| p.title.as_str()), Some("First"));
    }

    #[test]
    fn test_should_resolve_alert_as_acknowledged_on_either_path() {
        let mut slot = PromptSlot::new();
        slot.open(Prompt::alert("A", "a"), ()).expect("should open");
        let answer = slot.cancel().expect("should have an answer");
        assert_eq!(answer.outcome, PromptOutcome::Acknowledged);

        slot.open(Prompt::alert("B", "b"), ()).expect("should open");
        let answer = slot.confirm().expect("should have an answer");
        assert_eq!(answer.outcome, PromptOutcome::Acknowledged);
    }

    #[test]
    fn test_should_resolve_confirm_outcomes_with_tag() {
        let mut slot = PromptSlot::new();
        slot.open(Prompt::confirm("Delete", "sure?"), "delete-3")
            .expect("should open");
        let answer = slot.confirm().expect("should have an answer");
        assert!(answer.outcome.is_confirmed());
        assert_eq!(answer.tag, "delete-3");
        assert!(!slot.is_open());

        slot.open(Prompt::confirm("Delete", "sure?"), "delete-4")
            .expect("should open again once closed");
        let answer = slot.cancel().expect("should have an answer");
        assert_eq!(answer.outcome, PromptOutcome::Cancelled);
    }

    #[test]
    fn test_should_return_none_when_nothing_open() {
        let mut slot: PromptSlot<()> = PromptSlot::new();
        assert!(slot.confirm().is_none());
        assert!(slot.current().is_none());
    }
}
