//! Headless prompt presentation.
//!
//! The interactive editor answers prompts through a [`PromptSlot`](crate::PromptSlot)
//! driven by key presses. Code that runs without a UI (headless playback)
//! instead awaits a [`Prompter`].

use async_trait::async_trait;
use tracing::info;

use crate::template::{Prompt, PromptKind};

/// Presents a prompt and waits for the answer.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Show an acknowledgement-only prompt.
    async fn alert(&self, prompt: &Prompt);

    /// Show a confirm/cancel prompt. Returns `true` when confirmed.
    async fn confirm(&self, prompt: &Prompt) -> bool;
}

/// A prompter that never blocks and always gives the same answer.
///
/// Used for `--yes` style non-interactive runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

#[async_trait]
impl Prompter for FixedAnswer {
    async fn alert(&self, prompt: &Prompt) {
        info!(title = %prompt.title, message = %prompt.message, "alert");
    }

    async fn confirm(&self, prompt: &Prompt) -> bool {
        debug_assert_eq!(prompt.kind, PromptKind::Confirm);
        info!(title = %prompt.title, answer = self.0, "auto-answered prompt");
        self.0
    }
}
