//! Prompt and template types used by the prompt manager.
//!
//! A [`PromptTemplate`] pairs a title and a message template with the
//! [`PromptKind`] it is shown as. Rendering a template produces a [`Prompt`],
//! the plain-text value the UI (or a headless [`Prompter`](crate::Prompter))
//! presents to the user.

use serde::{Deserialize, Serialize};

/// How a prompt is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PromptKind {
    /// Acknowledgement only: a single dismissal path.
    Alert,
    /// Two outcomes: confirm or cancel.
    Confirm,
}

/// A rendered prompt, ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub title: String,
    pub message: String,
}

impl Prompt {
    /// Build an acknowledgement-only prompt.
    pub fn alert(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::Alert,
            title: title.into(),
            message: message.into(),
        }
    }

    /// Build a confirm/cancel prompt.
    pub fn confirm(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::Confirm,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Named title and message templates for one prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Template name used for lookup (e.g., `playback_error`).
    pub name: String,

    /// How the rendered prompt is answered.
    pub kind: PromptKind,

    /// Raw Jinja2 source for the title line.
    pub title: String,

    /// Raw Jinja2 source for the message body.
    pub message: String,
}

/// Built-in prompts: `(name, kind, title, message)`.
pub(crate) const BUILTIN_TEMPLATES: &[(&str, PromptKind, &str, &str)] = &[
    (
        "playback_error",
        PromptKind::Confirm,
        "Command Error #{{ index }}",
        "Error: {{ error }}\n\nDo you want to continue playback?",
    ),
    (
        "execution_error",
        PromptKind::Alert,
        "Execution Error",
        "Error: {{ error }}",
    ),
    (
        "delete_command",
        PromptKind::Confirm,
        "Confirm Deletion",
        "Are you sure you want to delete command #{{ index }} ({{ tool }})?",
    ),
    (
        "clear_scene",
        PromptKind::Confirm,
        "Clear Scene",
        "This will delete ALL objects in the scene. Are you sure?",
    ),
    (
        "scene_cleared",
        PromptKind::Alert,
        "Scene Cleared",
        "All objects deleted. Run controls have been re-enabled.",
    ),
    (
        "remote_failed",
        PromptKind::Alert,
        "{{ action }} Failed",
        "{{ error }}",
    ),
    (
        "parse_error",
        PromptKind::Alert,
        "Parsing Error",
        "Error parsing {{ path }}. Please ensure it is a valid session recording.\n\n{{ error }}",
    ),
    (
        "session_saved",
        PromptKind::Alert,
        "Session Saved",
        "Wrote {{ path }}",
    ),
    (
        "save_failed",
        PromptKind::Alert,
        "Save Failed",
        "Could not write {{ path }}.\n\n{{ error }}",
    ),
];
