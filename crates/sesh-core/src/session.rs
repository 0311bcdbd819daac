//! Session model and file format.
//!
//! A [`Session`] is the JSON document written by the session recorder:
//! metadata plus an ordered list of [`Command`]s. Loading is all-or-nothing;
//! saving sanitizes every user-editable text field down to printable ASCII
//! and writes 2-space indented JSON to `<name>_edited.json`.
//!
//! Keys this model does not know about are kept in `extra` maps so that a
//! load/save cycle does not drop data written by newer recorders.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};
use tracing::{debug, instrument};

use crate::error::CoreError;

/// Suffix appended to the sanitized session name when saving.
pub const EXPORT_SUFFIX: &str = "_edited.json";

/// A recorded session: metadata plus ordered tool invocations.
///
/// # Examples
///
/// ```
/// use sesh_core::Session;
///
/// let json = br#"{
///   "metadata": { "name": "Tower", "model": "gpt", "created_at": "2025-01-01T00:00:00", "description": "" },
///   "commands": [
///     { "tool": "create_cube", "arguments": { "size": 2 }, "timestamp": 1000 }
///   ]
/// }"#;
///
/// let session = Session::from_slice(json).expect("valid session");
/// assert_eq!(session.commands.len(), 1);
/// assert_eq!(session.export_file_name(), "Tower_edited.json");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub metadata: SessionMetadata,

    #[serde(default)]
    pub commands: Vec<Command>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Descriptive session metadata.
///
/// Missing or `null` text fields load as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub model: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub created_at: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One recorded tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Tool name sent as `params.name`.
    pub tool: String,

    /// Tool arguments sent as `params.arguments`.
    #[serde(default)]
    pub arguments: Map<String, Value>,

    /// Recording time in epoch seconds. Kept as a JSON number so integer
    /// and fractional timestamps are written back unchanged.
    #[serde(default = "zero")]
    pub timestamp: Number,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Command {
    /// Create a command with no description, stamped at `timestamp` seconds.
    pub fn new(tool: impl Into<String>, arguments: Map<String, Value>, timestamp: u64) -> Self {
        Self {
            tool: tool.into(),
            arguments,
            timestamp: Number::from(timestamp),
            description: None,
            extra: Map::new(),
        }
    }

    /// Timestamp as fractional epoch seconds.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp.as_f64().unwrap_or_default()
    }

    /// Arguments as a JSON value, as sent on the wire.
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

fn zero() -> Number {
    Number::from(0)
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl Session {
    /// Parse a session from raw JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Parse` if the bytes are not a valid session document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes).map_err(CoreError::Parse)
    }

    /// Read and parse a session file.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` if the file cannot be read and
    /// `CoreError::Parse` if it is not a valid session document.
    #[instrument]
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let bytes = fs::read(path)?;
        let session = Self::from_slice(&bytes)?;
        debug!(
            name = %session.metadata.name,
            commands = session.commands.len(),
            "loaded session"
        );
        Ok(session)
    }

    /// Strip non-printable and non-ASCII characters from every editable text field.
    pub fn sanitize(&mut self) {
        let meta = &mut self.metadata;
        meta.name = sanitize_text(&meta.name);
        meta.model = sanitize_text(&meta.model);
        meta.description = sanitize_text(&meta.description);

        for command in &mut self.commands {
            if let Some(description) = command.description.as_mut() {
                *description = sanitize_text(description);
            }
        }
    }

    /// Serialize a sanitized copy of the session as 2-space indented JSON.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Serialize` if serialization fails.
    pub fn to_json(&self) -> Result<String, CoreError> {
        let mut clean = self.clone();
        clean.sanitize();
        serde_json::to_string_pretty(&clean).map_err(CoreError::Serialize)
    }

    /// File name used when saving: sanitized name with whitespace runs
    /// collapsed to `_`, followed by `_edited.json`.
    pub fn export_file_name(&self) -> String {
        let name = sanitize_text(&self.metadata.name);
        let mut stem = String::with_capacity(name.len());
        let mut in_whitespace = false;

        for c in name.chars() {
            if c.is_whitespace() {
                if !in_whitespace {
                    stem.push('_');
                }
                in_whitespace = true;
                continue;
            }
            in_whitespace = false;
            stem.push(if c == '/' || c == '\\' { '_' } else { c });
        }

        format!("{stem}{EXPORT_SUFFIX}")
    }

    /// Write the sanitized session into `dir` under [`export_file_name`](Self::export_file_name).
    ///
    /// Returns the path that was written.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` if the directory or file cannot be written.
    #[instrument(skip(self), fields(name = %self.metadata.name))]
    pub fn save_to_dir(&self, dir: &Path) -> Result<PathBuf, CoreError> {
        let json = self.to_json()?;
        fs::create_dir_all(dir)?;
        let path = dir.join(self.export_file_name());
        fs::write(&path, json)?;
        debug!(path = %path.display(), commands = self.commands.len(), "saved session");
        Ok(path)
    }
}

/// Keep printable ASCII plus line breaks and tabs; drop everything else.
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| matches!(c, ' '..='~' | '\n' | '\r' | '\t'))
        .collect()
}
