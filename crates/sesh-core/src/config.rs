//! Configuration types for sesh-core.
//!
//! This module defines [`EditorConfig`] (CLI-level overrides), [`Settings`]
//! (from `<state dir>/config.yaml`) and [`LocalState`] (from
//! `<state dir>/state.yaml`). [`EditorConfig::resolve`] merges the first two
//! into a [`RuntimeConfig`], with CLI values taking precedence.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::error::CoreError;
use crate::playback::{DEFAULT_STEP_DELAY, normalize_delay};

/// Server used when neither the CLI nor `config.yaml` names one.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

// ── Editor Configuration (CLI-level) ─────────────────────────

/// Configuration provided by the CLI layer.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use sesh_core::EditorConfig;
///
/// let config = EditorConfig::builder()
///     .state_dir(PathBuf::from("/tmp/sesh"))
///     .server_url("http://localhost:9000")
///     .build();
/// assert_eq!(config.server_url(), Some("http://localhost:9000"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct EditorConfig {
    /// Directory holding `config.yaml`, `state.yaml` and logs.
    state_dir: PathBuf,

    /// Override the server URL.
    #[builder(default, setter(strip_option, into))]
    #[serde(skip_serializing_if = "Option::is_none")]
    server_url: Option<String>,

    /// Override the delay between playback steps, in milliseconds.
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    delay_ms: Option<u64>,
}

impl EditorConfig {
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn server_url(&self) -> Option<&str> {
        self.server_url.as_deref()
    }

    pub fn delay_ms(&self) -> Option<u64> {
        self.delay_ms
    }

    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join("config.yaml")
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join("state.yaml")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    /// Load `config.yaml` and merge it with the CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` or `CoreError::Yaml` if `config.yaml` exists
    /// but cannot be read.
    pub fn resolve(&self) -> Result<RuntimeConfig, CoreError> {
        let settings = load_settings(&self.config_path())?;
        Ok(self.merge(settings))
    }

    /// Merge file settings with the CLI overrides.
    pub fn merge(&self, settings: Settings) -> RuntimeConfig {
        let server_url = self
            .server_url
            .clone()
            .unwrap_or(settings.server.url)
            .trim_end_matches('/')
            .to_owned();
        let delay_ms = self.delay_ms.unwrap_or(settings.playback.delay_ms);

        RuntimeConfig {
            server_url,
            poll_interval: Duration::from_secs(settings.server.poll_interval_secs.max(1)),
            step_delay: normalize_delay(delay_ms),
            state_dir: self.state_dir.clone(),
        }
    }
}

/// Fully resolved settings used at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub server_url: String,
    pub poll_interval: Duration,
    pub step_delay: Duration,
    pub state_dir: PathBuf,
}

// ── Settings (config.yaml) ───────────────────────────────────

/// User settings, deserialized from `config.yaml`.
///
/// Every key has a serde default so a partial file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub playback: PlaybackSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    /// Base URL of the MCP server.
    #[serde(default = "default_server_url")]
    pub url: String,

    /// Seconds between health probes.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSettings {
    /// Delay between steps. Zero falls back to the default.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_owned()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_delay_ms() -> u64 {
    DEFAULT_STEP_DELAY.as_millis() as u64
}

// ── Local state (state.yaml) ─────────────────────────────────

/// Color theme of the editor.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

/// State remembered between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalState {
    #[serde(default)]
    pub theme: Theme,
}

// ── Loading ──────────────────────────────────────────────────

/// Load [`Settings`] from `path`.
///
/// If the file does not exist, returns the default settings.
///
/// # Errors
///
/// Returns `CoreError::Io` if the file exists but cannot be read.
/// Returns `CoreError::Yaml` if the file contains invalid YAML.
pub fn load_settings(path: &Path) -> Result<Settings, CoreError> {
    load_yaml_or_default(path)
}

/// Load [`LocalState`] from `path`, or the default if it does not exist.
///
/// # Errors
///
/// Returns `CoreError::Io` or `CoreError::Yaml`.
pub fn load_local_state(path: &Path) -> Result<LocalState, CoreError> {
    load_yaml_or_default(path)
}

/// Write [`LocalState`] to `path`, creating the parent directory.
///
/// # Errors
///
/// Returns `CoreError::Io` or `CoreError::Yaml`.
pub fn save_local_state(path: &Path, state: &LocalState) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_yaml::to_string(state)?)?;
    debug!(path = %path.display(), theme = ?state.theme, "saved local state");
    Ok(())
}

fn load_yaml_or_default<T>(path: &Path) -> Result<T, CoreError>
where
    T: Default + serde::de::DeserializeOwned,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_yaml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_should_build_editor_config_with_defaults() {
        let config = EditorConfig::builder()
            .state_dir(PathBuf::from("/tmp/sesh"))
            .build();

        assert_eq!(config.server_url(), None);
        assert_eq!(config.delay_ms(), None);
        assert_eq!(config.config_path(), PathBuf::from("/tmp/sesh/config.yaml"));
        assert_eq!(config.logs_dir(), PathBuf::from("/tmp/sesh/logs"));
    }

    #[test]
    fn test_should_deserialize_partial_settings() {
        let yaml = "server:\n  url: http://10.0.0.2:8000\n";
        let settings: Settings = serde_yaml::from_str(yaml).expect("should parse");

        assert_eq!(settings.server.url, "http://10.0.0.2:8000");
        assert_eq!(settings.server.poll_interval_secs, 5);
        assert_eq!(settings.playback.delay_ms, 500);
    }

    #[test]
    fn test_should_prefer_cli_overrides_when_merging() {
        let settings: Settings = serde_yaml::from_str(
            "server:\n  url: http://file:1/\n  pollIntervalSecs: 2\nplayback:\n  delayMs: 900\n",
        )
        .expect("should parse");

        let from_file = EditorConfig::builder()
            .state_dir(PathBuf::from("/tmp/sesh"))
            .build()
            .merge(settings.clone());
        assert_eq!(from_file.server_url, "http://file:1");
        assert_eq!(from_file.poll_interval, Duration::from_secs(2));
        assert_eq!(from_file.step_delay, Duration::from_millis(900));

        let overridden = EditorConfig::builder()
            .state_dir(PathBuf::from("/tmp/sesh"))
            .server_url("http://cli:2")
            .delay_ms(0)
            .build()
            .merge(settings);
        assert_eq!(overridden.server_url, "http://cli:2");
        assert_eq!(overridden.step_delay, DEFAULT_STEP_DELAY);
    }

    #[test]
    fn test_should_resolve_defaults_without_config_file() {
        let dir = TempDir::new().expect("should create temp dir");
        let runtime = EditorConfig::builder()
            .state_dir(dir.path().to_path_buf())
            .build()
            .resolve()
            .expect("should resolve");

        assert_eq!(runtime.server_url, DEFAULT_SERVER_URL);
        assert_eq!(runtime.step_delay, DEFAULT_STEP_DELAY);
    }

    #[test]
    fn test_should_reject_invalid_config_yaml() {
        let dir = TempDir::new().expect("should create temp dir");
        let path = dir.path().join("config.yaml");
        fs::write(&path, "server: [unclosed").expect("should write");

        assert!(matches!(load_settings(&path), Err(CoreError::Yaml(_))));
    }

    #[test]
    fn test_should_persist_theme_across_loads() {
        let dir = TempDir::new().expect("should create temp dir");
        let path = dir.path().join("nested").join("state.yaml");

        assert_eq!(load_local_state(&path).expect("default").theme, Theme::Dark);

        let state = LocalState {
            theme: Theme::Dark.toggled(),
        };
        save_local_state(&path, &state).expect("should save");

        let content = fs::read_to_string(&path).expect("should read");
        assert!(content.contains("theme: light"));
        assert_eq!(load_local_state(&path).expect("should load"), state);
    }
}
