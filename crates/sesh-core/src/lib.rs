mod config;
mod editor;
mod error;
mod executor;
mod monitor;
mod playback;
mod player;
mod session;

pub use config::{
    DEFAULT_SERVER_URL, EditorConfig, LocalState, PlaybackSettings, RuntimeConfig, ServerSettings,
    Settings, Theme, load_local_state, load_settings, save_local_state,
};
pub use editor::{Editor, ExecStatus, RunId, VisibleCommand, parse_arguments};
pub use error::CoreError;
pub use executor::{
    Executor, HealthProbe, McpClient, Outcome, RemoteAction, normalize_response, tool_call_request,
};
pub use monitor::{ConnectionMonitor, ConnectionStatus, DEFAULT_POLL_INTERVAL};
pub use playback::{
    DEFAULT_STEP_DELAY, PlaybackAction, PlaybackController, PlaybackState, ScheduledStep,
    StepTicket, normalize_delay, parse_delay,
};
pub use player::{PlaybackReport, Player, PlayerEvent};
pub use session::{Command, EXPORT_SUFFIX, Session, SessionMetadata, sanitize_text};
