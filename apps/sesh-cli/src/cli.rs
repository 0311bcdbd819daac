use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use sesh_core::{
    EditorConfig, HealthProbe, McpClient, PlayerEvent, PlaybackReport, Player, RuntimeConfig,
    Session,
};
use sesh_prompt::{FixedAnswer, PromptManager, Prompter};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::console::ConsolePrompter;
use crate::logging::LogTarget;
use crate::tui::{self, EditTarget};

#[derive(Debug, Parser)]
#[command(name = "sesh", version, about = "Edit and replay recorded MCP tool-call sessions")]
pub struct Cli {
    /// MCP server base URL [default: http://localhost:8000]
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Directory for config.yaml, state.yaml and logs [default: <config dir>/sesh]
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Open a recorded session in the interactive editor
    Edit {
        /// Session file to load
        file: PathBuf,

        /// Where edited sessions are saved (defaults to the session's directory)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Replay a recorded session against the server without the editor
    Play {
        /// Session file to play
        file: PathBuf,

        /// Delay between steps in milliseconds
        #[arg(short, long)]
        delay: Option<u64>,

        /// Continue past failed steps without asking
        #[arg(short, long, conflicts_with = "stop_on_error")]
        yes: bool,

        /// Stop at the first failed step without asking
        #[arg(long)]
        stop_on_error: bool,
    },

    /// Check whether the server is reachable
    Check,
}

impl Cli {
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sesh")
        })
    }

    /// The editor owns the terminal, so it logs to a file.
    pub fn log_target(&self) -> LogTarget<'static> {
        match self.command {
            Commands::Edit { .. } => LogTarget::File("edit"),
            Commands::Play { .. } | Commands::Check => LogTarget::Stderr,
        }
    }

    fn editor_config(&self) -> EditorConfig {
        let delay = match &self.command {
            Commands::Play { delay, .. } => *delay,
            _ => None,
        };
        let builder = EditorConfig::builder().state_dir(self.state_dir());
        match (self.server.clone(), delay) {
            (Some(server), Some(delay)) => builder.server_url(server).delay_ms(delay).build(),
            (Some(server), None) => builder.server_url(server).build(),
            (None, Some(delay)) => builder.delay_ms(delay).build(),
            (None, None) => builder.build(),
        }
    }

    pub async fn run(self) -> Result<()> {
        let config = self.editor_config();
        let runtime = config
            .resolve()
            .with_context(|| format!("failed to read {}", config.config_path().display()))?;

        match self.command {
            Commands::Edit { file, out_dir } => {
                let out_dir = out_dir.unwrap_or_else(|| default_out_dir(&file));
                let target = EditTarget {
                    file,
                    out_dir,
                    state_path: config.state_path(),
                };
                tui::run(&runtime, target).await
            }
            Commands::Play {
                file,
                yes,
                stop_on_error,
                ..
            } => {
                let report = if yes {
                    play(&runtime, &file, &FixedAnswer(true)).await?
                } else if stop_on_error {
                    play(&runtime, &file, &FixedAnswer(false)).await?
                } else {
                    play(&runtime, &file, &ConsolePrompter).await?
                };
                finish_play(&report)
            }
            Commands::Check => check(&runtime).await,
        }
    }
}

fn default_out_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

async fn play<P: Prompter>(runtime: &RuntimeConfig, file: &Path, prompter: &P) -> Result<PlaybackReport> {
    let session = Session::open(file).with_context(|| format!("failed to load {}", file.display()))?;
    let client = McpClient::new(runtime.server_url.as_str())?;
    let prompts = PromptManager::new().context("failed to load prompt templates")?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let total = session.commands.len();
    println!(
        "Playing {} ({total} commands) against {} with {} ms delay",
        file.display(),
        client.base_url(),
        runtime.step_delay.as_millis()
    );

    let player = Player::new(&client, prompter, &prompts, runtime.step_delay);
    let report = player
        .play(&session.commands, &cancel, |event| print_event(&event, total))
        .await?;
    Ok(report)
}

fn print_event(event: &PlayerEvent, total: usize) {
    match event {
        PlayerEvent::StepStarted {
            index,
            tool,
            description,
        } => match description {
            Some(description) => println!("[{}/{total}] {tool}: {description}", index + 1),
            None => println!("[{}/{total}] {tool}", index + 1),
        },
        PlayerEvent::StepSucceeded { payload, .. } => println!("  ok {payload}"),
        PlayerEvent::StepFailed { error, .. } => println!("  failed: {error}"),
    }
}

fn finish_play(report: &PlaybackReport) -> Result<()> {
    println!(
        "{} succeeded, {} failed, {} of {} commands run",
        report.succeeded,
        report.failed,
        report.succeeded + report.failed,
        report.total
    );
    if report.stopped {
        println!("Stopped by user");
        return Ok(());
    }
    if !report.completed && report.failed > 0 {
        bail!("playback stopped after a failed command");
    }
    Ok(())
}

async fn check(runtime: &RuntimeConfig) -> Result<()> {
    let client = McpClient::new(runtime.server_url.as_str())?;
    if client.probe().await {
        info!(server = client.base_url(), "server reachable");
        println!("Connected to {}", client.base_url());
        Ok(())
    } else {
        bail!("{} is not reachable", client.base_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_play_flags() {
        let cli = Cli::try_parse_from(["sesh", "play", "scene.json", "--delay", "250", "--yes"])
            .expect("should parse");
        assert!(matches!(
            cli.command,
            Commands::Play {
                delay: Some(250),
                yes: true,
                stop_on_error: false,
                ..
            }
        ));
        assert_eq!(cli.log_target(), LogTarget::Stderr);
    }

    #[test]
    fn test_should_reject_conflicting_error_policies() {
        let result = Cli::try_parse_from(["sesh", "play", "s.json", "--yes", "--stop-on-error"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_should_accept_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "sesh",
            "edit",
            "scene.json",
            "--server",
            "http://10.0.0.5:8000",
            "--state-dir",
            "/tmp/sesh-state",
        ])
        .expect("should parse");

        assert_eq!(cli.log_target(), LogTarget::File("edit"));
        assert_eq!(cli.state_dir(), PathBuf::from("/tmp/sesh-state"));

        let runtime = cli.editor_config().merge(Default::default());
        assert_eq!(runtime.server_url, "http://10.0.0.5:8000");
    }

    #[test]
    fn test_should_take_delay_override_only_for_play() {
        let cli = Cli::try_parse_from(["sesh", "--state-dir", "/tmp/s", "play", "a.json", "-d", "0"])
            .expect("should parse");
        assert_eq!(cli.editor_config().delay_ms(), Some(0));

        let cli = Cli::try_parse_from(["sesh", "check"]).expect("should parse");
        assert_eq!(cli.editor_config().delay_ms(), None);
    }

    #[test]
    fn test_should_save_next_to_source_by_default() {
        assert_eq!(default_out_dir(Path::new("scenes/house.json")), PathBuf::from("scenes"));
        assert_eq!(default_out_dir(Path::new("house.json")), PathBuf::from("."));
    }

    #[test]
    fn test_should_fail_when_declined_run_is_incomplete() {
        let declined = PlaybackReport {
            total: 3,
            succeeded: 1,
            failed: 1,
            ..PlaybackReport::default()
        };
        assert!(finish_play(&declined).is_err());

        let stopped = PlaybackReport {
            stopped: true,
            ..declined.clone()
        };
        assert!(finish_play(&stopped).is_ok());
    }
}
