//! Tracing setup and log retention.
//!
//! Headless commands log human-readable lines to stderr. The interactive
//! editor owns the terminal, so it logs JSON lines to
//! `<state dir>/logs/<command>/<YYYYMMDD_HHMMSS>.log` instead.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;

/// Log files older than this are removed at startup.
const LOG_RETENTION: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget<'a> {
    Stderr,
    /// JSON file under `logs/<command>/`.
    File(&'a str),
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held until
/// exit.
///
/// # Errors
///
/// Returns an error if the log file cannot be created.
pub fn init_tracing(state_dir: &Path, target: LogTarget<'_>) -> Result<Option<WorkerGuard>> {
    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(env_filter())
                .init();
            Ok(None)
        }
        LogTarget::File(command) => {
            let (writer, guard) = open_log_writer(state_dir, command)?;
            tracing_subscriber::fmt()
                .json()
                .with_writer(writer)
                .with_env_filter(env_filter())
                .init();
            Ok(Some(guard))
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn open_log_writer(state_dir: &Path, command: &str) -> Result<(NonBlocking, WorkerGuard)> {
    let dir = state_dir.join("logs").join(command);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let path = dir.join(log_file_name(SystemTime::now()));
    let file = fs::File::create(&path)
        .with_context(|| format!("failed to create log file: {}", path.display()))?;

    Ok(tracing_appender::non_blocking(file))
}

fn log_file_name(now: SystemTime) -> String {
    format!("{}.log", utc_stamp(now))
}

/// `YYYYMMDD_HHMMSS` in UTC.
fn utc_stamp(time: SystemTime) -> String {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let (year, month, day) = civil_date(secs / 86_400);
    let clock = secs % 86_400;

    format!(
        "{year:04}{month:02}{day:02}_{:02}{:02}{:02}",
        clock / 3600,
        clock % 3600 / 60,
        clock % 60
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_date(days: u64) -> (i64, u32, u32) {
    // Hinnant's civil_from_days, with eras counted from 0000-03-01.
    let z = days as i64 + 719_468;
    let era = z.div_euclid(146_097);
    let day_of_era = z.rem_euclid(146_097);
    let year_of_era = (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let shifted_month = (5 * day_of_year + 2) / 153;
    let day = (day_of_year - (153 * shifted_month + 2) / 5 + 1) as u32;
    let month = (if shifted_month < 10 { shifted_month + 3 } else { shifted_month - 9 }) as u32;
    let year = year_of_era + era * 400 + i64::from(month <= 2);

    (year, month, day)
}

/// Remove expired `.log` files under `<state dir>/logs` and prune empty
/// command directories.
///
/// Runs before tracing is installed, so problems go to stderr and never
/// abort startup.
pub fn cleanup_old_logs(state_dir: &Path) {
    let logs = state_dir.join("logs");
    if !logs.is_dir() {
        return;
    }
    let Some(cutoff) = SystemTime::now().checked_sub(LOG_RETENTION) else {
        return;
    };

    for path in log_files(&logs) {
        let expired = fs::metadata(&path)
            .and_then(|m| m.modified())
            .is_ok_and(|modified| modified < cutoff);
        if expired && let Err(e) = fs::remove_file(&path) {
            eprintln!("warning: failed to remove old log {}: {e}", path.display());
        }
    }

    if let Ok(entries) = fs::read_dir(&logs) {
        for dir in entries.flatten().map(|e| e.path()).filter(|p| p.is_dir()) {
            // Fails while the directory still has files.
            let _ = fs::remove_dir(&dir);
        }
    }
}

/// Every `.log` file one level below `logs`.
fn log_files(logs: &Path) -> Vec<PathBuf> {
    let Ok(commands) = fs::read_dir(logs) else {
        return Vec::new();
    };
    commands
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter_map(|dir| fs::read_dir(dir).ok())
        .flat_map(|files| files.flatten().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "log"))
        .collect()
}

#[cfg(test)]
mod tests {
    use filetime::FileTime;
    use tempfile::TempDir;

    use super::*;

    fn backdate(path: &Path, days: u64) {
        let then = SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60);
        filetime::set_file_mtime(path, FileTime::from_system_time(then)).expect("should set mtime");
    }

    #[test]
    fn test_should_format_utc_stamp() {
        assert_eq!(utc_stamp(UNIX_EPOCH), "19700101_000000");
        // 2026-02-03 14:30:12 UTC
        let time = UNIX_EPOCH + Duration::from_secs(1_770_129_012);
        assert_eq!(utc_stamp(time), "20260203_143012");
    }

    #[test]
    fn test_should_convert_leap_days() {
        assert_eq!(civil_date(10_957), (2000, 1, 1));
        assert_eq!(civil_date(19_782), (2024, 2, 29));
    }

    #[test]
    fn test_should_create_log_file_under_command_dir() {
        let dir = TempDir::new().expect("should create temp dir");
        let (_writer, _guard) = open_log_writer(dir.path(), "edit").expect("should open");

        let files: Vec<_> = fs::read_dir(dir.path().join("logs").join("edit"))
            .expect("should list")
            .flatten()
            .map(|e| e.path())
            .collect();
        assert_eq!(files.len(), 1);

        let stem = files[0]
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_owned();
        assert_eq!(stem.len(), 15);
        assert_eq!(&stem[8..9], "_");
    }

    #[test]
    fn test_should_fail_when_log_dir_cannot_be_created() {
        assert!(open_log_writer(Path::new("/dev/null"), "edit").is_err());
    }

    #[test]
    fn test_should_remove_only_expired_log_files() {
        let dir = TempDir::new().expect("should create temp dir");
        let edit = dir.path().join("logs").join("edit");
        fs::create_dir_all(&edit).expect("should create");

        let fresh = edit.join("fresh.log");
        let stale = edit.join("stale.log");
        let notes = edit.join("notes.txt");
        for path in [&fresh, &stale, &notes] {
            fs::write(path, "x").expect("should write");
        }
        backdate(&stale, 4);
        backdate(&notes, 4);

        cleanup_old_logs(dir.path());

        assert!(fresh.exists());
        assert!(!stale.exists());
        assert!(notes.exists());
    }

    #[test]
    fn test_should_prune_emptied_command_dirs() {
        let dir = TempDir::new().expect("should create temp dir");
        let play = dir.path().join("logs").join("play");
        fs::create_dir_all(&play).expect("should create");
        let old = play.join("old.log");
        fs::write(&old, "x").expect("should write");
        backdate(&old, 10);

        cleanup_old_logs(dir.path());

        assert!(!play.exists());
        assert!(dir.path().join("logs").is_dir());
    }

    #[test]
    fn test_should_ignore_missing_logs_dir() {
        let dir = TempDir::new().expect("should create temp dir");
        cleanup_old_logs(dir.path());
    }
}
