use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LoggingConfig, ResolvedOutputs};

pub const TELEMETRY_FILE: &str = "telemetry.jsonl";

/// Keeps the background writer alive; dropping it flushes pending events.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    pub telemetry_path: PathBuf,
}

/// Directory that holds `telemetry.jsonl` and its summaries.
pub fn telemetry_dir(outputs: &ResolvedOutputs) -> PathBuf {
    outputs
        .summary_md
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Installs the JSON subscriber when `logging.enable_structured` is set.
pub fn init_logging(
    logging: &LoggingConfig,
    outputs: &ResolvedOutputs,
) -> Result<Option<LoggingGuard>> {
    if !logging.enable_structured {
        return Ok(None);
    }

    let dir = telemetry_dir(outputs);
    fs::create_dir_all(&dir)
        .with_context(|| format!("creating telemetry directory at {}", dir.display()))?;

    let telemetry_path = dir.join(TELEMETRY_FILE);
    // Appends so a later command never clobbers a run's events.
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&telemetry_path)
        .with_context(|| format!("opening telemetry file at {}", telemetry_path.display()))?;

    let (writer, guard) = non_blocking::NonBlockingBuilder::default()
        .lossy(false)
        .finish(file);

    let level = logging.level().unwrap_or(Level::INFO);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .json()
        .with_current_span(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(writer)
        .finish();

    // A global subscriber may already be installed (tests).
    let _ = tracing::subscriber::set_global_default(subscriber);

    Ok(Some(LoggingGuard {
        _guard: guard,
        telemetry_path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs(summary: &str) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: PathBuf::from("games.jsonl"),
            summary_md: PathBuf::from(summary),
            plots_dir: PathBuf::from("plots"),
        }
    }

    #[test]
    fn telemetry_lives_next_to_summary() {
        assert_eq!(
            telemetry_dir(&outputs("bench/out/run/summary.md")),
            PathBuf::from("bench/out/run")
        );
        assert_eq!(telemetry_dir(&outputs("summary.md")), PathBuf::from("."));
    }

    #[test]
    fn disabled_logging_installs_nothing() {
        let guard = init_logging(&LoggingConfig::default(), &outputs("summary.md"))
            .expect("disabled logging is infallible");
        assert!(guard.is_none());
    }

    #[test]
    fn structured_logging_keeps_existing_events() {
        let dir = tempfile::tempdir().expect("temp dir");
        let existing = dir.path().join(TELEMETRY_FILE);
        fs::write(&existing, "{\"target\":\"schnapsen_bench::game\"}\n").expect("seed log");

        let logging = LoggingConfig {
            enable_structured: true,
            ..LoggingConfig::default()
        };
        let summary = dir.path().join("summary.md");
        let guard = init_logging(&logging, &outputs(&summary.display().to_string()))
            .expect("structured logging installs")
            .expect("guard returned");
        assert_eq!(guard.telemetry_path, existing);
        drop(guard);

        let contents = fs::read_to_string(&existing).expect("log readable");
        assert!(contents.starts_with("{\"target\":\"schnapsen_bench::game\"}"));
    }
}
