use crate::config::LoggingConfig;
use crate::paths;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "veil-core.log";

/// Overrides `logging.level` when set.
pub const LOG_ENV: &str = "VEIL_LOG";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
  /// Nothing is written under the base directory.
  StderrOnly,
  FileAndStderr,
}

pub fn init(base: &Path, cfg: &LoggingConfig, target: LogTarget) -> anyhow::Result<()> {
  let filter = EnvFilter::try_from_env(LOG_ENV)
    .or_else(|_| EnvFilter::try_new(&cfg.level))
    .unwrap_or_else(|_| EnvFilter::new("info"));

  let stderr_layer = tracing_subscriber::fmt::layer()
    .with_ansi(false)
    .with_writer(std::io::stderr)
    .with_target(false);

  let mut pruned = 0;
  let file_layer = match target {
    LogTarget::StderrOnly => None,
    LogTarget::FileAndStderr => {
      let log_dir = paths::logs_dir(base);
      fs::create_dir_all(&log_dir)?;
      pruned = prune_old_logs(&log_dir, cfg.retention_days);

      let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let _ = FILE_GUARD.set(guard);
      Some(
        tracing_subscriber::fmt::layer()
          .with_ansi(false)
          .with_writer(writer)
          .with_target(true),
      )
    }
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(file_layer)
    .with(stderr_layer)
    .try_init()?;

  if pruned > 0 {
    tracing::debug!(pruned, retention_days = cfg.retention_days, "removed old log files");
  }
  Ok(())
}

/// Removes rolled core logs older than `retention_days`; 0 keeps all.
fn prune_old_logs(log_dir: &Path, retention_days: u64) -> usize {
  if retention_days == 0 {
    return 0;
  }
  let cutoff = SystemTime::now()
    .checked_sub(Duration::from_secs(retention_days.saturating_mul(24 * 60 * 60)))
    .unwrap_or(SystemTime::UNIX_EPOCH);

  let Ok(entries) = fs::read_dir(log_dir) else {
    return 0;
  };
  entries
    .flatten()
    .filter(|e| is_core_log_file(&e.path()))
    .filter(|e| {
      e.metadata()
        .and_then(|m| m.modified())
        .is_ok_and(|t| t < cutoff)
    })
    .filter(|e| fs::remove_file(e.path()).is_ok())
    .count()
}

fn is_core_log_file(path: &Path) -> bool {
  path
    .file_name()
    .and_then(|n| n.to_str())
    .and_then(|n| n.strip_prefix(LOG_FILE_NAME))
    .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}
