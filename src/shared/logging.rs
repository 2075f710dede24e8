use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps the background log writers alive. Dropping it flushes pending lines.
pub struct LogGuards {
    _file: WorkerGuard,
    _console: WorkerGuard,
}

pub fn init_logging(log_dir: &str, service_name: &str) -> Result<LogGuards, anyhow::Error> {
    std::fs::create_dir_all(log_dir)?;
    let rotated = rotate_logs_on_startup(log_dir, service_name)?;

    // Daily rotation on top of the startup backup
    let file_appender = rolling::daily(log_dir, format!("{service_name}.log"));
    let (non_blocking_file, file_guard) = non_blocking(file_appender);
    let (non_blocking_stdout, console_guard) = non_blocking(std::io::stdout());

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let console_layer = fmt::layer()
        .with_writer(non_blocking_stdout)
        .with_ansi(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false);

    // RUST_LOG wins when set
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    info!("Logging initialized - logs will be written to {log_dir}/{service_name}.log");
    if let Some(backup) = rotated {
        info!("Previous log file backed up to: {}", backup.display());
    }

    Ok(LogGuards {
        _file: file_guard,
        _console: console_guard,
    })
}

/// Moves an existing `<service>.log` aside with a timestamp suffix.
pub fn rotate_logs_on_startup(
    log_dir: &str,
    service_name: &str,
) -> Result<Option<PathBuf>, anyhow::Error> {
    let log_path = Path::new(log_dir).join(format!("{service_name}.log"));
    if !log_path.exists() {
        return Ok(None);
    }

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let backup = Path::new(log_dir).join(format!("{service_name}.{timestamp}.log"));
    std::fs::rename(&log_path, &backup)?;
    Ok(Some(backup))
}
