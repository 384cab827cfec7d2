//! Logging for the parlance binary using tracing
//!
//! Logs go to ~/.local/share/parlance/logs/parlance.log (or platform
//! equivalent). `--verbose` sends them to stderr instead.

use config::PathManager;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info,parlance_core=debug";

/// RUST_LOG wins, then the configured directive, then the default
fn env_filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Keep the returned guard alive for the
/// whole process or buffered file output is lost.
pub fn init_logging(verbose: bool, configured: Option<&str>) -> Option<WorkerGuard> {
    if verbose {
        init_stderr_logging(configured);
        return None;
    }

    let Some(path) = PathManager::log_file_path() else {
        init_stderr_logging(configured);
        return None;
    };

    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("[parlance] Failed to create log directory {:?}: {}", parent, e);
        }
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path);

    match file {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let subscriber = tracing_subscriber::registry()
                .with(env_filter(configured))
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                );

            match tracing::subscriber::set_global_default(subscriber) {
                Ok(()) => tracing::info!("Logging initialized, writing to {:?}", path),
                Err(e) => eprintln!("[parlance] Failed to set tracing subscriber: {}", e),
            }
            Some(guard)
        }
        Err(e) => {
            eprintln!("[parlance] Failed to open log file {:?}: {}", path, e);
            init_stderr_logging(configured);
            None
        }
    }
}

fn init_stderr_logging(configured: Option<&str>) {
    let subscriber = tracing_subscriber::registry().with(env_filter(configured)).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}
