// ============================================================================
// squeeze-cli/src/logging.rs
// ============================================================================
//
// LOGGING SETUP: Console and File Logging for the CLI
//
// Console output goes through env_logger so RUST_LOG works as usual. When a
// log directory is given, fern fans every record out to a timestamped file as
// well. Console lines are printed through the progress-bar container so they
// do not tear through the bars.
//
// KEY COMPONENTS:
// - init_logging: Installs the global logger
// - get_timestamp: Timestamps for log file names
// - BarSafeWriter: stderr writer that suspends the progress bars
//
// USAGE:
// - default: info and above on the console
// - --verbose: debug on the console
// - RUST_LOG=squeeze=trace: anything env_logger accepts
//
// AI-ASSISTANT-INFO: Logging setup with env_logger, fern and chrono

// ---- External crate imports ----
use anyhow::Context;
use indicatif::MultiProgress;
use log::LevelFilter;

// ---- Standard library imports ----
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

// ---- Internal crate imports ----
use crate::error::CliResult;

/// Returns the current local timestamp formatted as "YYYYMMDD_HHMMSS".
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Log file name for a run started now.
#[must_use]
pub fn log_file_name() -> String {
    format!("squeeze_run_{}.log", get_timestamp())
}

/// Writes to stderr while the progress bars are hidden.
struct BarSafeWriter {
    multi: MultiProgress,
}

impl Write for BarSafeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.multi.suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Installs the global logger and returns the log file path, if any.
pub fn init_logging(
    verbose: bool,
    log_dir: Option<&Path>,
    multi: &MultiProgress,
) -> CliResult<Option<PathBuf>> {
    let default_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let console = env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .format_timestamp(None)
        .target(env_logger::Target::Pipe(Box::new(BarSafeWriter {
            multi: multi.clone(),
        })))
        .build();
    let mut max_level = console.filter();

    let mut dispatch = fern::Dispatch::new().chain(Box::new(console) as Box<dyn log::Log>);

    let log_path = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory '{}'", dir.display()))?;
            let path = dir.join(log_file_name());
            let file = fern::log_file(&path)
                .with_context(|| format!("Failed to create log file '{}'", path.display()))?;
            dispatch = dispatch.chain(
                fern::Dispatch::new()
                    .level(LevelFilter::Debug)
                    .format(|out, message, record| {
                        out.finish(format_args!(
                            "[{} {:<5} {}] {}",
                            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                            record.level(),
                            record.target(),
                            message
                        ));
                    })
                    .chain(file),
            );
            max_level = max_level.max(LevelFilter::Debug);
            Some(path)
        }
        None => None,
    };

    dispatch
        .level(max_level)
        .apply()
        .context("A global logger is already installed")?;
    Ok(log_path)
}
