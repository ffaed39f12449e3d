//! Tracing subscriber setup
//!
//! Logs go to an append-only file by default so scheduled runs leave a trail;
//! `RUST_LOG` overrides the level chosen by `--verbose`.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `log_file: None` logs to stderr.
pub fn init(verbose: bool, json: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "tesla_recorder=debug,info"
        } else {
            "info"
        })
    });

    let (writer, ansi) = match log_file {
        Some(path) => (BoxMakeWriter::new(Mutex::new(open_log_file(path)?)), false),
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(verbose);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.with_ansi(ansi).try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))
}

fn open_log_file(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| anyhow::anyhow!("Cannot open log file {}: {}", path.display(), e))
}
