/// Logger setup. Console output goes to stderr: stdout carries the JSON result.
/// Outside debug runs the console gets `Info` and up while a `log*` temp file
/// keeps every record.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use log::{Level, LevelFilter};
use crate::config::Settings;

pub fn level(settings: &Settings) -> LevelFilter {
    if settings.debug { LevelFilter::Debug } else { LevelFilter::Info }
}

/// Install the global logger. `RUST_LOG` still overrides the level.
/// Returns the path of the full log file, when one was created.
pub fn init(settings: &Settings) -> Option<PathBuf> {
    let console_level = level(settings);
    let file = if settings.debug { None } else { create_log_file() };
    let path = file.as_ref().map(|(_, path)| path.clone());
    let filter = if file.is_some() { LevelFilter::Debug } else { console_level };

    let sink = LogSink { console: io::stderr(), console_level, file: file.map(|(f, _)| f) };
    let _ = env_logger::Builder::new()
        .filter_level(filter)
        .parse_default_env()
        .target(env_logger::Target::Pipe(Box::new(sink)))
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .try_init();
    path
}

fn create_log_file() -> Option<(File, PathBuf)> {
    let file = tempfile::Builder::new().prefix("log").tempfile().ok()?;
    file.keep().ok()
}

// ─── LogSink ───

/// Receives one formatted `[LEVEL] message` record per write.
pub struct LogSink<W> {
    pub console: W,
    pub console_level: LevelFilter,
    pub file: Option<File>,
}

impl<W: Write> Write for LogSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(file) = &mut self.file {
            file.write_all(buf)?;
        }
        if record_level(buf) <= self.console_level {
            self.console.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = &mut self.file {
            file.flush()?;
        }
        self.console.flush()
    }
}

/// Level from the record prefix; anything unrecognised counts as `Error`.
fn record_level(record: &[u8]) -> Level {
    record.strip_prefix(b"[")
        .and_then(|rest| rest.iter().position(|&b| b == b']').map(|end| &rest[..end]))
        .and_then(|name| std::str::from_utf8(name).ok())
        .and_then(|name| name.parse().ok())
        .unwrap_or(Level::Error)
}

/// Keep a copy of the raw payload for inspecting a failed debug run.
pub fn archive_payload(settings: &Settings, raw: &str) -> io::Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix(&format!("{}-", settings.command))
        .tempfile()?;
    file.write_all(raw.as_bytes())?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}
