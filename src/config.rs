//! Invocation settings, built once in `main` and passed down by reference.

use std::path::{Component, Path, PathBuf};
use serde_json::{Map, Value};
use crate::command::Command;
use crate::error::Result;
use crate::resolver::is_truthy;

/// Environment variables with this prefix become substitution values.
pub const BUILD_ENV_PREFIX: &str = "BUILD_";
/// Public URL of the CI server, also a substitution value.
pub const EXTERNAL_URL_ENV: &str = "ATC_EXTERNAL_URL";
/// Non-empty value turns on debug logging.
pub const DEBUG_ENV: &str = "RESOURCE_DEBUG";
/// Non-empty value makes `out` echo the mutating response body.
pub const TEST_MODE_ENV: &str = "TEST";

pub const DEFAULT_BASE_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub command: Command,
    /// Directory for file-data reads and `in` output.
    pub base_path: PathBuf,
    pub debug: bool,
    pub test_mode: bool,
}

impl Settings {
    /// `args` is the full argument vector including the program name.
    /// `env` looks up a process environment variable.
    pub fn from_invocation<F>(args: &[String], env: F, source: &Map<String, Value>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (command, rest) = split_command(args)?;
        let base_path = rest.first()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_PATH));
        let flag = |name: &str| env(name).is_some_and(|v| !v.is_empty());

        Ok(Self {
            command,
            base_path,
            debug: flag(DEBUG_ENV) || source.get("debug").is_some_and(is_truthy),
            test_mode: flag(TEST_MODE_ENV),
        })
    }
}

/// The command is the program's own name when installed as `check`/`in`/`out`;
/// otherwise it is the first argument.
fn split_command(args: &[String]) -> Result<(Command, &[String])> {
    let program = args.first()
        .and_then(|p| Path::new(p).file_name())
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    if let Ok(command) = program.parse::<Command>() {
        return Ok((command, args.get(1..).unwrap_or_default()));
    }

    let name = args.get(1).map(String::as_str).unwrap_or(program);
    let command = name.parse::<Command>()?;
    Ok((command, args.get(2..).unwrap_or_default()))
}

/// `base/name`, with any root or drive prefix of `name` dropped so an
/// absolute name still lands under `base`.
pub fn under_base(base: &Path, name: &str) -> PathBuf {
    let relative: PathBuf = Path::new(name)
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    base.join(relative)
}
