/// check / in / out: one resolved set of options, one HTTP exchange (two for out),
/// and the JSON the CI system expects back.

use std::path::Path;
use std::str::FromStr;
use serde_json::{json, Map, Value};
use crate::config::{under_base, Settings};
use crate::error::{ResourceError, Result};
use crate::payload::{Payload, ResourceOptions};
use crate::resolver::{merge_params, resolve};
use crate::template::interpolate_map;
use crate::transport::{execute, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Check,
    In,
    Out,
}

impl FromStr for Command {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "check" => Ok(Command::Check),
            "in" => Ok(Command::In),
            "out" => Ok(Command::Out),
            other => Err(ResourceError::UnknownCommand(other.to_string())),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Check => "check",
            Command::In => "in",
            Command::Out => "out",
        };
        write!(f, "{}", name)
    }
}

/// Merge, resolve and interpolate the payload into typed options.
pub fn render_options<I>(payload: &Payload, environment: I, base_path: &Path) -> Result<ResourceOptions>
where
    I: IntoIterator<Item = (String, String)>,
{
    let params = merge_params(&payload.source, &payload.params);
    let values = resolve(environment, &payload.source, &payload.params, base_path)?;
    log::debug!("processed values: {}", Value::Object(values.clone()));

    let rendered = interpolate_map(&params, &values)?;
    log::debug!("rendered params: {}", Value::Object(rendered.clone()));

    ResourceOptions::from_params(&rendered)
}

pub fn dispatch(settings: &Settings, options: &ResourceOptions, transport: &mut dyn Transport) -> Result<Value> {
    match settings.command {
        Command::Check => check(options, transport),
        Command::In => fetch(options, &settings.base_path, transport),
        Command::Out => push(options, settings.test_mode, transport),
    }
}

fn current_version(options: &ResourceOptions, transport: &mut dyn Transport) -> Result<String> {
    let request = options.request(&options.check_method)?;
    let response = execute(transport, &request)?;
    response.version(&options.version_header)
}

fn check(options: &ResourceOptions, transport: &mut dyn Transport) -> Result<Value> {
    let version = current_version(options, transport)?;
    Ok(json!([{ "ref": version }]))
}

fn fetch(options: &ResourceOptions, base_path: &Path, transport: &mut dyn Transport) -> Result<Value> {
    let request = options.request(&options.method)?;
    let response = execute(transport, &request)?;
    let version = response.version(&options.version_header)?;

    let target = under_base(base_path, &options.output);
    std::fs::write(&target, &response.body)
        .map_err(|e| ResourceError::io("write", &target, e))?;
    log::info!("wrote {} bytes to {}", response.body.len(), target.display());

    Ok(json!({ "version": { "ref": version }, "metadata": [] }))
}

fn push(options: &ResourceOptions, test_mode: bool, transport: &mut dyn Transport) -> Result<Value> {
    let request = options.request(&options.method)?;
    let response = execute(transport, &request)?;

    // The version always comes from a fresh check so out and check agree.
    let version = current_version(options, transport)?;
    let mut result = Map::new();
    result.insert("version".into(), json!({ "ref": version }));

    if test_mode {
        match serde_json::from_slice::<Value>(&response.body) {
            Ok(Value::Object(echo)) => result.extend(echo),
            _ => return Err(ResourceError::InvalidResponseBody(response.text())),
        }
    }
    Ok(Value::Object(result))
}
