mod command;
mod config;
mod error;
mod logging;
mod payload;
mod resolver;
mod template;
mod transport;

use std::env;
use std::io::Read;
use anyhow::{Context, Result};
use config::Settings;
use payload::Payload;
use transport::HttpTransport;

fn run() -> Result<String> {
    let args: Vec<String> = env::args().collect();

    let mut raw = String::new();
    std::io::stdin().read_to_string(&mut raw).context("cannot read payload from stdin")?;
    let payload = Payload::parse(&raw)?;

    let settings = Settings::from_invocation(&args, |name| env::var(name).ok(), &payload.source)?;
    if let Some(path) = logging::init(&settings) {
        log::debug!("full log in {}", path.display());
    }

    log::debug!("command: {}", settings.command);
    log::debug!("base path: {}", settings.base_path.display());
    log::debug!("input: {}", raw.trim_end());
    if settings.debug {
        match logging::archive_payload(&settings, &raw) {
            Ok(path) => log::debug!("payload archived to {}", path.display()),
            Err(e) => log::warn!("cannot archive payload: {}", e),
        }
    }

    let environment = env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
    let options = command::render_options(&payload, environment, &settings.base_path)?;
    let response = command::dispatch(&settings, &options, &mut HttpTransport::new())
        .with_context(|| format!("{} failed", settings.command))?;

    Ok(serde_json::to_string(&response)?)
}

fn main() {
    match run() {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}
