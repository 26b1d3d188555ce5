/// Builds the flat value mapping placeholders are resolved against:
/// CI build environment, then source config, then call-time params, with
/// file-data specs replaced by file contents.

use std::path::Path;
use serde_json::{Map, Value};
use crate::config::{under_base, BUILD_ENV_PREFIX, EXTERNAL_URL_ENV};
use crate::error::{ResourceError, Result};

/// Key marking a top-level value as a request to load file contents.
pub const FILEDATA_KEY: &str = "load_filedata";

/// A `{"load_filedata": "<file>", "trim": bool, "default": value}` entry.
#[derive(Debug, PartialEq)]
pub struct FileDataSpec<'a> {
    pub file: &'a str,
    pub trim: bool,
    pub default: Option<&'a Value>,
}

impl<'a> FileDataSpec<'a> {
    /// Returns `None` for values that are not file-data specs at all.
    pub fn parse(key: &str, value: &'a Value) -> Option<Result<Self>> {
        let spec = value.as_object()?;
        let file = spec.get(FILEDATA_KEY)?;
        let Some(file) = file.as_str() else {
            return Some(Err(ResourceError::InvalidFileData {
                key: key.to_string(),
                reason: "load_filedata must be a file name",
            }));
        };
        Some(Ok(Self {
            file,
            trim: spec.get("trim").is_some_and(is_truthy),
            default: spec.get("default"),
        }))
    }

    fn load(&self, base_path: &Path) -> Result<Value> {
        let path = under_base(base_path, self.file);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                log::debug!("filedata loaded from {}: {:?}", path.display(), content);
                let content = if self.trim { content.trim().to_string() } else { content };
                Ok(Value::String(content))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => match self.default {
                Some(default) => {
                    log::debug!("filedata {} missing, using default", path.display());
                    Ok(default.clone())
                }
                None => Err(ResourceError::MissingFile { path }),
            },
            Err(e) => Err(ResourceError::io("read", path, e)),
        }
    }
}

/// Python-ish truthiness for toggles given in payloads.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    }
}

/// Keep only `BUILD_*` variables and the external URL.
pub fn filter_environment<I>(vars: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut kept: Vec<(String, String)> = vars.into_iter()
        .filter(|(k, _)| k.starts_with(BUILD_ENV_PREFIX) || k == EXTERNAL_URL_ENV)
        .collect();
    kept.sort();
    kept.into_iter().map(|(k, v)| (k, Value::String(v))).collect()
}

/// Flat merge: `params` entries replace same-named `source` entries wholesale.
pub fn merge_params(source: &Map<String, Value>, params: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = source.clone();
    for (k, v) in params {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Build the substitution values for one invocation.
pub fn resolve<I>(
    environment: I,
    source: &Map<String, Value>,
    params: &Map<String, Value>,
    base_path: &Path,
) -> Result<Map<String, Value>>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut values = filter_environment(environment);
    log::debug!("environment values: {}", Value::Object(values.clone()));
    for (k, v) in merge_params(source, params) {
        values.insert(k, v);
    }

    let mut resolved = Map::with_capacity(values.len());
    for (key, value) in values {
        let loaded = match FileDataSpec::parse(&key, &value) {
            Some(spec) => Some(spec?.load(base_path)?),
            None => None,
        };
        resolved.insert(key, loaded.unwrap_or(value));
    }
    Ok(resolved)
}
