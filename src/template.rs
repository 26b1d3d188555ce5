/// Placeholder interpolation over JSON-shaped params.
/// `{key}` is replaced by the value of `key`; `{{` and `}}` are literal braces.

use serde_json::{Map, Value};
use crate::error::{ResourceError, Result};

/// Recursively interpolate strings, list elements, and both keys and values of
/// mappings. Numbers, booleans and null pass through.
///
/// When two keys of one mapping render to the same string the later entry's
/// value wins; the entry keeps the position of the first.
pub fn interpolate(node: &Value, values: &Map<String, Value>) -> Result<Value> {
    match node {
        Value::String(s) => Ok(Value::String(substitute(s, values)?)),
        Value::Array(items) => items.iter()
            .map(|item| interpolate(item, values))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(entries) => interpolate_map(entries, values).map(Value::Object),
        other => Ok(other.clone()),
    }
}

pub fn interpolate_map(entries: &Map<String, Value>, values: &Map<String, Value>) -> Result<Map<String, Value>> {
    let mut rendered = Map::with_capacity(entries.len());
    for (key, value) in entries {
        let key = substitute(key, values)?;
        let value = interpolate(value, values)?;
        if rendered.insert(key.clone(), value).is_some() {
            log::debug!("interpolated key '{}' collides, keeping the later value", key);
        }
    }
    Ok(rendered)
}

/// Replace every `{key}` in `template` with the string form of `values[key]`.
pub fn substitute(template: &str, values: &Map<String, Value>) -> Result<String> {
    let malformed = |reason| ResourceError::MalformedTemplate {
        template: template.to_string(),
        reason,
    };

    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(malformed("single '}' outside a placeholder")),
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') => return Err(malformed("'{' inside a placeholder")),
                        Some(k) => key.push(k),
                        None => return Err(malformed("unterminated placeholder")),
                    }
                }
                if key.is_empty() {
                    return Err(malformed("empty placeholder"));
                }
                let value = values.get(&key)
                    .ok_or(ResourceError::MissingSubstitutionKey(key))?;
                out.push_str(&scalar_text(value));
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Text used when a value is spliced into a string: strings verbatim,
/// everything else as compact JSON: `true`, `null` and `["a",1]`, never
/// `True`, `None` or `['a', 1]`.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("values must be an object"),
        }
    }

    #[test]
    fn test_substitute_two_keys() {
        let vals = values(json!({"a": "X", "b": "Y"}));
        assert_eq!(substitute("{a}-{b}", &vals).unwrap(), "X-Y");
    }

    #[test]
    fn test_nested_structure() {
        let vals = values(json!({"a": "X", "b": "Y"}));
        let node = json!({"list": ["{a}", {"{b}": "{a}"}]});
        assert_eq!(interpolate(&node, &vals).unwrap(), json!({"list": ["X", {"Y": "X"}]}));
    }

    #[test]
    fn test_missing_key() {
        let vals = values(json!({"a": "X"}));
        match substitute("{c}", &vals) {
            Err(ResourceError::MissingSubstitutionKey(k)) => assert_eq!(k, "c"),
            other => panic!("expected MissingSubstitutionKey, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_key_deep_inside_list() {
        let vals = values(json!({}));
        let err = interpolate(&json!({"a": [1, ["{nope}"]]}), &vals).unwrap_err();
        assert!(matches!(err, ResourceError::MissingSubstitutionKey(k) if k == "nope"));
    }

    #[test]
    fn test_non_strings_pass_through() {
        let vals = values(json!({}));
        let node = json!({"n": 3, "f": 1.5, "b": false, "z": null});
        assert_eq!(interpolate(&node, &vals).unwrap(), node);
    }

    #[test]
    fn test_non_string_values_render_as_json() {
        let vals = values(json!({"n": 7, "t": true, "z": null, "l": ["a", 1]}));
        assert_eq!(substitute("{n}/{t}/{z}/{l}", &vals).unwrap(), r#"7/true/null/["a",1]"#);
    }

    #[test]
    fn test_escaped_braces() {
        let vals = values(json!({"id": "42"}));
        assert_eq!(substitute(r#"{{"id": {id}}}"#, &vals).unwrap(), r#"{"id": 42}"#);
    }

    #[test]
    fn test_malformed_templates() {
        let vals = values(json!({"a": "X"}));
        for bad in ["{a", "a}", "{}", "{a{b}}"] {
            assert!(
                matches!(substitute(bad, &vals), Err(ResourceError::MalformedTemplate { .. })),
                "expected {:?} to be rejected", bad
            );
        }
    }

    #[test]
    fn test_colliding_keys_last_wins() {
        let vals = values(json!({"a": "same", "b": "same"}));
        let node = json!({"{a}": 1, "other": 2, "{b}": 3});
        let out = interpolate(&node, &vals).unwrap();
        let obj = out.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["same"], json!(3));
        assert_eq!(obj.keys().collect::<Vec<_>>(), vec!["same", "other"]);
    }

    #[test]
    fn test_values_are_not_reinterpolated() {
        let vals = values(json!({"a": "{b}", "b": "never"}));
        assert_eq!(substitute("{a}", &vals).unwrap(), "{b}");
    }
}
