/// Stdin payload and the typed options read from rendered params.

use std::io;
use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use serde_json::{Map, Value};
use crate::error::{ResourceError, Result};
use crate::template::scalar_text;
use crate::transport::{HttpRequest, TlsVerification};

#[derive(Debug, Default, Deserialize)]
pub struct Payload {
    #[serde(default)]
    pub source: Map<String, Value>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Payload {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(ResourceError::InvalidPayload)
    }
}

fn default_method() -> String { "GET".into() }
fn default_check_method() -> String { "HEAD".into() }
fn default_ssl_verify() -> Value { Value::Bool(true) }
fn default_ok_responses() -> Vec<u16> { vec![200, 201, 202, 204] }
fn default_version_header() -> String { "Last-Modified".into() }
fn default_output() -> String { "data".into() }

/// Recognised options. Any other key in params is only a substitution value.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceOptions {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_check_method")]
    pub check_method: String,
    pub uri: String,
    #[serde(default)]
    pub headers: Map<String, Value>,
    #[serde(default)]
    pub json: Option<Value>,
    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: Value,
    #[serde(default = "default_ok_responses")]
    pub ok_responses: Vec<u16>,
    #[serde(default)]
    pub form_data: Option<Map<String, Value>>,
    #[serde(default = "default_version_header")]
    pub version_header: String,
    #[serde(default = "default_output")]
    pub output: String,
}

impl ResourceOptions {
    pub fn from_params(params: &Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(params.clone())).map_err(ResourceError::InvalidParams)
    }

    /// The request these options describe, sent with `method`.
    pub fn request(&self, method: &str) -> Result<HttpRequest> {
        let verify = match &self.ssl_verify {
            Value::Bool(true) => TlsVerification::System,
            Value::Bool(false) => TlsVerification::Disabled,
            Value::String(pem) => TlsVerification::CustomCa(pem.clone()),
            other => return Err(ResourceError::option("ssl_verify", format!("expected a boolean or a certificate, got {}", other))),
        };

        // Form values are JSON-encoded before url-encoding.
        let form_data = match self.form_data.as_ref().filter(|form| !form.is_empty()) {
            Some(form) => Some(form.iter()
                .map(|(k, v)| Ok((k.clone(), form_value(v)?)))
                .collect::<Result<Vec<_>>>()?),
            None => None,
        };

        Ok(HttpRequest {
            method: method.to_uppercase(),
            uri: self.uri.clone(),
            headers: self.headers.iter().map(|(k, v)| (k.clone(), scalar_text(v))).collect(),
            json: self.json.clone(),
            form_data,
            verify,
            ok_statuses: self.ok_responses.clone(),
        })
    }
}

// ─── Form encoding ───

/// `json.dumps` default layout: `, ` and `: ` separators, non-ASCII
/// escaped as `\uXXXX`.
struct DumpsFormatter;

impl Formatter for DumpsFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        for c in fragment.chars() {
            if c.is_ascii() {
                writer.write_all(&[c as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// JSON text of one `form_data` value.
pub fn form_value(value: &Value) -> Result<String> {
    let mut out = Vec::new();
    value.serialize(&mut serde_json::Serializer::with_formatter(&mut out, DumpsFormatter))
        .map_err(ResourceError::InvalidParams)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(v: Value) -> Result<ResourceOptions> {
        ResourceOptions::from_params(v.as_object().unwrap())
    }

    #[test]
    fn test_payload_sections_optional() {
        let p = Payload::parse("{}").unwrap();
        assert!(p.source.is_empty());
        assert!(p.params.is_empty());

        let p = Payload::parse(r#"{"source": {"uri": "http://x"}}"#).unwrap();
        assert_eq!(p.source["uri"], json!("http://x"));
    }

    #[test]
    fn test_payload_invalid_json() {
        assert!(matches!(Payload::parse("not json"), Err(ResourceError::InvalidPayload(_))));
    }

    #[test]
    fn test_defaults() {
        let o = options(json!({"uri": "http://x"})).unwrap();
        assert_eq!(o.method, "GET");
        assert_eq!(o.check_method, "HEAD");
        assert_eq!(o.ok_responses, vec![200, 201, 202, 204]);
        assert_eq!(o.version_header, "Last-Modified");
        assert_eq!(o.output, "data");
        assert_eq!(o.ssl_verify, json!(true));
        assert!(o.json.is_none());
        assert!(o.form_data.is_none());
    }

    #[test]
    fn test_uri_required() {
        let err = options(json!({"method": "GET"})).unwrap_err();
        assert!(matches!(err, ResourceError::InvalidParams(_)));
        assert!(err.to_string().contains("uri"));
    }

    #[test]
    fn test_extra_keys_ignored() {
        let o = options(json!({"uri": "http://x", "token": "abc"})).unwrap();
        assert_eq!(o.uri, "http://x");
    }

    #[test]
    fn test_request_shape() {
        let o = options(json!({
            "uri": "http://x",
            "headers": {"X-Count": 3, "Accept": "text/plain"},
            "form_data": {"name": "bob", "n": 1},
            "ssl_verify": false,
        })).unwrap();
        let req = o.request("post").unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.headers, vec![
            ("X-Count".to_string(), "3".to_string()),
            ("Accept".to_string(), "text/plain".to_string()),
        ]);
        assert_eq!(req.form_data, Some(vec![
            ("name".to_string(), "\"bob\"".to_string()),
            ("n".to_string(), "1".to_string()),
        ]));
        assert_eq!(req.verify, TlsVerification::Disabled);
    }

    #[test]
    fn test_form_value_encoding() {
        assert_eq!(form_value(&json!("bob")).unwrap(), r#""bob""#);
        assert_eq!(form_value(&json!(true)).unwrap(), "true");
        assert_eq!(form_value(&json!(null)).unwrap(), "null");
        assert_eq!(form_value(&json!({"a": 1, "b": [1, "x"]})).unwrap(), r#"{"a": 1, "b": [1, "x"]}"#);
        assert_eq!(form_value(&json!("caf\u{e9} \u{1f600}")).unwrap(), r#""caf\u00e9 \ud83d\ude00""#);
        assert_eq!(form_value(&json!("a\"b\n")).unwrap(), r#""a\"b\n""#);
    }

    #[test]
    fn test_empty_form_is_no_form() {
        let o = options(json!({"uri": "http://x", "form_data": {}})).unwrap();
        assert!(o.request("GET").unwrap().form_data.is_none());
    }

    #[test]
    fn test_ssl_verify_certificate() {
        let o = options(json!({"uri": "http://x", "ssl_verify": "-----BEGIN CERTIFICATE-----"})).unwrap();
        assert!(matches!(o.request("GET").unwrap().verify, TlsVerification::CustomCa(_)));
    }

    #[test]
    fn test_ssl_verify_bad_type() {
        let o = options(json!({"uri": "http://x", "ssl_verify": 1})).unwrap();
        assert!(matches!(o.request("GET"), Err(ResourceError::InvalidOption { option: "ssl_verify", .. })));
    }
}
