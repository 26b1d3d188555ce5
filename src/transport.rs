/// Transport trait — the single HTTP exchange a command needs.
/// HttpTransport talks to the network. Tests swap in a canned stub.

use std::io::Write;
use reqwest::header::HeaderMap;
use serde_json::Value;
use crate::error::{ResourceError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum TlsVerification {
    /// Verify against the platform's trusted roots.
    System,
    Disabled,
    /// Verify against this PEM material only.
    CustomCa(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub json: Option<Value>,
    /// Already JSON-encoded values; replaces `json` as the body when set.
    pub form_data: Option<Vec<(String, String)>>,
    pub verify: TlsVerification,
    pub ok_statuses: Vec<u16>,
}

#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Value of the header carrying the version ref.
    pub fn version(&self, header: &str) -> Result<String> {
        self.headers.get(header)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .ok_or_else(|| ResourceError::MissingVersionHeader(header.to_string()))
    }
}

pub trait Transport {
    /// Send one request. Status codes are not checked here.
    fn send(&mut self, request: &HttpRequest) -> Result<TransportResponse>;
}

/// Send `request` once and reject statuses outside its allow-list.
pub fn execute(transport: &mut dyn Transport, request: &HttpRequest) -> Result<TransportResponse> {
    log::debug!("http request: {} {}", request.method, request.uri);
    let response = transport.send(request)?;

    log::info!("http response code: {}", response.status);
    log::debug!("http response text: {}", response.text());

    if !request.ok_statuses.contains(&response.status) {
        return Err(ResourceError::UnexpectedStatus(response.status));
    }
    Ok(response)
}

// ─── HttpTransport ───

#[derive(Default)]
pub struct HttpTransport;

impl HttpTransport {
    pub fn new() -> Self {
        Self
    }

    fn client(verify: &TlsVerification) -> Result<reqwest::blocking::Client> {
        let builder = reqwest::blocking::Client::builder();
        let builder = match verify {
            TlsVerification::System => builder,
            TlsVerification::Disabled => builder.danger_accept_invalid_certs(true),
            TlsVerification::CustomCa(pem) => {
                let bundle = write_ca_bundle(pem)?;
                let bytes = std::fs::read(bundle.path())
                    .map_err(|e| ResourceError::io("read", bundle.path(), e))?;
                root_certificates(&bytes)?
                    .into_iter()
                    .fold(builder.tls_built_in_root_certs(false), |b, cert| b.add_root_certificate(cert))
            }
        };
        Ok(builder.build()?)
    }
}

impl Transport for HttpTransport {
    fn send(&mut self, request: &HttpRequest) -> Result<TransportResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| ResourceError::option("method", format!("'{}' is not an HTTP method", request.method)))?;

        let client = Self::client(&request.verify)?;
        let mut builder = client.request(method, &request.uri);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(form) = &request.form_data {
            builder = builder.form(form);
        } else if let Some(json) = &request.json {
            builder = builder.json(json);
        }

        let resp = builder.send()?;
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp.bytes()?.to_vec();
        Ok(TransportResponse { status, headers, body })
    }
}

/// Inline certificate material goes through a fresh `ssl-*` file.
fn write_ca_bundle(pem: &str) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("ssl-")
        .tempfile()
        .map_err(|e| ResourceError::io("create", std::env::temp_dir(), e))?;
    file.write_all(pem.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| ResourceError::io("write", file.path(), e))?;
    log::debug!("certificate written to {}", file.path().display());
    Ok(file)
}

/// Every certificate in a PEM bundle; a bundle with none is an error.
fn root_certificates(pem: &[u8]) -> Result<Vec<reqwest::Certificate>> {
    let certs = reqwest::Certificate::from_pem_bundle(pem)?;
    if certs.is_empty() {
        return Err(ResourceError::option("ssl_verify", "no certificate found in bundle".to_string()));
    }
    log::debug!("trusting {} certificate(s) from bundle", certs.len());
    Ok(certs)
}

// ─── StubTransport ───

/// Replays canned responses in order and records every request.
#[cfg(test)]
#[derive(Default)]
pub struct StubTransport {
    pub responses: std::collections::VecDeque<TransportResponse>,
    pub requests: Vec<HttpRequest>,
}

#[cfg(test)]
impl StubTransport {
    pub fn new(responses: Vec<TransportResponse>) -> Self {
        Self { responses: responses.into(), requests: Vec::new() }
    }
}

#[cfg(test)]
impl Transport for StubTransport {
    fn send(&mut self, request: &HttpRequest) -> Result<TransportResponse> {
        self.requests.push(request.clone());
        Ok(self.responses.pop_front()
            .unwrap_or_else(|| panic!("StubTransport: no response left for {} {}", request.method, request.uri)))
    }
}

#[cfg(test)]
pub fn stub_response(status: u16, headers: &[(&str, &str)], body: &[u8]) -> TransportResponse {
    use reqwest::header::{HeaderName, HeaderValue};
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.insert(HeaderName::from_bytes(name.as_bytes()).unwrap(), HeaderValue::from_str(value).unwrap());
    }
    TransportResponse { status, headers: map, body: body.to_vec() }
}
