//! Blocking HTTP helper shared by all providers.
//!
//! Statuses come back as data so callers can implement their own auth
//! handling; only transport problems are errors. Redirects are never
//! followed because auth endpoints use them to bounce to login pages.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    /// Empty means GET.
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub timeout: Option<Duration>,
    /// Skip certificate verification. Only for local companion servers that
    /// present self-signed certificates on 127.0.0.1.
    pub insecure_tls: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Lowercased names, first value wins.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub fn send(req: &HttpRequest) -> Result<HttpResponse> {
    let timeout = req.timeout.unwrap_or(DEFAULT_TIMEOUT);

    let mut config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .max_redirects(0);
    if req.insecure_tls {
        config = config.tls_config(
            ureq::tls::TlsConfig::builder()
                .disable_verification(true)
                .build(),
        );
    }
    let agent: ureq::Agent = config.build().into();

    let method = req.method.trim();
    let method = if method.is_empty() { "GET" } else { method };

    let result = match method.to_ascii_uppercase().as_str() {
        "POST" => apply_headers(agent.post(&req.url), &req.headers).send(req.body.as_str()),
        "PUT" => apply_headers(agent.put(&req.url), &req.headers).send(req.body.as_str()),
        "DELETE" => apply_headers(agent.delete(&req.url), &req.headers).call(),
        "HEAD" => apply_headers(agent.head(&req.url), &req.headers).call(),
        _ => apply_headers(agent.get(&req.url), &req.headers).call(),
    };
    let mut response = result.context("request failed")?;

    let status = response.status().as_u16();
    let mut headers = HashMap::new();
    for (name, value) in response.headers() {
        if let Ok(text) = value.to_str() {
            headers
                .entry(name.as_str().to_ascii_lowercase())
                .or_insert_with(|| text.to_string());
        }
    }

    let body = response
        .body_mut()
        .read_to_string()
        .context("read body")?;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn apply_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}
