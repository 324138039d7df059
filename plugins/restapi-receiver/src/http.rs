//! Thin helper around the blocking reqwest API.
//!
//! The [`ApiClient`] stores the headers that must be sent with every request
//! (mostly authentication) and builds requests that carry them.

use anyhow::Context;
use reqwest::{
    Method, Url,
    blocking::{Body, Request},
    header::{self, HeaderMap, HeaderValue, InvalidHeaderValue},
};
use serde_json::{Map, Value};

pub const CONTENT_TYPE_JSON: &str = "application/json";

#[derive(Debug, Clone, Default)]
pub struct ApiClient {
    common_headers: HeaderMap,
}

pub fn user_agent_string() -> String {
    let plugin_crate_name = env!("CARGO_PKG_NAME");
    let plugin_version = env!("CARGO_PKG_VERSION");
    format!("Alumet {plugin_crate_name}/{plugin_version}")
}

impl ApiClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers added to every request built by this client.
    pub fn common_headers(&self) -> &HeaderMap {
        &self.common_headers
    }

    /// Authenticates the requests with HTTP basic authentication.
    pub fn set_basic_auth(&mut self, username: &str, password: &str) -> Result<(), InvalidHeaderValue> {
        use base64::prelude::BASE64_STANDARD;
        use base64::write::EncoderWriter;
        use std::io::Write;

        let mut buf = b"Basic ".to_vec();
        {
            let mut encoder = EncoderWriter::new(&mut buf, &BASE64_STANDARD);
            let _ = write!(encoder, "{username}:{password}");
        }
        let mut value = HeaderValue::from_bytes(&buf)?;
        value.set_sensitive(true);
        self.common_headers.insert(header::AUTHORIZATION, value);
        Ok(())
    }

    /// Authenticates the requests with a token, used as the value of the `Authorization` header.
    pub fn set_auth_token(&mut self, token: &str) -> Result<(), InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(token)?;
        value.set_sensitive(true);
        self.common_headers.insert(header::AUTHORIZATION, value);
        Ok(())
    }

    pub fn new_request(&self, method: Method, url: &str, body: Option<String>) -> anyhow::Result<Request> {
        let url = Url::parse(url).with_context(|| format!("invalid url '{url}'"))?;
        let mut request = Request::new(method, url);
        request.headers_mut().extend(self.common_headers.clone());
        *request.body_mut() = body.map(Body::from);
        Ok(request)
    }

    pub fn new_get_request(&self, url: &str) -> anyhow::Result<Request> {
        self.new_request(Method::GET, url, None)
    }

    pub fn new_json_request(&self, method: Method, url: &str, body: String) -> anyhow::Result<Request> {
        let mut request = self.new_request(method, url, Some(body))?;
        request
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
        Ok(request)
    }

    pub fn new_post_json_request(&self, url: &str, body: String) -> anyhow::Result<Request> {
        self.new_json_request(Method::POST, url, body)
    }

    pub fn new_put_json_request(&self, url: &str, body: String) -> anyhow::Result<Request> {
        self.new_json_request(Method::PUT, url, body)
    }

    /// Sends the request and decodes the JSON object returned by the server.
    ///
    /// An empty response body gives an empty object.
    pub fn execute_json(&self, request: Request) -> anyhow::Result<Map<String, Value>> {
        // The client owns a background runtime: it must not outlive the call,
        // because the source may be dropped from an async context.
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent_string())
            .build()
            .context("failed to initialize HTTP client")?;

        log::trace!("sending {request:?}");
        let response = client.execute(request).context("could not send request")?;
        log::trace!("got response {response:?}");

        let status = response.status();
        let body = response
            .text()
            .with_context(|| format!("failed to read response body for status {status:?}"))?;
        if status.is_client_error() || status.is_server_error() {
            let status_msg = format!("{} {}", status.as_str(), status.canonical_reason().unwrap_or_default());
            return Err(anyhow::anyhow!("server responded with error: {status_msg}\n{body}"));
        }
        if body.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&body).context("response is not a valid JSON object")
    }
}
