//! Purpose: Blocking HTTP transport for the backend API over `ureq`.
//! Exports: `Connection`.
//! Role: Concrete `Transport`; builds URLs against the API root, authenticates once, decodes bodies.
//! Invariants: Relative paths always end with a slash and are joined onto the API root.
//! Invariants: 5xx -> "Server error."; any other non-2xx carries the decoded body; no retries.
//! Invariants: Authentication is a single token exchange performed lazily on first request.
#![allow(clippy::result_large_err)]

use super::config::ClientConfig;
use super::transport::{Body, Method, Request, Transport};
use crate::core::error::{ApiResult, Error, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tracing::debug;
use url::Url;

const AUTH_SUFFIX: &str = "v1/account/auth/";
const CONTENT_TYPE: &str = "application/json";

#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    api_root: Url,
    api_key: RwLock<Option<String>>,
    email: Option<String>,
    password: Option<String>,
    agent: ureq::Agent,
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthEnvelope {
    account_key: String,
}

impl Connection {
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let api_root = normalize_api_root(&config.api_root)?;
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self {
            inner: Arc::new(ConnectionInner {
                api_root,
                api_key: RwLock::new(config.api_key.clone()),
                email: config.email.clone(),
                password: config.password.clone(),
                agent,
            }),
        })
    }

    pub fn api_root(&self) -> &Url {
        &self.inner.api_root
    }

    pub fn api_key(&self) -> Option<String> {
        self.inner
            .api_key
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.api_key().is_some()
    }

    /// Exchange email/password for an account key unless one is already held.
    pub fn authenticate(&self) -> ApiResult<String> {
        if let Some(key) = self.api_key() {
            debug!("connection already authenticated");
            return Ok(key);
        }
        let email = self.inner.email.as_deref().ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message("\"email\" is required.")
        })?;
        let password = self.inner.password.as_deref().ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message("\"password\" is required.")
        })?;

        debug!(email, "authenticating");
        let payload = serde_json::to_value(AuthRequest { email, password }).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode auth request")
                .with_source(err)
        })?;
        let request = Request::new(Method::Post, AUTH_SUFFIX).with_json(payload);
        let response = self.make_request(&request, None)?;
        let envelope: AuthEnvelope = serde_json::from_value(response).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("auth response is missing account_key")
                .with_source(err)
        })?;

        *self
            .inner
            .api_key
            .write()
            .unwrap_or_else(|poison| poison.into_inner()) = Some(envelope.account_key.clone());
        debug!("authentication successful");
        Ok(envelope.account_key)
    }

    pub fn build_url(&self, path: &str) -> ApiResult<Url> {
        build_url(&self.inner.api_root, path)
    }

    fn make_request(&self, request: &Request, api_key: Option<&str>) -> ApiResult<Value> {
        let url = self.build_url(&request.path)?;
        debug!(method = %request.method, url = %url, "request");

        let mut call = self
            .inner
            .agent
            .request(request.method.as_str(), url.as_str());
        for (name, value) in &request.params {
            call = call.query(name, &param_to_string(value));
        }
        let has_content_type = request
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
        if !has_content_type {
            call = call.set("content-type", CONTENT_TYPE);
        }
        let has_auth = request
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("authorization"));
        if let (Some(key), false) = (api_key, has_auth) {
            call = call.set("Authorization", &format!("ApiKey {key}"));
        }
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }

        let response = match &request.data {
            Some(Body::Json(data)) => {
                let payload = serde_json::to_string(data).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode request json")
                        .with_source(err)
                })?;
                call.send_string(&payload)
            }
            Some(Body::Text(text)) => call.send_string(text),
            None => call.call(),
        };

        match response {
            Ok(resp) => read_body(resp),
            Err(ureq::Error::Status(code, resp)) => {
                let body = read_body(resp).unwrap_or(Value::Null);
                debug!(status = code, url = %url, "request error");
                Err(error_from_status(code, body).with_path(request.path.clone()))
            }
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message("request failed")
                .with_path(request.path.clone())
                .with_source(err)),
        }
    }
}

impl Transport for Connection {
    fn request(&self, request: &Request) -> ApiResult<Value> {
        let key = match self.api_key() {
            Some(key) => key,
            None => self.authenticate()?,
        };
        self.make_request(request, Some(&key))
    }
}

fn normalize_api_root(raw: &str) -> ApiResult<Url> {
    let mut url = Url::parse(raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid api root url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(
            Error::new(ErrorKind::Usage).with_message("api root must use http or https scheme")
        );
    }
    if url.cannot_be_a_base() {
        return Err(Error::new(ErrorKind::Usage).with_message("api root cannot be a base url"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(api_root: &Url, path: &str) -> ApiResult<Url> {
    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };

    let mut url = if path.starts_with("http://") || path.starts_with("https://") {
        Url::parse(path).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid request url")
                .with_path(path)
                .with_source(err)
        })?
    } else {
        let mut relative = path.trim_start_matches('/').to_string();
        if !relative.ends_with('/') {
            relative.push('/');
        }
        api_root.join(&relative).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid request path")
                .with_path(path)
                .with_source(err)
        })?
    };
    url.set_query(query);
    Ok(url)
}

fn param_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn read_body(response: ureq::Response) -> ApiResult<Value> {
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    Ok(decode_body(body))
}

fn decode_body(body: String) -> Value {
    match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(_) => Value::String(body),
    }
}

fn error_from_status(status: u16, body: Value) -> Error {
    let err = Error::new(ErrorKind::Request).with_status(status);
    match status {
        500..=599 => err.with_message("Server error."),
        400..=499 => {
            let message = client_error_message(&body);
            err.with_message(message).with_body(body)
        }
        _ => err
            .with_message(format!("unexpected status {status}"))
            .with_body(body),
    }
}

fn client_error_message(body: &Value) -> String {
    match body {
        Value::Object(map) => match map.get("detail").and_then(Value::as_str) {
            Some(detail) => detail.to_string(),
            None => body.to_string(),
        },
        Value::String(text) if !text.is_empty() => text.clone(),
        _ => "client error".to_string(),
    }
}
