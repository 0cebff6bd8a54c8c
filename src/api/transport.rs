//! Purpose: Transport seam consumed by managers and models.
//! Exports: `Transport`, `Request`, `Body`, `Method`, `not_found_as`.
//! Role: Pluggable boundary between the model layer and HTTP; tests substitute a scripted transport.
//! Invariants: Implementations return parsed JSON, or the raw text as a JSON string.
//! Invariants: Non-2xx responses surface as `ErrorKind::Request` carrying the status.
use crate::core::error::{ApiResult, Error, ErrorKind};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }

    pub fn parse(raw: &str) -> ApiResult<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("Invalid request method: {raw}."))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
}

/// One call against the API. `path` is either a resolved endpoint path or
/// an absolute URL taken from a pagination `next` link.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub params: Map<String, Value>,
    pub data: Option<Body>,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Map::new(),
            data: None,
            headers: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_json(mut self, data: Value) -> Self {
        self.data = Some(Body::Json(data));
        self
    }

    pub fn with_text(mut self, data: impl Into<String>) -> Self {
        self.data = Some(Body::Text(data.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Trait for pluggable transport backends.
pub trait Transport: Send + Sync {
    /// Perform one blocking call and return the decoded response body.
    fn request(&self, request: &Request) -> ApiResult<Value>;
}

/// Map a transport 404 onto the addressed model's "does not exist" signal.
pub fn not_found_as(model: &str, err: Error) -> Error {
    if err.kind() == ErrorKind::Request && err.status() == Some(404) {
        let mut translated = Error::new(ErrorKind::DoesNotExist)
            .with_model(model)
            .with_status(404)
            .with_message(format!("{model} matching query does not exist."));
        if let Some(path) = err.path() {
            translated = translated.with_path(path.to_string());
        }
        return translated;
    }
    err
}
