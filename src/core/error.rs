//! Purpose: Crate-wide error taxonomy for the model layer and its transport.
//! Exports: `Error`, `ErrorKind`, `ApiResult`, `to_exit_code`.
//! Role: One error type flows through fields, options, registry, managers and the CLI.
//! Invariants: Configuration mistakes are `Usage`; they are raised immediately and never retried.
//! Invariants: Only a 404 on a single-object call becomes `DoesNotExist`; other statuses stay `Request`.
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Field,
    Request,
    DoesNotExist,
    Lookup,
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Internal => "Internal",
            ErrorKind::Usage => "Usage",
            ErrorKind::Field => "Field",
            ErrorKind::Request => "Request",
            ErrorKind::DoesNotExist => "DoesNotExist",
            ErrorKind::Lookup => "Lookup",
            ErrorKind::Io => "Io",
        }
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    field: Option<String>,
    status: Option<u16>,
    body: Option<Value>,
    model: Option<String>,
    path: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            field: None,
            status: None,
            body: None,
            model: None,
            path: None,
            source: None,
        }
    }

    /// Validation failure scoped to a single field.
    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Field)
            .with_field(name)
            .with_message(message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn field_name(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::DoesNotExist
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(field) = &self.field {
            write!(f, " [{field}]")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(model) = &self.model {
            write!(f, " (model: {model})")?;
        }
        if let Some(status) = self.status {
            write!(f, " (status: {status})")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {path})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::DoesNotExist => 3,
        ErrorKind::Field => 4,
        ErrorKind::Request => 5,
        ErrorKind::Lookup => 6,
        ErrorKind::Io => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, to_exit_code};
    use serde_json::json;

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Usage, 2),
            (ErrorKind::DoesNotExist, 3),
            (ErrorKind::Field, 4),
            (ErrorKind::Request, 5),
            (ErrorKind::Lookup, 6),
            (ErrorKind::Io, 8),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn display_includes_field_and_status() {
        let err = Error::field("email", "Enter a valid email address.");
        assert_eq!(
            err.to_string(),
            "Field [email]: Enter a valid email address."
        );

        let err = Error::new(ErrorKind::Request)
            .with_status(400)
            .with_body(json!({"name": ["taken"]}));
        assert_eq!(err.to_string(), "Request (status: 400)");
        assert_eq!(err.body(), Some(&json!({"name": ["taken"]})));
    }
}
