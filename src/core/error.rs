//! Purpose: Error model shared by the builder, registry, validation gate, and dispatch boundary.
//! Exports: `Error`, `ErrorKind`, `to_status_code`.
//! Role: Single error type; kinds separate wiring bugs from bad input.
//! Invariants: `Config` errors indicate a system wiring bug and are never caught internally.
//! Invariants: User-facing kinds carry enough context (path, value) to pinpoint the offending field.
use crate::core::validate::ViolationReport;
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Config,
    Malformed,
    Validation,
    NotFound,
    Internal,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    property_path: Option<String>,
    value: Option<Value>,
    report: Option<ViolationReport>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            property_path: None,
            value: None,
            report: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_property_path(mut self, path: impl Into<String>) -> Self {
        self.property_path = Some(path.into());
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_report(mut self, report: ViolationReport) -> Self {
        self.report = Some(report);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn property_path(&self) -> Option<&str> {
        self.property_path.as_deref()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn report(&self) -> Option<&ViolationReport> {
        self.report.as_ref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.property_path {
            write!(f, " (at: {path})")?;
        }
        if let Some(value) = &self.value {
            write!(f, " (value: {value})")?;
        }
        if let Some(report) = &self.report {
            write!(f, " ({} violation(s))", report.len())?;
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

/// HTTP-flavored classification for hosts that surface errors over a request
/// pipeline. Not a transport commitment, just a stable hint.
pub fn to_status_code(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::Config => 500,
        ErrorKind::Malformed => 400,
        ErrorKind::Validation => 422,
        ErrorKind::NotFound => 404,
        ErrorKind::Internal => 500,
    }
}
