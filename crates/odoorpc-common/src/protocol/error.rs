//! Error taxonomy
//!
//! Every terminal failure surfaces as an [`RpcError`]: a single error type
//! tagged with an [`ErrorKind`] and carrying the backend fault code/string
//! when one was observed. Classification is pure; nothing here performs I/O.
//!
//! | Signal                                   | Kind             |
//! |------------------------------------------|------------------|
//! | fault code 1                             | `Connection`     |
//! | fault code 2                             | `Authentication` |
//! | fault code 3                             | `Validation`     |
//! | any other fault code                     | `Generic`        |
//! | transport error chain with a network marker or transient I/O error | `Connection` |
//! | malformed response document              | `Parse`          |

use std::time::Duration;
use thiserror::Error;

/// Fault code the backend uses for transient connection/authentication races.
pub const FAULT_CONNECTION: i64 = 1;
/// Fault code for rejected credentials or sessions.
pub const FAULT_AUTHENTICATION: i64 = 2;
/// Fault code for rejected payloads.
pub const FAULT_VALIDATION: i64 = 3;

/// Case-insensitive markers that identify a raw transport failure as a
/// connection problem.
const CONNECTION_MARKERS: &[&str] = &["timeout", "connection", "network", "econnreset", "enotfound"];

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network failure, timeout or transient backend condition
    Connection,
    /// Bad credentials or session
    Authentication,
    /// Backend rejected the payload
    Validation,
    /// Response was not a well-formed XML-RPC document
    Parse,
    /// Anything else
    Generic,
}

impl ErrorKind {
    /// Maps a numeric fault code onto its category.
    pub fn from_fault_code(code: i64) -> Self {
        match code {
            FAULT_CONNECTION => ErrorKind::Connection,
            FAULT_AUTHENTICATION => ErrorKind::Authentication,
            FAULT_VALIDATION => ErrorKind::Validation,
            _ => ErrorKind::Generic,
        }
    }

    /// Classifies a raw transport error by its message.
    pub fn from_transport_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if CONNECTION_MARKERS.iter().any(|marker| lower.contains(marker)) {
            ErrorKind::Connection
        } else {
            ErrorKind::Generic
        }
    }
}

/// Classified RPC failure
#[derive(Error, Debug)]
#[error("{message}")]
pub struct RpcError {
    kind: ErrorKind,
    message: String,
    fault_code: Option<i64>,
    fault_string: Option<String>,
    validation_errors: Vec<String>,
    #[source]
    source: Option<BoxError>,
}

impl RpcError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fault_code: None,
            fault_string: None,
            validation_errors: Vec::new(),
            source: None,
        }
    }

    /// Builds the error for a `<fault>` response.
    pub fn from_fault(code: i64, fault_string: impl Into<String>) -> Self {
        let fault_string = fault_string.into();
        let kind = ErrorKind::from_fault_code(code);
        let message = match kind {
            ErrorKind::Connection => format!("Connection error: {fault_string}"),
            ErrorKind::Authentication => format!("Authentication error: {fault_string}"),
            ErrorKind::Validation => format!("Validation error: {fault_string}"),
            _ => format!("Odoo error ({code}): {fault_string}"),
        };

        let mut error = Self::new(kind, message);
        if kind == ErrorKind::Validation {
            error.validation_errors = fault_string
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
        }
        error.fault_code = Some(code);
        error.fault_string = Some(fault_string);
        error
    }

    /// Builds the error for a failed exchange that carried no fault code.
    ///
    /// The whole source chain is inspected: a transient I/O error anywhere
    /// in it, or a network marker in any of its messages, makes the error
    /// connection-kind. Everything else (TLS rejections, protocol errors)
    /// is generic.
    pub fn from_transport<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        let message = message.into();
        let source = source.into();

        let mut text = message.clone();
        for err in error_chain(&*source) {
            text.push_str(": ");
            text.push_str(&err.to_string());
        }

        let kind = if has_transient_io(&*source) {
            ErrorKind::Connection
        } else {
            ErrorKind::from_transport_message(&text)
        };
        Self::new(kind, message).with_source(source)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn validation(message: impl Into<String>, errors: Vec<String>) -> Self {
        let mut error = Self::new(ErrorKind::Validation, message);
        error.validation_errors = errors;
        error
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic, message)
    }

    /// The whole exchange exceeded its deadline.
    pub fn timeout(after: Duration) -> Self {
        Self::connection(format!("Request timeout after {}ms", after.as_millis()))
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fault_code(&self) -> Option<i64> {
        self.fault_code
    }

    pub fn fault_string(&self) -> Option<&str> {
        self.fault_string.as_deref()
    }

    pub fn validation_errors(&self) -> &[String] {
        &self.validation_errors
    }

    /// Default retry predicate.
    ///
    /// Retryable when the error is connection-kind, carries fault code 1, or
    /// its source chain holds an I/O error with a transient signature
    /// (connection refused or reset, host not found, timed out).
    pub fn is_retryable(&self) -> bool {
        if self.kind == ErrorKind::Parse {
            return false;
        }
        self.kind == ErrorKind::Connection
            || self.fault_code == Some(FAULT_CONNECTION)
            || self
                .source
                .as_deref()
                .is_some_and(|source| has_transient_io(source))
    }
}

/// `err` followed by each of its sources
fn error_chain<'a>(
    err: &'a (dyn std::error::Error + 'static),
) -> impl Iterator<Item = &'a (dyn std::error::Error + 'static)> {
    std::iter::successors(Some(err), |e| e.source())
}

fn has_transient_io(err: &(dyn std::error::Error + 'static)) -> bool {
    error_chain(err).any(|e| {
        e.downcast_ref::<std::io::Error>()
            .is_some_and(is_transient_io)
    })
}

fn is_transient_io(err: &std::io::Error) -> bool {
    use std::io::ErrorKind as Io;

    match err.kind() {
        Io::ConnectionRefused | Io::ConnectionReset | Io::ConnectionAborted | Io::TimedOut => true,
        // Resolver failures carry no dedicated kind
        _ => {
            let message = err.to_string().to_lowercase();
            message.contains("failed to lookup address") || message.contains("name or service not known")
        }
    }
}

impl From<std::io::Error> for RpcError {
    fn from(err: std::io::Error) -> Self {
        RpcError::from_transport("IO error", err)
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
