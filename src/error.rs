//! Error types for the chat relay.
//!
//! A single error type covers both halves of the system: the relay server
//! (validation, authorization, upstream failures) and the client side that
//! consumes the relayed stream.

use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::sync::Arc;

/// The message shown to users whenever a request fails.
///
/// Upstream error details are logged server side and never surfaced.
pub const GENERIC_FAILURE: &str = "Sorry, something went wrong. Please try again.";

/// The main error type for messagegpt.
#[derive(Clone, Debug)]
pub enum Error {
    /// The request body was missing or carried no usable input.
    InvalidRequest {
        /// Human-readable error message.
        message: String,
    },

    /// The bearer token was missing or did not match.
    Unauthorized {
        /// Human-readable error message.
        message: String,
    },

    /// The caller exceeded the configured request rate.
    RateLimited {
        /// Human-readable error message.
        message: String,
    },

    /// The upstream completion provider failed.
    UpstreamFailure {
        /// Human-readable error message.
        message: String,
        /// HTTP status returned by the provider, if any.
        status_code: Option<u16>,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The relayed stream could not be established or read.
    StreamUnavailable {
        /// Human-readable error message.
        message: String,
        /// HTTP status returned by the relay, if any.
        status_code: Option<u16>,
    },

    /// Configuration was missing or invalid.
    Configuration {
        /// Human-readable error message.
        message: String,
    },

    /// HTTP client error.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A streaming error occurred.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Error during JSON serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Encoding/decoding error.
    Encoding {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// A URL parsing or manipulation error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },
}

impl Error {
    /// Creates a new invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Error::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Error::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new rate limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Error::RateLimited {
            message: message.into(),
        }
    }

    /// Creates a new upstream failure.
    pub fn upstream(
        message: impl Into<String>,
        status_code: Option<u16>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::UpstreamFailure {
            message: message.into(),
            status_code,
            source: source.map(Arc::from),
        }
    }

    /// Creates a new stream unavailable error.
    pub fn stream_unavailable(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Error::StreamUnavailable {
            message: message.into(),
            status_code,
        }
    }

    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new encoding error.
    pub fn encoding(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Encoding {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Returns true if this error is an invalid request.
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Error::InvalidRequest { .. })
    }

    /// Returns true if this error is an authorization failure.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized { .. })
    }

    /// Returns true if this error is a rate limit rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    /// Returns true if the upstream provider failed.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::UpstreamFailure { .. })
    }

    /// Returns true if the relayed stream could not be opened or read.
    pub fn is_stream_unavailable(&self) -> bool {
        matches!(self, Error::StreamUnavailable { .. })
    }

    /// Returns true if this error is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    /// Returns the HTTP status this error maps to when returned by the relay.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidRequest { .. } => 400,
            Error::Unauthorized { .. } => 401,
            Error::RateLimited { .. } => 429,
            _ => 500,
        }
    }

    /// Returns the text that may be shown to a client.
    ///
    /// Caller mistakes are reported as-is; everything else collapses to
    /// [`GENERIC_FAILURE`].
    pub fn client_message(&self) -> String {
        match self {
            Error::InvalidRequest { message }
            | Error::Unauthorized { message }
            | Error::RateLimited { message } => message.clone(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::UpstreamFailure { status_code, .. } => *status_code,
            Error::StreamUnavailable { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidRequest { message } => {
                write!(f, "Invalid request: {message}")
            }
            Error::Unauthorized { message } => {
                write!(f, "Unauthorized: {message}")
            }
            Error::RateLimited { message } => {
                write!(f, "Rate limited: {message}")
            }
            Error::UpstreamFailure {
                message,
                status_code,
                ..
            } => {
                if let Some(status_code) = status_code {
                    write!(f, "Upstream failure: {message} (status {status_code})")
                } else {
                    write!(f, "Upstream failure: {message}")
                }
            }
            Error::StreamUnavailable {
                message,
                status_code,
            } => {
                if let Some(status_code) = status_code {
                    write!(f, "Stream unavailable: {message} (status {status_code})")
                } else {
                    write!(f, "Stream unavailable: {message}")
                }
            }
            Error::Configuration { message } => {
                write!(f, "Configuration error: {message}")
            }
            Error::HttpClient { message, .. } => {
                write!(f, "HTTP client error: {message}")
            }
            Error::Streaming { message, .. } => {
                write!(f, "Streaming error: {message}")
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::Encoding { message, .. } => {
                write!(f, "Encoding error: {message}")
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
            Error::Url { message, .. } => {
                write!(f, "URL error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::UpstreamFailure { source, .. }
            | Error::HttpClient { source, .. }
            | Error::Streaming { source, .. }
            | Error::Serialization { source, .. }
            | Error::Encoding { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Error::encoding(format!("UTF-8 error: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for messagegpt operations.
pub type Result<T> = std::result::Result<T, Error>;
