use std::fmt;

use thiserror::Error;

/// Failure at a handler/source boundary.
///
/// `Clone` so that callers coalesced onto one in-flight load can all receive
/// the same rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Bad or missing input, rejected before any upstream call.
    #[error("{0}")]
    InvalidInput(String),
    /// Well-formed request refused by the submission gate.
    #[error("Too many requests, try again shortly")]
    RateLimited,
    /// A required server-side credential is absent.
    #[error("{what} not configured")]
    NotConfigured { what: String, status: u16 },
    /// The upstream answered with a failure.
    #[error("{message}")]
    Upstream { status: u16, message: String },
    /// The request never produced an upstream answer.
    #[error("{kind}: {message}")]
    Transport {
        kind: TransportKind,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Timeout,
    Network,
    Decode,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Timeout => write!(f, "timeout"),
            TransportKind::Network => write!(f, "network error"),
            TransportKind::Decode => write!(f, "invalid response"),
        }
    }
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::InvalidInput(message.into())
    }

    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        ApiError::Upstream {
            status,
            message: message.into(),
        }
    }

    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        ApiError::Transport {
            kind,
            message: message.into(),
        }
    }

    /// HTTP-style status a handler would answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidInput(_) => 400,
            ApiError::RateLimited => 429,
            ApiError::NotConfigured { status, .. } => *status,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Transport { .. } => 500,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited)
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::transport(TransportKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::transport(TransportKind::Decode, err.to_string());
    }
    ApiError::transport(TransportKind::Network, err.to_string())
}

pub(crate) fn map_json_error(err: serde_json::Error) -> ApiError {
    ApiError::transport(TransportKind::Decode, err.to_string())
}
