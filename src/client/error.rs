//! Error types for the request builder.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by [`RequestSpec::execute`](super::RequestSpec::execute)
/// and [`RequestSpec::execute_json`](super::RequestSpec::execute_json).
///
/// Variants raised after a response arrived carry its status, see
/// [`ClientError::status`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// A required setup step was skipped or a builder call was given
    /// unusable input. Nothing was sent.
    #[error("misconfiguration detected: {reason}")]
    Misconfiguration {
        /// What is missing or invalid.
        reason: String,
    },

    /// The assembled URI could not be parsed.
    #[error("invalid request URL {url}: {source}")]
    InvalidUrl {
        /// The URI assembled from base, path and query.
        url: String,
        /// The parse failure.
        #[source]
        source: url::ParseError,
    },

    /// Connection-level failure reported by the transport.
    #[error("transport error requesting {url}: {source}")]
    Transport {
        /// The requested URL.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The cancellation token fired before the call finished.
    #[error("request to {url} was cancelled")]
    Cancelled {
        /// The requested URL.
        url: String,
    },

    /// The response had no usable `Content-Type` header.
    #[error("malformed Content-Type {value:?} (HTTP {status})")]
    MalformedContentType {
        /// Response status.
        status: StatusCode,
        /// Raw header value, empty when absent.
        value: String,
    },

    /// JSON decoding was requested but the response is not `application/json`.
    #[error("unsupported media type: expected application/json but got {media_type} (HTTP {status})")]
    UnsupportedMediaType {
        /// Response status.
        status: StatusCode,
        /// The media type the server declared, lowercased, parameters stripped.
        media_type: String,
    },

    /// Reading the response body failed.
    #[error("error reading response body (HTTP {status}): {source}")]
    Body {
        /// Response status.
        status: StatusCode,
        /// The underlying read error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body did not match the requested model.
    #[error("error decoding JSON response (HTTP {status}): {source}")]
    Decode {
        /// Response status.
        status: StatusCode,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    /// Creates a misconfiguration error.
    pub fn misconfiguration(reason: impl Into<String>) -> Self {
        Self::Misconfiguration {
            reason: reason.into(),
        }
    }

    /// Returns the response status when the error happened after a response
    /// was received.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::MalformedContentType { status, .. }
            | Self::UnsupportedMediaType { status, .. }
            | Self::Body { status, .. }
            | Self::Decode { status, .. } => Some(*status),
            Self::Misconfiguration { .. }
            | Self::InvalidUrl { .. }
            | Self::Transport { .. }
            | Self::Cancelled { .. } => None,
        }
    }

    /// Returns true when the call never reached the network because the
    /// builder was not fully configured.
    #[must_use]
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, Self::Misconfiguration { .. })
    }
}
