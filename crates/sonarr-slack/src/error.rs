//! Error types for the relay.

use thiserror::Error;

/// Reasons an inbound body is dropped before anything is forwarded.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Body is not valid UTF-8
    #[error("Invalid UTF-8 data: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Body is not valid JSON
    #[error("Invalid JSON data: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Body is JSON but not an object
    #[error("Was expecting JSON mapping object")]
    NotAnObject,

    /// A recognized event whose fields have unexpected JSON types
    #[error("Malformed {event_type} event: {source}")]
    MalformedEvent {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that can occur when forwarding a rendered message.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connection permits are no longer available
    #[error("Connection pool closed")]
    PoolClosed(#[from] tokio::sync::AcquireError),
}

/// Invalid startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Listen endpoint description could not be parsed
    #[error("Invalid endpoint {spec:?}: {reason}")]
    Endpoint { spec: String, reason: String },

    /// Webhook URL uses a scheme other than http/https
    #[error("Unsupported webhook URL scheme: {0}")]
    WebhookScheme(String),
}

impl ConfigError {
    pub(crate) fn endpoint(spec: &str, reason: impl Into<String>) -> Self {
        Self::Endpoint {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}
