//! Inbound webhook handling.
//!
//! Sonarr is answered right away with a fixed acknowledgment. Parsing,
//! rendering and delivery happen afterwards on a detached task, and their
//! failures only ever reach the log.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::header::{ALLOW, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::dispatch::Forwarder;
use crate::error::{DispatchError, IngestError};
use crate::events::{is_forwarded, InboundEvent};
use crate::render::render;

/// Acknowledgment body.
pub const ACK_BODY: &str = "OK";

/// Acknowledgment content type.
pub const ACK_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Methods the relay answers.
pub const ALLOWED_METHODS: &str = "GET, HEAD, POST, PUT";

/// Response returned to the inbound caller, independent of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgment {
    /// `200 OK` with body `OK`
    Ok,
    /// `405` for methods other than GET/HEAD/POST/PUT
    MethodNotAllowed,
}

impl IntoResponse for Acknowledgment {
    fn into_response(self) -> Response {
        match self {
            Self::Ok => (
                StatusCode::OK,
                [(CONTENT_TYPE, ACK_CONTENT_TYPE)],
                ACK_BODY,
            )
                .into_response(),
            Self::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, [(ALLOW, ALLOWED_METHODS)]).into_response()
            }
        }
    }
}

/// Result of classifying an inbound body.
#[derive(Debug)]
pub enum Classified {
    /// Recognized event, ready to render
    Forward(InboundEvent),
    /// Valid body whose `EventType` is not forwarded
    Ignore { event_type: Option<Value> },
}

/// What happened to one inbound body.
#[derive(Debug)]
pub enum Outcome {
    /// Rendered and delivered; the webhook's reply is attached
    Forwarded(Bytes),
    /// Event type not forwarded
    Ignored { event_type: Option<Value> },
    /// Body failed validation
    Rejected(IngestError),
    /// Rendering or delivery failed
    Failed(DispatchError),
}

/// Validate an inbound body and decide whether it is forwarded.
pub fn classify(body: &[u8]) -> Result<Classified, IngestError> {
    let text = std::str::from_utf8(body)?;
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(map) = value else {
        return Err(IngestError::NotAnObject);
    };

    let event_type = map.get("EventType").and_then(Value::as_str);
    if !is_forwarded(event_type) {
        return Ok(Classified::Ignore {
            event_type: map.get("EventType").cloned(),
        });
    }

    let event_type = event_type.unwrap_or_default().to_string();
    serde_json::from_value(Value::Object(map))
        .map(Classified::Forward)
        .map_err(|source| IngestError::MalformedEvent { event_type, source })
}

/// Inbound handler shared by every route.
#[derive(Clone)]
pub struct Relay {
    forwarder: Arc<dyn Forwarder>,
}

impl Relay {
    #[must_use]
    pub fn new(forwarder: Arc<dyn Forwarder>) -> Self {
        Self { forwarder }
    }

    /// Answer one request.
    ///
    /// POST and PUT bodies are handed to a detached task; the acknowledgment
    /// never waits for it. Must be called from within a Tokio runtime.
    pub fn handle(&self, method: &Method, body: Bytes) -> Acknowledgment {
        let ack = Self::acknowledge(method);
        if *method == Method::POST || *method == Method::PUT {
            self.schedule(body);
        }
        ack
    }

    /// Acknowledgment for `method`, without processing anything.
    #[must_use]
    pub fn acknowledge(method: &Method) -> Acknowledgment {
        if *method == Method::GET
            || *method == Method::HEAD
            || *method == Method::POST
            || *method == Method::PUT
        {
            Acknowledgment::Ok
        } else {
            Acknowledgment::MethodNotAllowed
        }
    }

    /// Process `body` on a new task.
    pub fn schedule(&self, body: Bytes) -> JoinHandle<Outcome> {
        let relay = self.clone();
        tokio::spawn(async move { relay.process(&body).await })
    }

    /// Validate, render and forward one body.
    pub async fn process(&self, body: &[u8]) -> Outcome {
        let event = match classify(body) {
            Ok(Classified::Forward(event)) => event,
            Ok(Classified::Ignore { event_type }) => {
                info!(
                    event_type = ?event_type,
                    "Not sending a Slack notification for this event type"
                );
                return Outcome::Ignored { event_type };
            }
            Err(e) => {
                error!(error = %e, "Dropping webhook body");
                return Outcome::Rejected(e);
            }
        };

        let message = match render(&event) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, event_type = %event.event_type, "Failed to render message");
                return Outcome::Failed(e);
            }
        };

        let channel = self.forwarder.name();
        match self.forwarder.forward(message).await {
            Ok(reply) => {
                debug!(
                    channel,
                    event_type = %event.event_type,
                    "Notification sent"
                );
                Outcome::Forwarded(reply)
            }
            Err(e) => {
                debug!(channel, error = %e, "Failed to send notification");
                Outcome::Failed(e)
            }
        }
    }
}
