//! Outbound delivery to the Slack webhook.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::DispatchError;

/// Most connections kept open to the webhook host at once.
pub const MAX_CONNECTIONS_PER_HOST: usize = 4;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Destination for rendered messages.
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Get the name of this forwarder.
    fn name(&self) -> &'static str;

    /// Deliver a rendered JSON body, returning whatever the destination
    /// replied with.
    async fn forward(&self, body: Vec<u8>) -> Result<Bytes, DispatchError>;
}

/// Posts rendered messages to the configured webhook URL.
///
/// One instance owns one `reqwest` connection pool; clone the surrounding
/// `Arc` rather than building a second dispatcher.
pub struct OutboundDispatcher {
    webhook: Url,
    client: reqwest::Client,
    permits: Semaphore,
}

impl OutboundDispatcher {
    /// Create a dispatcher for `webhook`, optionally bounding each call.
    pub fn new(webhook: Url, timeout: Option<Duration>) -> Result<Self, DispatchError> {
        let mut builder =
            reqwest::Client::builder().pool_max_idle_per_host(MAX_CONNECTIONS_PER_HOST);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            webhook,
            client: builder.build()?,
            permits: Semaphore::new(MAX_CONNECTIONS_PER_HOST),
        })
    }

    /// Webhook this dispatcher posts to.
    #[must_use]
    pub fn webhook(&self) -> &Url {
        &self.webhook
    }

    /// POST `body` to the webhook and read the full reply.
    ///
    /// The status code is logged but not acted on. A connection permit is held
    /// until the reply body has been consumed, so no more than
    /// [`MAX_CONNECTIONS_PER_HOST`] calls are in flight; the rest wait.
    pub async fn dispatch(&self, body: Vec<u8>) -> Result<Bytes, DispatchError> {
        let _permit = self.permits.acquire().await?;

        let response = self
            .client
            .post(self.webhook.clone())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let reply = consume_body(response).await;

        debug!(
            status = %status,
            "Slack says \"{}\"",
            String::from_utf8_lossy(&reply)
        );

        Ok(reply)
    }
}

#[async_trait]
impl Forwarder for OutboundDispatcher {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn forward(&self, body: Vec<u8>) -> Result<Bytes, DispatchError> {
        self.dispatch(body).await
    }
}

/// Read a reply body chunk by chunk.
///
/// If the stream fails part way, the reason is logged and the bytes received
/// so far are returned.
async fn consume_body(response: reqwest::Response) -> Bytes {
    let mut stream = response.bytes_stream();
    let mut buffer = Vec::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => buffer.extend_from_slice(&chunk),
            Err(e) => {
                debug!(error = %e, "Reply body ended early");
                break;
            }
        }
    }

    Bytes::from(buffer)
}
