//! Sonarr to Slack webhook relay.
//!
//! Sonarr posts an event to any path on the relay and is answered with a
//! fixed `200 OK` straight away. The event is then validated, filtered by
//! `EventType`, rendered as a Slack incoming-webhook message and posted to the
//! configured webhook on a detached task.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use sonarr_slack::{server, OutboundDispatcher, Relay};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let webhook = "https://hooks.slack.com/services/T000/B000/XXXX".parse()?;
//! let dispatcher = OutboundDispatcher::new(webhook, None)?;
//! let relay = Relay::new(Arc::new(dispatcher));
//!
//! let endpoint: sonarr_slack::ListenSpec = "tcp:10001".parse()?;
//! let listener = server::bind(&endpoint)?;
//! server::run_server(relay, listener).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`Relay`] answers every request and schedules processing
//! - [`render::build_message`] turns an [`InboundEvent`] into a [`SlackMessage`]
//! - [`OutboundDispatcher`] posts rendered messages through one bounded
//!   connection pool, behind the [`Forwarder`] trait

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod relay;
pub mod render;
pub mod server;

pub use config::{Config, ListenSpec};
pub use dispatch::{Forwarder, OutboundDispatcher, MAX_CONNECTIONS_PER_HOST};
pub use error::{ConfigError, DispatchError, IngestError};
pub use events::{EpisodeRecord, InboundEvent};
pub use relay::{Acknowledgment, Outcome, Relay};
pub use render::{render, SlackMessage};
