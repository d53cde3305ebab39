//! Slack message rendering.
//!
//! The message is built as typed structs and serialized with `serde_json`, so
//! titles containing quotes, backslashes or control characters always produce
//! well-formed JSON.

use serde::Serialize;

use crate::error::DispatchError;
use crate::events::{rule_for, EpisodeRecord, InboundEvent, UNKNOWN_VERB};

/// Markdown-enabled attachment fields.
const MRKDWN_IN: [&str; 3] = ["pretext", "text", "fields"];

/// Attachment highlight color.
const ATTACHMENT_COLOR: &str = "good";

/// Slack incoming-webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackMessage {
    pub text: String,
    pub attachments: Vec<SlackAttachment>,
}

/// One attachment per episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackAttachment {
    pub fallback: String,
    pub text: String,
    pub mrkdwn_in: [&'static str; 3],
    pub color: &'static str,
}

/// Build the Slack message for an event.
///
/// Total over every `EventType` value: types without a rule get
/// [`UNKNOWN_VERB`] as headline verb.
#[must_use]
pub fn build_message(event: &InboundEvent) -> SlackMessage {
    let verb = rule_for(&event.event_type).map_or(UNKNOWN_VERB, |rule| rule.verb);

    SlackMessage {
        text: format!("{verb} episodes from _{}_", event.series_title()),
        attachments: event
            .episodes
            .iter()
            .flatten()
            .map(episode_attachment)
            .collect(),
    }
}

/// Render an event to the JSON body posted to Slack.
pub fn render(event: &InboundEvent) -> Result<Vec<u8>, DispatchError> {
    Ok(serde_json::to_vec(&build_message(event))?)
}

fn episode_attachment(episode: &EpisodeRecord) -> SlackAttachment {
    let code = episode.code();
    let title = episode.display_title();

    let mut text = format!("{code} - _{title}_");
    if let Some(quality) = &episode.quality {
        text.push_str(&format!(" [{quality}]"));
    }
    if let Some(air_date) = &episode.air_date {
        text.push_str(&format!("\nFirst aired: {air_date}"));
    }

    SlackAttachment {
        fallback: format!("{code} - {title}"),
        text,
        mrkdwn_in: MRKDWN_IN,
        color: ATTACHMENT_COLOR,
    }
}
