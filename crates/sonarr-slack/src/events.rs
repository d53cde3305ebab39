//! Inbound Sonarr event types.

use serde::Deserialize;

/// How the relay treats one `EventType` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRule {
    /// `EventType` value as sent by Sonarr
    pub name: &'static str,
    /// Headline verb for the Slack message
    pub verb: &'static str,
    /// Whether events of this type are forwarded
    pub notify: bool,
}

/// Recognized event types. Anything not listed here is never forwarded.
pub const EVENT_RULES: &[EventRule] = &[
    EventRule {
        name: "Test",
        verb: "Tested",
        notify: true,
    },
    EventRule {
        name: "Grab",
        verb: "Grabbed",
        notify: true,
    },
    EventRule {
        name: "Download",
        verb: "Downloaded",
        notify: true,
    },
];

/// Headline verb for event types missing from [`EVENT_RULES`].
pub const UNKNOWN_VERB: &str = "Something unknown happened to";

/// Look up the rule for an `EventType` value. Matching is case-sensitive.
#[must_use]
pub fn rule_for(event_type: &str) -> Option<&'static EventRule> {
    EVENT_RULES.iter().find(|rule| rule.name == event_type)
}

/// Whether an event of this type should produce a Slack message.
#[must_use]
pub fn is_forwarded(event_type: Option<&str>) -> bool {
    event_type
        .and_then(rule_for)
        .is_some_and(|rule| rule.notify)
}

/// One Sonarr webhook body.
///
/// Only the fields the message needs are decoded; everything else Sonarr
/// sends is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InboundEvent {
    pub event_type: String,
    #[serde(default)]
    pub series: Option<Series>,
    #[serde(default)]
    pub episodes: Option<Vec<EpisodeRecord>>,
}

impl InboundEvent {
    /// Series title, or an empty string when Sonarr left it out.
    #[must_use]
    pub fn series_title(&self) -> &str {
        self.series
            .as_ref()
            .and_then(|series| series.title.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Series {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EpisodeRecord {
    pub season_number: i64,
    pub episode_number: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub air_date: Option<String>,
}

impl EpisodeRecord {
    /// Episode title, or an empty string when missing or null.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    /// `S<SS>E<EE>`, zero-padded to two digits and never truncated.
    #[must_use]
    pub fn code(&self) -> String {
        format!("S{:02}E{:02}", self.season_number, self.episode_number)
    }
}
