//! Command-line configuration.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;

use crate::error::ConfigError;

/// Listen endpoint used when none is given.
pub const DEFAULT_ENDPOINT: &str = "tcp:10001";

/// Listen backlog used when the endpoint does not set one.
pub const DEFAULT_BACKLOG: u32 = 50;

/// Relay Sonarr webhook events to a Slack incoming webhook.
#[derive(Debug, Clone, Parser)]
#[command(name = "sonarr-slack")]
#[command(version)]
pub struct Config {
    /// Slack incoming webhook URL
    #[arg(long, env = "SONARR_SLACK_WEBHOOK", value_parser = parse_webhook)]
    pub webhook: Url,

    /// Listen endpoint, e.g. `tcp:10001` or `tcp:port=8080:interface=127.0.0.1`
    #[arg(long, env = "SONARR_SLACK_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: ListenSpec,

    /// Seconds to wait for Slack before giving up on a message (0 waits forever)
    #[arg(long, env = "SONARR_SLACK_TIMEOUT", default_value = "30")]
    pub timeout: u64,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Bound on one outbound call, if any.
    #[must_use]
    pub fn dispatch_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }
}

fn parse_webhook(value: &str) -> Result<Url, String> {
    let url = Url::parse(value).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::WebhookScheme(other.to_string()).to_string()),
    }
}

/// Stream-socket endpoint description.
///
/// Accepts `tcp:<port>` and `tcp6:<port>` with optional `interface=<addr>` and
/// `backlog=<n>` parameters, separated by `:`. The port may also be given as
/// `port=<port>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenSpec {
    pub addr: SocketAddr,
    pub backlog: u32,
}

impl FromStr for ListenSpec {
    type Err = ConfigError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut parts = split_params(spec).into_iter();
        let kind = parts.next().unwrap_or_default();

        let default_interface = match kind.as_str() {
            "tcp" => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            "tcp6" => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            "" => return Err(ConfigError::endpoint(spec, "missing endpoint type")),
            other => {
                return Err(ConfigError::endpoint(
                    spec,
                    format!("unsupported endpoint type {other:?}"),
                ))
            }
        };

        let mut port = None;
        let mut interface = None;
        let mut backlog = DEFAULT_BACKLOG;

        for (index, part) in parts.enumerate() {
            match part.split_once('=') {
                Some(("port", value)) => port = Some(parse_port(spec, value)?),
                Some(("interface", value)) => {
                    interface = Some(value.parse::<IpAddr>().map_err(|e| {
                        ConfigError::endpoint(spec, format!("bad interface {value:?}: {e}"))
                    })?);
                }
                Some(("backlog", value)) => {
                    backlog = value.parse().map_err(|e| {
                        ConfigError::endpoint(spec, format!("bad backlog {value:?}: {e}"))
                    })?;
                }
                Some((key, _)) => {
                    return Err(ConfigError::endpoint(
                        spec,
                        format!("unknown parameter {key:?}"),
                    ))
                }
                None if index == 0 => port = Some(parse_port(spec, &part)?),
                None => {
                    return Err(ConfigError::endpoint(
                        spec,
                        format!("unexpected positional argument {part:?}"),
                    ))
                }
            }
        }

        let port = port.ok_or_else(|| ConfigError::endpoint(spec, "missing port"))?;
        let ip = interface.unwrap_or(default_interface);

        Ok(Self {
            addr: SocketAddr::new(ip, port),
            backlog,
        })
    }
}

impl fmt::Display for ListenSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.addr.is_ipv6() { "tcp6" } else { "tcp" };
        let interface = self.addr.ip().to_string().replace(':', "\\:");
        write!(
            f,
            "{kind}:port={}:interface={interface}:backlog={}",
            self.addr.port(),
            self.backlog
        )
    }
}

fn parse_port(spec: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse()
        .map_err(|e| ConfigError::endpoint(spec, format!("bad port {value:?}: {e}")))
}

/// Split on `:`, honouring `\` escapes so IPv6 interfaces can be written as
/// `interface=\:\:1`.
fn split_params(spec: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = spec.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ':' => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(s: &str) -> ListenSpec {
        s.parse().unwrap()
    }

    #[test]
    fn test_default_endpoint() {
        let listen = spec(DEFAULT_ENDPOINT);
        assert_eq!(listen.addr, "0.0.0.0:10001".parse().unwrap());
        assert_eq!(listen.backlog, DEFAULT_BACKLOG);
    }

    #[test]
    fn test_keyword_parameters() {
        let listen = spec("tcp:port=8080:interface=127.0.0.1:backlog=10");
        assert_eq!(listen.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(listen.backlog, 10);

        let listen = spec("tcp:interface=127.0.0.1:port=8080");
        assert_eq!(listen.addr, "127.0.0.1:8080".parse().unwrap());

        let listen = spec("tcp:9000:interface=10.0.0.2");
        assert_eq!(listen.addr, "10.0.0.2:9000".parse().unwrap());
    }

    #[test]
    fn test_tcp6() {
        assert_eq!(spec("tcp6:10001").addr, "[::]:10001".parse().unwrap());
        assert_eq!(
            spec(r"tcp6:10001:interface=\:\:1").addr,
            "[::1]:10001".parse().unwrap()
        );
        assert!("tcp6:10001:interface=::1".parse::<ListenSpec>().is_err());
    }

    #[test]
    fn test_rejected_endpoints() {
        for bad in [
            "",
            "unix:/tmp/sock",
            "ssl:443",
            "tcp",
            "tcp:notaport",
            "tcp:70000",
            "tcp:10001:interface=nowhere",
            "tcp:10001:colour=blue",
            "tcp:10001:20002",
            "tcp:10001:backlog=-1",
        ] {
            assert!(bad.parse::<ListenSpec>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_display_escapes_ipv6() {
        let listen = spec(r"tcp6:port=8080:interface=\:\:1:backlog=7");
        assert_eq!(listen.to_string(), r"tcp6:port=8080:interface=\:\:1:backlog=7");
        assert_eq!(listen.to_string().parse::<ListenSpec>().unwrap(), listen);
    }

    #[test]
    fn test_cli_defaults() {
        let config =
            Config::try_parse_from(["sonarr-slack", "--webhook", "https://hooks.slack.com/x"])
                .unwrap();
        assert_eq!(config.endpoint, spec(DEFAULT_ENDPOINT));
        assert_eq!(config.dispatch_timeout(), Some(Duration::from_secs(30)));
        assert!(!config.verbose);
    }

    #[test]
    fn test_cli_requires_http_webhook() {
        assert!(Config::try_parse_from(["sonarr-slack"]).is_err());
        assert!(
            Config::try_parse_from(["sonarr-slack", "--webhook", "ftp://example.com/x"]).is_err()
        );
        assert!(Config::try_parse_from(["sonarr-slack", "--webhook", "not a url"]).is_err());
    }

    #[test]
    fn test_zero_timeout_disables_bound() {
        let config = Config::try_parse_from([
            "sonarr-slack",
            "--webhook",
            "http://localhost/hook",
            "--endpoint",
            "tcp:port=0:interface=127.0.0.1",
            "--timeout",
            "0",
        ])
        .unwrap();
        assert_eq!(config.dispatch_timeout(), None);
        assert_eq!(config.endpoint.addr.port(), 0);
    }
}
