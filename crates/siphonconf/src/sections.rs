//! Config sections. Every field has a default so partial files load.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The shared hub sink this process creates and routes through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HubConfig {
    /// `node.name` of the hub sink. Also the pactl `sink_name`.
    pub name: String,

    /// Human-readable `device.description`.
    pub description: String,

    /// Channel layout of the hub, as channel tags ("FL", "FR", "AUX0", ...).
    pub channels: Vec<String>,

    /// Treat a pre-existing hub with the same name as ours, which makes it
    /// eligible for destruction when the hub is no longer requested.
    pub adopt_existing: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            name: "siphon".to_string(),
            description: "Siphon".to_string(),
            channels: vec!["FL".to_string(), "FR".to_string()],
            adopt_existing: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RefreshConfig {
    /// Auto-refresh period.
    /// Default: 1200
    pub interval_ms: u64,

    /// When false, `siphon watch` applies once and does not poll the graph.
    /// Default: true
    pub enabled: bool,
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Auto-refresh period, or `None` when auto-refresh is off.
    pub fn period(&self) -> Option<Duration> {
        self.enabled.then(|| self.interval())
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1200,
            enabled: true,
        }
    }
}

/// External PipeWire / PulseAudio command line tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub pw_dump: String,
    pub pw_link: String,
    pub pactl: String,

    /// Upper bound for a single tool invocation. A tool that runs longer is
    /// reported as unresponsive.
    pub timeout_ms: u64,

    /// Graph re-reads after a hub create while waiting for its ports.
    pub hub_settle_attempts: u32,

    pub hub_settle_interval_ms: u64,
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn hub_settle_interval(&self) -> Duration {
        Duration::from_millis(self.hub_settle_interval_ms)
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            pw_dump: "pw-dump".to_string(),
            pw_link: "pw-link".to_string(),
            pactl: "pactl".to_string(),
            timeout_ms: 5000,
            hub_settle_attempts: 10,
            hub_settle_interval_ms: 100,
        }
    }
}

/// Where graph snapshots come from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum GraphSourceKind {
    /// Parse `pw-dump` JSON output.
    #[default]
    #[serde(rename = "pw-dump")]
    PwDump,

    /// Enumerate the PipeWire registry directly (requires the `native` feature).
    #[serde(rename = "native")]
    Native,
}

impl fmt::Display for GraphSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PwDump => write!(f, "pw-dump"),
            Self::Native => write!(f, "native"),
        }
    }
}

impl std::str::FromStr for GraphSourceKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pw-dump" | "pwdump" | "dump" => Ok(Self::PwDump),
            "native" | "registry" => Ok(Self::Native),
            other => Err(format!("Unknown graph source: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct GraphConfig {
    pub source: GraphSourceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Log level or full `EnvFilter` directive.
    /// Default: info
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_period_honors_enabled() {
        let mut refresh = RefreshConfig {
            interval_ms: 250,
            enabled: true,
        };
        assert_eq!(refresh.period(), Some(Duration::from_millis(250)));

        refresh.enabled = false;
        assert_eq!(refresh.period(), None);

        let parsed: RefreshConfig = toml::from_str("enabled = false").unwrap();
        assert_eq!(parsed.period(), None);
        assert_eq!(parsed.interval_ms, 1200);
    }

    #[test]
    fn test_graph_source_parse() {
        assert_eq!("pw-dump".parse::<GraphSourceKind>().unwrap(), GraphSourceKind::PwDump);
        assert_eq!("Native".parse::<GraphSourceKind>().unwrap(), GraphSourceKind::Native);
        assert!("jack".parse::<GraphSourceKind>().is_err());
    }

    #[test]
    fn test_durations() {
        let tools = ToolsConfig::default();
        assert_eq!(tools.timeout(), Duration::from_secs(5));
        assert_eq!(RefreshConfig::default().interval(), Duration::from_millis(1200));
    }
}
