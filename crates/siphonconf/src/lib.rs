//! Configuration loading for siphon.
//!
//! Every siphon crate reads its settings through [`SiphonConfig`]. The hub
//! identity, the refresh cadence and the external tool invocations all live
//! here so the engine itself stays free of environment lookups.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/siphon/config.toml` (system)
//! 2. `~/.config/siphon/config.toml` (user)
//! 3. `./siphon.toml` (local override, replaced by `--config` when given)
//! 4. Environment variables (`SIPHON_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [hub]
//! name = "siphon"
//! description = "Siphon"
//! channels = ["FL", "FR"]
//!
//! [refresh]
//! interval_ms = 1200
//!
//! [tools]
//! pw_link = "pw-link"
//! timeout_ms = 5000
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{GraphConfig, GraphSourceKind, HubConfig, RefreshConfig, TelemetryConfig, ToolsConfig};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete siphon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SiphonConfig {
    pub hub: HubConfig,
    pub refresh: RefreshConfig,
    pub tools: ToolsConfig,
    pub graph: GraphConfig,
    pub telemetry: TelemetryConfig,
}

impl SiphonConfig {
    /// Load configuration from all sources. `config_path` replaces the local
    /// `./siphon.toml` override; system and user configs still load first.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::read_table(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let mut config = loader::from_table(merged, sources.files.last())?;
        loader::apply_env_overrides(&mut config, &mut sources);
        config.validate()?;

        Ok((config, sources))
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.name.trim().is_empty() {
            return Err(ConfigError::Invalid("hub.name must not be empty".into()));
        }
        if self.hub.channels.is_empty() {
            return Err(ConfigError::Invalid("hub.channels must list at least one channel".into()));
        }
        if self.refresh.interval_ms == 0 {
            return Err(ConfigError::Invalid("refresh.interval_ms must be positive".into()));
        }
        if self.tools.timeout_ms == 0 {
            return Err(ConfigError::Invalid("tools.timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# siphon configuration\n\n");

        output.push_str("[hub]\n");
        output.push_str(&format!("name = \"{}\"\n", self.hub.name));
        output.push_str(&format!("description = \"{}\"\n", self.hub.description));
        let channels: Vec<String> = self.hub.channels.iter().map(|c| format!("\"{}\"", c)).collect();
        output.push_str(&format!("channels = [{}]\n", channels.join(", ")));
        output.push_str(&format!("adopt_existing = {}\n", self.hub.adopt_existing));

        output.push_str("\n[refresh]\n");
        output.push_str(&format!("interval_ms = {}\n", self.refresh.interval_ms));
        output.push_str(&format!("enabled = {}\n", self.refresh.enabled));

        output.push_str("\n[tools]\n");
        output.push_str(&format!("pw_dump = \"{}\"\n", self.tools.pw_dump));
        output.push_str(&format!("pw_link = \"{}\"\n", self.tools.pw_link));
        output.push_str(&format!("pactl = \"{}\"\n", self.tools.pactl));
        output.push_str(&format!("timeout_ms = {}\n", self.tools.timeout_ms));
        output.push_str(&format!("hub_settle_attempts = {}\n", self.tools.hub_settle_attempts));
        output.push_str(&format!("hub_settle_interval_ms = {}\n", self.tools.hub_settle_interval_ms));

        output.push_str("\n[graph]\n");
        output.push_str(&format!("source = \"{}\"\n", self.graph.source));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output
    }
}
