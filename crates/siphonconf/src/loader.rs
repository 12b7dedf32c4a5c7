//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, SiphonConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/siphon/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("siphon/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("siphon.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read one config file as a raw TOML table.
pub fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load a single config file on top of the compiled defaults.
pub fn load_from_file(path: &Path) -> Result<SiphonConfig, ConfigError> {
    let table = read_table(path)?;
    from_table(table, Some(&path.to_path_buf()))
}

/// Deep-merge `overlay` into `base`. Nested tables merge key by key, every
/// other value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

/// Deserialize a merged table; missing keys take their defaults.
pub fn from_table(table: toml::Table, origin: Option<&PathBuf>) -> Result<SiphonConfig, ConfigError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: origin.cloned().unwrap_or_default(),
            message: e.to_string(),
        })
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut SiphonConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Same as [`apply_env_overrides`] with an injectable lookup, so tests do not
/// have to mutate the process environment.
pub fn apply_overrides_from<F>(config: &mut SiphonConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("SIPHON_HUB_NAME") {
        config.hub.name = v;
        sources.env_overrides.push("SIPHON_HUB_NAME".to_string());
    }
    if let Some(v) = lookup("SIPHON_HUB_DESCRIPTION") {
        config.hub.description = v;
        sources.env_overrides.push("SIPHON_HUB_DESCRIPTION".to_string());
    }
    if let Some(v) = lookup("SIPHON_REFRESH_MS") {
        if let Ok(ms) = v.parse() {
            config.refresh.interval_ms = ms;
            sources.env_overrides.push("SIPHON_REFRESH_MS".to_string());
        }
    }
    if let Some(v) = lookup("SIPHON_TOOL_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.tools.timeout_ms = ms;
            sources.env_overrides.push("SIPHON_TOOL_TIMEOUT_MS".to_string());
        }
    }
    if let Some(v) = lookup("SIPHON_GRAPH_SOURCE") {
        if let Ok(kind) = v.parse() {
            config.graph.source = kind;
            sources.env_overrides.push("SIPHON_GRAPH_SOURCE".to_string());
        }
    }
    if let Some(v) = lookup("SIPHON_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("SIPHON_LOG_LEVEL".to_string());
    }
    // RUST_LOG wins over everything
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GraphSourceKind;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[hub]
name = "mixbus"

[tools]
timeout_ms = 750
"#
        )
        .unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.hub.name, "mixbus");
        assert_eq!(config.hub.description, "Siphon");
        assert_eq!(config.tools.timeout_ms, 750);
        assert_eq!(config.tools.pw_link, "pw-link");
        assert_eq!(config.refresh.interval_ms, 1200);
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[hub\nname = ").unwrap();

        let err = load_from_file(file.path()).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, file.path()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_merge_tables_is_deep() {
        let mut base: toml::Table = r#"
[hub]
name = "a"
description = "A"
"#
        .parse()
        .unwrap();
        let overlay: toml::Table = r#"
[hub]
name = "b"
"#
        .parse()
        .unwrap();

        merge_tables(&mut base, overlay);
        let config = from_table(base, None).unwrap();
        assert_eq!(config.hub.name, "b");
        assert_eq!(config.hub.description, "A");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SIPHON_HUB_NAME", "bus"),
            ("SIPHON_REFRESH_MS", "250"),
            ("SIPHON_TOOL_TIMEOUT_MS", "not-a-number"),
            ("SIPHON_GRAPH_SOURCE", "native"),
            ("RUST_LOG", "siphon=trace"),
        ]);

        let mut config = SiphonConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.hub.name, "bus");
        assert_eq!(config.refresh.interval_ms, 250);
        assert_eq!(config.tools.timeout_ms, 5000);
        assert_eq!(config.graph.source, GraphSourceKind::Native);
        assert_eq!(config.telemetry.log_level, "siphon=trace");
        assert_eq!(sources.env_overrides.len(), 4);
    }

    #[test]
    fn test_cli_override_replaces_local() {
        let file = NamedTempFile::new().unwrap();
        let files = discover_config_files_with_override(Some(file.path()));
        assert_eq!(files.last().map(|p| p.as_path()), Some(file.path()));
    }
}
