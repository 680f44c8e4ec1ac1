//! Configuration file loading.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use livetv_model::{TunerError, TunerSourceConfig};

use crate::tuner::LeaseConfig;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "livetv-tuner.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Invalid(#[from] TunerError),
}

/// Configuration file format.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub lease: LeaseConfig,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub sources: Vec<TunerSourceConfig>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub log_dir: Option<String>,
    pub retention_days: Option<u64>,
    pub level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct NetworkSection {
    /// Host names treated as part of the local network.
    #[serde(default)]
    pub local_hosts: Vec<String>,
}

impl ConfigFile {
    /// Parse configuration text. `origin` is only used in error messages.
    pub fn from_toml(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: ConfigFile = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        for source in &config.sources {
            source.validate()?;
        }
        Ok(config)
    }
}

/// Read and parse a configuration file.
pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ConfigFile::from_toml(&contents, path)
}

/// Explicit path, else [`DEFAULT_CONFIG_FILE`] if it exists.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        default_path.exists().then_some(default_path)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let text = r#"
            [logging]
            log_dir = "/var/log/livetv"
            retention_days = 3
            level = "debug"

            [lease]
            idle_timeout_secs = 120

            [network]
            local_hosts = ["tv.lan"]

            [[sources]]
            id = "iptv"
            url = "http://example.com/list.m3u"
            tuner_count = 2
            user_agent = "VLC/3.0"

            [[sources]]
            id = "local"
            url = "/srv/tv/list.m3u"
            enable_stream_looping = true
            enabled = false
        "#;

        let config = ConfigFile::from_toml(text, Path::new("test.toml")).unwrap();
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.logging.retention_days, Some(3));
        assert_eq!(config.lease.idle_timeout_secs, 120);
        assert_eq!(config.lease.reap_interval_secs, 30);
        assert_eq!(config.network.local_hosts, vec!["tv.lan".to_string()]);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].tuner_count, 2);
        assert_eq!(config.sources[0].user_agent(), Some("VLC/3.0"));
        assert!(config.sources[1].enable_stream_looping);
        assert!(!config.sources[1].enabled);
    }

    #[test]
    fn test_empty_config() {
        let config = ConfigFile::from_toml("", Path::new("empty.toml")).unwrap();
        assert!(config.sources.is_empty());
        assert_eq!(config.lease.idle_timeout_secs, 300);
    }

    #[test]
    fn test_invalid_source_rejected() {
        let text = "[[sources]]\nid = \"\"\nurl = \"http://x\"\n";
        assert!(matches!(
            ConfigFile::from_toml(text, Path::new("bad.toml")),
            Err(ConfigError::Invalid(TunerError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            ConfigFile::from_toml("[[sources]\n", Path::new("bad.toml")),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/livetv-tuner.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
