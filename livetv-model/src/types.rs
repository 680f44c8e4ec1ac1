//! Source configuration, channel and tuner descriptors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TunerError;

/// Source type tag for playlist-backed sources.
pub const M3U_SOURCE_TYPE: &str = "m3u";

/// One configured playlist source.
///
/// Loaded from the `[[sources]]` table of the configuration file and
/// replaced wholesale on reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunerSourceConfig {
    /// Unique identifier of the source.
    pub id: String,
    /// Kind of tuner host serving this source.
    #[serde(default = "default_source_type")]
    pub source_type: String,
    /// Playlist URL or local path. Also seeds channel id hashing.
    pub url: String,
    /// Display name for listings.
    #[serde(default)]
    pub friendly_name: Option<String>,
    /// HTTP User-Agent override, used when non-blank.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Maximum simultaneous streams; 0 means unlimited.
    #[serde(default)]
    pub tuner_count: u32,
    /// Force the buffered/looping transport for every stream.
    #[serde(default)]
    pub enable_stream_looping: bool,
    /// Disabled sources are skipped by catalogue listing.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Allow shared passthrough of upstream HTTP streams.
    #[serde(default = "default_true")]
    pub allow_stream_sharing: bool,
    /// Bitrate ceiling handed to downstream transcoding when probing fails.
    #[serde(default)]
    pub fallback_max_streaming_bitrate: Option<u32>,
}

fn default_source_type() -> String {
    M3U_SOURCE_TYPE.to_string()
}

fn default_true() -> bool {
    true
}

impl TunerSourceConfig {
    /// Create an M3U source with default options.
    pub fn m3u(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_type: default_source_type(),
            url: url.into(),
            friendly_name: None,
            user_agent: None,
            tuner_count: 0,
            enable_stream_looping: false,
            enabled: true,
            allow_stream_sharing: true,
            fallback_max_streaming_bitrate: None,
        }
    }

    /// Set the tuner limit.
    pub fn with_tuner_count(mut self, tuner_count: u32) -> Self {
        self.tuner_count = tuner_count;
        self
    }

    /// Set the stream looping flag.
    pub fn with_stream_looping(mut self, enabled: bool) -> Self {
        self.enable_stream_looping = enabled;
        self
    }

    /// Set the user agent override.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// The configured user agent, if it is non-blank.
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent
            .as_deref()
            .map(str::trim)
            .filter(|ua| !ua.is_empty())
    }

    /// True when the source has no tuner limit.
    pub fn is_unlimited(&self) -> bool {
        self.tuner_count == 0
    }

    /// Case-insensitive source identity check.
    pub fn id_matches(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }

    /// Reject configurations that cannot be resolved.
    pub fn validate(&self) -> Result<(), TunerError> {
        if self.id.trim().is_empty() {
            return Err(TunerError::InvalidConfig("source id is empty".to_string()));
        }
        if self.url.trim().is_empty() {
            return Err(TunerError::InvalidConfig(format!(
                "source {} has no playlist url",
                self.id
            )));
        }
        Ok(())
    }
}

/// Kind of channel advertised by a playlist entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    #[default]
    Tv,
    Radio,
}

/// One playlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    /// Stable id: source prefix plus a hash of the playback path.
    pub id: String,
    /// Id of the source this channel was parsed from.
    pub tuner_host_id: String,
    /// Display name.
    pub name: String,
    /// Logical channel number.
    pub number: Option<String>,
    /// Group/category tag.
    pub group: Option<String>,
    /// Logo URL.
    pub image_url: Option<String>,
    /// Upstream guide identifier (`tvg-id` or `channel-id`).
    pub tuner_channel_id: Option<String>,
    /// Playback path or URL.
    pub path: String,
    pub channel_type: ChannelType,
    /// Every attribute found on the directive line, keys lowercased.
    pub attributes: BTreeMap<String, String>,
}

/// Availability of a tuner source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunerStatus {
    Available,
    LiveTv,
    Disabled,
}

/// Summary of a tuner source for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunerInfo {
    pub name: String,
    pub source_type: String,
    pub status: TunerStatus,
    /// Hash of the source URL.
    pub id: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_defaults_from_toml_like_json() {
        let json = r#"{ "id": "iptv", "url": "http://example.com/list.m3u" }"#;
        let config: TunerSourceConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.source_type, M3U_SOURCE_TYPE);
        assert_eq!(config.tuner_count, 0);
        assert!(config.enabled);
        assert!(config.allow_stream_sharing);
        assert!(!config.enable_stream_looping);
        assert!(config.is_unlimited());
    }

    #[test]
    fn test_blank_user_agent_is_ignored() {
        let config = TunerSourceConfig::m3u("a", "http://x").with_user_agent("   ");
        assert_eq!(config.user_agent(), None);

        let config = TunerSourceConfig::m3u("a", "http://x").with_user_agent("VLC/3.0");
        assert_eq!(config.user_agent(), Some("VLC/3.0"));
    }

    #[test]
    fn test_validate() {
        assert!(TunerSourceConfig::m3u("a", "http://x").validate().is_ok());
        assert!(matches!(
            TunerSourceConfig::m3u("", "http://x").validate(),
            Err(TunerError::InvalidConfig(_))
        ));
        assert!(matches!(
            TunerSourceConfig::m3u("a", " ").validate(),
            Err(TunerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_id_matches_ignores_case() {
        let config = TunerSourceConfig::m3u("IPTV-Main", "http://x");
        assert!(config.id_matches("iptv-main"));
        assert!(!config.id_matches("iptv"));
    }
}
