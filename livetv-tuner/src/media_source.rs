//! Media source construction for channel stream requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use url::Url;

use livetv_model::{
    ChannelDescriptor, MediaProtocol, MediaSourceDescriptor, MediaStreamInfo, TunerSourceConfig,
};

use crate::network::LocalNetwork;
use crate::playlist::channel_id::stable_hash;

/// User agent sent to upstream servers when the source sets none.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/64.0.3282.85 Safari/537.36";

pub const USER_AGENT_HEADER: &str = "User-Agent";

/// Builds the media source for a channel of a configured source.
#[derive(Clone)]
pub struct MediaSourceBuilder {
    network: Arc<dyn LocalNetwork>,
}

impl MediaSourceBuilder {
    pub fn new(network: Arc<dyn LocalNetwork>) -> Self {
        Self { network }
    }

    /// Build the media source for `channel`.
    ///
    /// Deterministic for identical inputs and network classification.
    pub fn build(
        &self,
        source: &TunerSourceConfig,
        channel: &ChannelDescriptor,
    ) -> MediaSourceDescriptor {
        let path = channel.path.clone();
        let protocol = MediaProtocol::from_path(&path);

        let mut required_http_headers = BTreeMap::new();
        if protocol == MediaProtocol::Http {
            let user_agent = source.user_agent().unwrap_or(DEFAULT_USER_AGENT);
            required_http_headers.insert(USER_AGENT_HEADER.to_string(), user_agent.to_string());
        }

        let mut media_source = MediaSourceDescriptor {
            id: stable_hash(&path),
            is_remote: self.is_remote(&path),
            path,
            protocol,
            required_http_headers,
            media_streams: vec![
                MediaStreamInfo::video_placeholder(),
                MediaStreamInfo::audio_placeholder(),
            ],
            requires_opening: true,
            requires_closing: true,
            requires_looping: source.enable_stream_looping,
            is_infinite_stream: true,
            ignore_dts: true,
            read_at_native_framerate: false,
            supports_direct_play: !source.enable_stream_looping && source.tuner_count == 0,
            supports_direct_stream: !source.enable_stream_looping,
            bitrate: None,
            fallback_max_streaming_bitrate: source.fallback_max_streaming_bitrate,
        };

        media_source.infer_total_bitrate();
        media_source
    }

    /// Paths that are not URLs, or have no host, count as remote.
    fn is_remote(&self, path: &str) -> bool {
        match Url::parse(path) {
            Ok(url) => url
                .host_str()
                .map(|host| !self.network.is_local_host(host))
                .unwrap_or(true),
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::PrivateNetwork;
    use livetv_model::{ChannelType, StreamIndex};

    fn builder() -> MediaSourceBuilder {
        MediaSourceBuilder::new(Arc::new(PrivateNetwork::new()))
    }

    fn channel(path: &str) -> ChannelDescriptor {
        ChannelDescriptor {
            id: "m3u_x_y".into(),
            tuner_host_id: "src".into(),
            name: "Channel".into(),
            number: None,
            group: None,
            image_url: None,
            tuner_channel_id: None,
            path: path.into(),
            channel_type: ChannelType::Tv,
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_capability_flags_all_combinations() {
        let ch = channel("http://example.com/live.ts");
        let cases = [
            (false, 0, true, true),
            (false, 2, false, true),
            (true, 0, false, false),
            (true, 2, false, false),
        ];

        for (looping, tuners, direct_play, direct_stream) in cases {
            let source = TunerSourceConfig::m3u("src", "http://example.com/list.m3u")
                .with_stream_looping(looping)
                .with_tuner_count(tuners);
            let ms = builder().build(&source, &ch);
            assert_eq!(ms.supports_direct_play, direct_play, "looping={looping} tuners={tuners}");
            assert_eq!(ms.supports_direct_stream, direct_stream, "looping={looping} tuners={tuners}");
            assert_eq!(ms.requires_looping, looping);
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let source = TunerSourceConfig::m3u("src", "http://example.com/list.m3u").with_tuner_count(1);
        let ch = channel("http://example.com/live.ts");
        assert_eq!(builder().build(&source, &ch), builder().build(&source, &ch));
    }

    #[test]
    fn test_default_user_agent_for_http() {
        let source = TunerSourceConfig::m3u("src", "http://example.com/list.m3u").with_user_agent("  ");
        let ms = builder().build(&source, &channel("http://example.com/live.ts"));
        assert_eq!(
            ms.required_http_headers.get(USER_AGENT_HEADER).map(String::as_str),
            Some(DEFAULT_USER_AGENT)
        );
    }

    #[test]
    fn test_user_agent_override() {
        let source = TunerSourceConfig::m3u("src", "http://example.com/list.m3u").with_user_agent("Kodi/20");
        let ms = builder().build(&source, &channel("https://example.com/live.ts"));
        assert_eq!(
            ms.required_http_headers.get(USER_AGENT_HEADER).map(String::as_str),
            Some("Kodi/20")
        );
    }

    #[test]
    fn test_no_headers_for_non_http() {
        let source = TunerSourceConfig::m3u("src", "/srv/list.m3u");
        let ms = builder().build(&source, &channel("rtsp://10.0.0.2/stream"));
        assert_eq!(ms.protocol, MediaProtocol::Rtsp);
        assert!(ms.required_http_headers.is_empty());
    }

    #[test]
    fn test_fixed_flags_and_placeholders() {
        let source = TunerSourceConfig::m3u("src", "http://example.com/list.m3u");
        let ms = builder().build(&source, &channel("http://example.com/live.ts"));

        assert!(ms.requires_opening);
        assert!(ms.requires_closing);
        assert!(ms.is_infinite_stream);
        assert!(ms.ignore_dts);
        assert!(!ms.read_at_native_framerate);
        assert_eq!(ms.media_streams.len(), 2);
        assert!(ms.media_streams.iter().all(|s| s.index == StreamIndex::Unknown));
        assert_eq!(ms.bitrate, None);
        assert_eq!(ms.id, stable_hash("http://example.com/live.ts"));
    }

    #[test]
    fn test_remote_detection() {
        let source = TunerSourceConfig::m3u("src", "http://example.com/list.m3u");
        assert!(builder().build(&source, &channel("http://example.com/live.ts")).is_remote);
        assert!(!builder().build(&source, &channel("http://192.168.1.10:8080/live.ts")).is_remote);
        assert!(builder().build(&source, &channel("not a url")).is_remote);
    }
}
