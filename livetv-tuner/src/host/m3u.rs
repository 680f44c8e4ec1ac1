//! Tuner host for M3U playlist sources.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use tokio_util::sync::CancellationToken;

use livetv_model::{
    ChannelDescriptor, MediaSourceDescriptor, TransportKind, TunerError, TunerInfo,
    TunerSourceConfig, TunerStatus, M3U_SOURCE_TYPE,
};

use crate::host::{LiveStreamHandle, TunerHost};
use crate::media_source::MediaSourceBuilder;
use crate::network::LocalNetwork;
use crate::playlist::{self, channel_id, PlaylistFetcher};
use crate::tuner::{TransportSelector, TunerAllocator};

const M3U_HOST_NAME: &str = "M3U Tuner";

/// Serves channels and streams from M3U playlists.
pub struct M3uTunerHost {
    fetcher: PlaylistFetcher,
    builder: MediaSourceBuilder,
    selector: TransportSelector,
    allocator: TunerAllocator,
}

impl M3uTunerHost {
    pub fn new(
        fetcher: PlaylistFetcher,
        network: Arc<dyn LocalNetwork>,
        allocator: TunerAllocator,
    ) -> Self {
        Self {
            fetcher,
            builder: MediaSourceBuilder::new(network),
            selector: TransportSelector::default(),
            allocator,
        }
    }

    /// Replace the transport selection policy.
    pub fn with_selector(mut self, selector: TransportSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn allocator(&self) -> &TunerAllocator {
        &self.allocator
    }

    fn ensure_source(&self, source: &TunerSourceConfig) -> Result<(), TunerError> {
        source.validate()?;
        if !source.source_type.eq_ignore_ascii_case(M3U_SOURCE_TYPE) {
            return Err(TunerError::InvalidConfig(format!(
                "source {} has type {}, expected {}",
                source.id, source.source_type, M3U_SOURCE_TYPE
            )));
        }
        Ok(())
    }

    /// Channels only belong to the source whose URL produced their prefix.
    fn ensure_channel(
        &self,
        source: &TunerSourceConfig,
        channel: &ChannelDescriptor,
    ) -> Result<(), TunerError> {
        if channel.id.starts_with(&channel_id::source_prefix(&source.url)) {
            Ok(())
        } else {
            Err(TunerError::ChannelNotFound(format!(
                "{} is not a channel of source {}",
                channel.id, source.id
            )))
        }
    }
}

#[async_trait]
impl TunerHost for M3uTunerHost {
    fn source_type(&self) -> &'static str {
        M3U_SOURCE_TYPE
    }

    fn name(&self) -> &'static str {
        M3U_HOST_NAME
    }

    async fn list_channels(
        &self,
        source: &TunerSourceConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChannelDescriptor>, TunerError> {
        self.ensure_source(source)?;
        playlist::load_channels(&self.fetcher, source, cancel).await
    }

    fn describe_source(&self, source: &TunerSourceConfig) -> Result<TunerInfo, TunerError> {
        self.ensure_source(source)?;
        Ok(TunerInfo {
            name: source
                .friendly_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| M3U_HOST_NAME.to_string()),
            source_type: M3U_SOURCE_TYPE.to_string(),
            status: if source.enabled {
                TunerStatus::Available
            } else {
                TunerStatus::Disabled
            },
            id: channel_id::stable_hash(&source.url),
            url: source.url.clone(),
        })
    }

    async fn validate(
        &self,
        source: &TunerSourceConfig,
        cancel: &CancellationToken,
    ) -> Result<(), TunerError> {
        self.ensure_source(source)?;
        let bytes = self.fetcher.fetch(source, cancel).await?;
        let channels =
            playlist::parse_bytes(&bytes, &channel_id::source_prefix(&source.url), &source.id)?;
        info!(
            "[M3uTunerHost] Source {} is valid ({} channels)",
            source.id,
            channels.len()
        );
        Ok(())
    }

    fn channel_media_sources(
        &self,
        source: &TunerSourceConfig,
        channel: &ChannelDescriptor,
    ) -> Result<Vec<MediaSourceDescriptor>, TunerError> {
        self.ensure_source(source)?;
        self.ensure_channel(source, channel)?;
        Ok(vec![self.builder.build(source, channel)])
    }

    fn choose_transport(
        &self,
        source: &TunerSourceConfig,
        media_source: &MediaSourceDescriptor,
    ) -> TransportKind {
        self.selector.choose_for_source(source, media_source)
    }

    fn request_stream(
        &self,
        source: &TunerSourceConfig,
        channel: &ChannelDescriptor,
        stream_id: &str,
    ) -> Result<LiveStreamHandle, TunerError> {
        self.ensure_source(source)?;
        self.ensure_channel(source, channel)?;

        let lease = self.allocator.try_acquire(source, stream_id)?;
        let media_source = self.builder.build(source, channel);
        let transport = self.choose_transport(source, &media_source);
        debug!(
            "[M3uTunerHost] Stream {} for channel {} uses {:?} ({})",
            stream_id, channel.name, transport, media_source.path
        );

        Ok(LiveStreamHandle::new(
            lease,
            channel.id.clone(),
            media_source,
            transport,
        ))
    }

    async fn discover_sources(&self, _timeout: Duration) -> Vec<TunerSourceConfig> {
        debug!("[M3uTunerHost] M3U sources cannot be discovered");
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use livetv_model::ChannelType;

    use crate::host::HandleState;
    use crate::network::PrivateNetwork;

    const URL: &str = "http://example.com/list.m3u";

    fn host() -> M3uTunerHost {
        M3uTunerHost::new(
            PlaylistFetcher::new().unwrap(),
            Arc::new(PrivateNetwork::new()),
            TunerAllocator::new(),
        )
    }

    fn channel(path: &str) -> ChannelDescriptor {
        ChannelDescriptor {
            id: channel_id::channel_id(&channel_id::source_prefix(URL), path),
            tuner_host_id: "iptv".into(),
            name: "Test".into(),
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
    fn test_describe_source() {
        let source = TunerSourceConfig::m3u("iptv", URL);
        let info = host().describe_source(&source).unwrap();

        assert_eq!(info.name, "M3U Tuner");
        assert_eq!(info.source_type, "m3u");
        assert_eq!(info.status, TunerStatus::Available);
        assert_eq!(info.id, channel_id::stable_hash(URL));
        assert_eq!(info.url, URL);
    }

    #[test]
    fn test_describe_rejects_bad_config() {
        let mut source = TunerSourceConfig::m3u("iptv", URL);
        source.source_type = "hdhomerun".into();
        assert!(matches!(
            host().describe_source(&source),
            Err(TunerError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_discover_is_empty() {
        assert!(host().discover_sources(Duration::from_millis(100)).await.is_empty());
    }

    #[test]
    fn test_request_stream_limit() {
        let host = host();
        let source = TunerSourceConfig::m3u("iptv", URL).with_tuner_count(1);
        let ch = channel("http://example.com/ch1.ts");

        let handle = host.request_stream(&source, &ch, "s1").unwrap();
        assert_eq!(handle.state(), HandleState::Granted);
        assert_eq!(handle.transport(), TransportKind::SharedPassthrough);
        assert_eq!(handle.source_id(), "iptv");
        assert_eq!(handle.channel_id(), ch.id);

        let rejected = host.request_stream(&source, &ch, "s2");
        assert!(matches!(rejected, Err(TunerError::Conflict(_))));

        drop(handle);
        assert!(host.request_stream(&source, &ch, "s2").is_ok());
    }

    #[test]
    fn test_request_stream_looping_source() {
        let source = TunerSourceConfig::m3u("iptv", URL).with_stream_looping(true);
        let handle = host()
            .request_stream(&source, &channel("http://example.com/ch1.ts"), "s1")
            .unwrap();

        assert_eq!(handle.transport(), TransportKind::BufferedLoop);
        assert!(handle.media_source().requires_looping);
        assert!(!handle.media_source().supports_direct_stream);
    }

    #[test]
    fn test_foreign_channel_is_rejected() {
        let source = TunerSourceConfig::m3u("other", "http://other.example.com/list.m3u");
        let result = host().request_stream(&source, &channel("http://example.com/ch1.ts"), "s1");
        assert!(matches!(result, Err(TunerError::ChannelNotFound(_))));
    }

    #[test]
    fn test_configured_selector_is_used() {
        let host = host().with_selector(TransportSelector::with_disallowed_extensions([".ts"]));
        let source = TunerSourceConfig::m3u("iptv", URL);
        let ch = channel("http://example.com/ch1.ts");

        let media_source = &host.channel_media_sources(&source, &ch).unwrap()[0];
        assert_eq!(
            host.choose_transport(&source, media_source),
            TransportKind::BufferedLoop
        );
        let handle = host.request_stream(&source, &ch, "s1").unwrap();
        assert_eq!(handle.transport(), TransportKind::BufferedLoop);
    }

    #[test]
    fn test_channel_media_sources() {
        let source = TunerSourceConfig::m3u("iptv", URL);
        let sources = host()
            .channel_media_sources(&source, &channel("http://example.com/ch1.ts"))
            .unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].path, "http://example.com/ch1.ts");
    }
}
