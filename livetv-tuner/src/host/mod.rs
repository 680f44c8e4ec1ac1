//! Tuner host abstraction.
//!
//! A [`TunerHost`] serves one kind of tuner source. The playlist-backed
//! variant is [`M3uTunerHost`]; [`TunerHostRegistry`] dispatches configured
//! sources to the host registered for their `source_type`.

pub mod handle;
pub mod m3u;
pub mod registry;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use livetv_model::{
    ChannelDescriptor, MediaSourceDescriptor, TransportKind, TunerError, TunerInfo,
    TunerSourceConfig,
};

pub use handle::{HandleState, LiveStreamHandle};
pub use m3u::M3uTunerHost;
pub use registry::{SourceCatalogue, TunerHostRegistry};

/// Operations every tuner source kind provides.
#[async_trait]
pub trait TunerHost: Send + Sync {
    /// Tag matched against [`TunerSourceConfig::source_type`].
    fn source_type(&self) -> &'static str;

    /// Human-readable kind name.
    fn name(&self) -> &'static str;

    /// Resolve the channel catalogue of a source.
    async fn list_channels(
        &self,
        source: &TunerSourceConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChannelDescriptor>, TunerError>;

    /// Summary of a source for listings. Performs no I/O.
    fn describe_source(&self, source: &TunerSourceConfig) -> Result<TunerInfo, TunerError>;

    /// Check that the source is reachable and parseable, keeping no state.
    async fn validate(
        &self,
        source: &TunerSourceConfig,
        cancel: &CancellationToken,
    ) -> Result<(), TunerError>;

    /// Media sources a channel can be played from.
    fn channel_media_sources(
        &self,
        source: &TunerSourceConfig,
        channel: &ChannelDescriptor,
    ) -> Result<Vec<MediaSourceDescriptor>, TunerError>;

    /// Delivery this host would use for a media source of `source`.
    fn choose_transport(
        &self,
        source: &TunerSourceConfig,
        media_source: &MediaSourceDescriptor,
    ) -> TransportKind;

    /// Claim a tuner slot for `channel` and decide how it will be delivered.
    ///
    /// Rejects with [`TunerError::Conflict`] before any I/O when the source
    /// has no free slot. The returned handle still has to be opened.
    fn request_stream(
        &self,
        source: &TunerSourceConfig,
        channel: &ChannelDescriptor,
        stream_id: &str,
    ) -> Result<LiveStreamHandle, TunerError>;

    /// Find sources of this kind on the network.
    async fn discover_sources(&self, timeout: Duration) -> Vec<TunerSourceConfig>;
}
