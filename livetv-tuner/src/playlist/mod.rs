//! Playlist catalogue resolution.
//!
//! This module provides:
//! - [`PlaylistFetcher`]: Retrieves playlist bytes over HTTP or from disk
//! - [`parser`]: Lenient M3U parsing into [`ChannelDescriptor`]s
//! - [`channel_id`]: Stable channel and source identifiers

pub mod channel_id;
pub mod fetch;
pub mod parser;

use log::info;
use tokio_util::sync::CancellationToken;

use livetv_model::{ChannelDescriptor, TunerError, TunerSourceConfig};

pub use fetch::PlaylistFetcher;
pub use parser::{parse_bytes, parse_playlist, ExtInf};

/// Fetch and parse the catalogue of one source.
pub async fn load_channels(
    fetcher: &PlaylistFetcher,
    source: &TunerSourceConfig,
    cancel: &CancellationToken,
) -> Result<Vec<ChannelDescriptor>, TunerError> {
    let bytes = fetcher.fetch(source, cancel).await?;
    let prefix = channel_id::source_prefix(&source.url);
    let channels = parse_bytes(&bytes, &prefix, &source.id)?;
    info!(
        "[Playlist] Source {}: {} channels from {}",
        source.id,
        channels.len(),
        source.url
    );
    Ok(channels)
}
