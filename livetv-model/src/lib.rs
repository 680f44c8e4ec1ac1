//! Data model for the playlist-backed live TV tuner host.
//!
//! This crate defines the types shared between catalogue parsing, tuner
//! allocation and the streaming engine boundary:
//!
//! - [`TunerSourceConfig`]: one configured playlist source
//! - [`ChannelDescriptor`]: one parsed playlist entry
//! - [`MediaSourceDescriptor`]: a playback target built per stream request
//! - [`TransportKind`]: shared passthrough or buffered/looping delivery
//! - [`TunerError`]: fetch, format, conflict and open failures
//!
//! ```rust
//! use livetv_model::{MediaProtocol, TunerSourceConfig};
//!
//! let source = TunerSourceConfig::m3u("iptv", "http://example.com/list.m3u")
//!     .with_tuner_count(2);
//! assert!(source.validate().is_ok());
//! assert!(!source.is_unlimited());
//!
//! assert_eq!(MediaProtocol::from_path("http://example.com/ch1.ts"), MediaProtocol::Http);
//! ```

pub mod error;
pub mod media;
pub mod types;

pub use error::{TunerError, TUNER_LIMIT_MESSAGE};
pub use media::{
    MediaProtocol, MediaSourceDescriptor, MediaStreamInfo, MediaStreamKind, StreamIndex,
    TransportKind,
};
pub use types::{
    ChannelDescriptor, ChannelType, TunerInfo, TunerSourceConfig, TunerStatus, M3U_SOURCE_TYPE,
};
