//! livetv-tuner: tuner-backed live stream allocation for M3U sources.
//!
//! Playlist sources are turned into channel catalogues, channels into
//! playable media source descriptors, and stream requests into tuner slots
//! bounded by each source's tuner count.

pub mod config;
pub mod engine;
pub mod host;
pub mod logging;
pub mod media_source;
pub mod network;
pub mod playlist;
pub mod tuner;

pub use engine::{OpenedStream, StreamingEngine};
pub use host::{
    HandleState, LiveStreamHandle, M3uTunerHost, SourceCatalogue, TunerHost, TunerHostRegistry,
};
pub use media_source::{MediaSourceBuilder, DEFAULT_USER_AGENT};
pub use network::{LocalNetwork, PrivateNetwork};
pub use playlist::PlaylistFetcher;
pub use tuner::{LeaseConfig, LeaseSupervisor, TransportSelector, TunerAllocator, TunerLease};
