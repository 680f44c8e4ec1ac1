//! Media source descriptors handed to the streaming engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Transport protocol of a playback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaProtocol {
    Http,
    File,
    Rtsp,
    Rtmp,
    Rtp,
    Udp,
    Ftp,
    Other,
}

impl MediaProtocol {
    /// Detect the protocol from the scheme prefix of a path.
    ///
    /// Paths without a scheme, and `file://` URLs, are local files.
    pub fn from_path(path: &str) -> Self {
        let path = path.trim();
        let Some((scheme, _)) = path.split_once("://") else {
            return MediaProtocol::File;
        };

        match scheme.to_ascii_lowercase().as_str() {
            "http" | "https" => MediaProtocol::Http,
            "rtsp" | "rtsps" => MediaProtocol::Rtsp,
            "rtmp" | "rtmps" => MediaProtocol::Rtmp,
            "rtp" => MediaProtocol::Rtp,
            "udp" => MediaProtocol::Udp,
            "ftp" | "ftps" => MediaProtocol::Ftp,
            "file" => MediaProtocol::File,
            _ => MediaProtocol::Other,
        }
    }
}

/// Index of a media stream inside its container.
///
/// Live playlist entries are never inspected, so placeholders use `Unknown`,
/// which never compares equal to a real index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamIndex {
    Unknown,
    Known(u32),
}

impl StreamIndex {
    pub fn is_known(self) -> bool {
        matches!(self, StreamIndex::Known(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaStreamKind {
    Video,
    Audio,
}

/// One elementary stream of a media source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStreamInfo {
    pub kind: MediaStreamKind,
    pub index: StreamIndex,
    pub is_interlaced: bool,
    /// Bitrate hint in bits per second.
    pub bit_rate: Option<u32>,
}

impl MediaStreamInfo {
    /// Video placeholder for a stream nobody has inspected.
    pub fn video_placeholder() -> Self {
        Self {
            kind: MediaStreamKind::Video,
            index: StreamIndex::Unknown,
            is_interlaced: true,
            bit_rate: None,
        }
    }

    /// Audio placeholder for a stream nobody has inspected.
    pub fn audio_placeholder() -> Self {
        Self {
            kind: MediaStreamKind::Audio,
            index: StreamIndex::Unknown,
            is_interlaced: false,
            bit_rate: None,
        }
    }
}

/// A resolvable playback target for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSourceDescriptor {
    /// Hash of the playback path.
    pub id: String,
    pub path: String,
    pub protocol: MediaProtocol,
    pub required_http_headers: BTreeMap<String, String>,
    pub media_streams: Vec<MediaStreamInfo>,
    pub requires_opening: bool,
    pub requires_closing: bool,
    pub requires_looping: bool,
    pub is_infinite_stream: bool,
    pub is_remote: bool,
    pub ignore_dts: bool,
    pub read_at_native_framerate: bool,
    pub supports_direct_play: bool,
    pub supports_direct_stream: bool,
    /// Aggregate bitrate in bits per second, when any stream carries a hint.
    pub bitrate: Option<u64>,
    pub fallback_max_streaming_bitrate: Option<u32>,
}

impl MediaSourceDescriptor {
    /// Fill `bitrate` from the per-stream hints if it is not already set.
    ///
    /// Leaves it unset when no stream carries a hint.
    pub fn infer_total_bitrate(&mut self) {
        if self.bitrate.is_some() {
            return;
        }

        let mut total: Option<u64> = None;
        for rate in self.media_streams.iter().filter_map(|s| s.bit_rate) {
            *total.get_or_insert(0) += u64::from(rate);
        }
        self.bitrate = total;
    }
}

/// How the bytes of a live stream reach consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Upstream HTTP bytes shared directly between consumers.
    SharedPassthrough,
    /// Engine-managed buffer that can loop or re-demux per consumer.
    BufferedLoop,
}
