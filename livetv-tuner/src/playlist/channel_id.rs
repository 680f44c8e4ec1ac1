//! Stable identifiers for playlist sources and channels.

use md5::{Digest, Md5};

/// Prefix shared by every channel id produced from an M3U source.
pub const M3U_CHANNEL_ID_PREFIX: &str = "m3u_";

/// Lowercase hex MD5 of a string.
pub fn stable_hash(value: &str) -> String {
    format!("{:x}", Md5::digest(value.as_bytes()))
}

/// Channel id prefix for a source, derived from its playlist URL.
///
/// Distinct URLs give distinct prefixes, so channels with the same path on
/// two sources never collide.
pub fn source_prefix(source_url: &str) -> String {
    format!("{}{}_", M3U_CHANNEL_ID_PREFIX, stable_hash(source_url))
}

/// Channel id for a playback path under the given prefix.
pub fn channel_id(prefix: &str, path: &str) -> String {
    format!("{}{}", prefix, stable_hash(path))
}
