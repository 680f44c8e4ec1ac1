//! Local network classification for playback hosts.

use std::collections::HashSet;
use std::net::IpAddr;

/// Decides whether a host is on the network local to this installation.
pub trait LocalNetwork: Send + Sync {
    fn is_local_host(&self, host: &str) -> bool;
}

/// Treats loopback, private and link-local addresses as local, plus
/// `localhost` and any configured host names.
#[derive(Debug, Clone, Default)]
pub struct PrivateNetwork {
    local_hosts: HashSet<String>,
}

impl PrivateNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add host names that should count as local (matched case-insensitively).
    pub fn with_local_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.local_hosts.extend(
            hosts
                .into_iter()
                .map(|h| h.as_ref().trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty()),
        );
        self
    }
}

impl LocalNetwork for PrivateNetwork {
    fn is_local_host(&self, host: &str) -> bool {
        let host = host.trim().trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return false;
        }

        match host.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => ip.is_loopback() || ip.is_private() || ip.is_link_local(),
            Ok(IpAddr::V6(ip)) => {
                let first = ip.segments()[0];
                ip.is_loopback()
                    || (first & 0xfe00) == 0xfc00
                    || (first & 0xffc0) == 0xfe80
                    || ip
                        .to_ipv4_mapped()
                        .is_some_and(|v4| v4.is_loopback() || v4.is_private())
            }
            Err(_) => {
                let host = host.to_ascii_lowercase();
                host == "localhost"
                    || host.ends_with(".localhost")
                    || self.local_hosts.contains(&host)
            }
        }
    }
}
