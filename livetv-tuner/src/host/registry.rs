//! Registry of tuner hosts and configured sources.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{error, info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use livetv_model::{ChannelDescriptor, TunerError, TunerInfo, TunerSourceConfig};

use crate::engine::StreamingEngine;
use crate::host::{LiveStreamHandle, TunerHost};

/// Catalogue of one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceCatalogue {
    pub source_id: String,
    pub channels: Vec<ChannelDescriptor>,
}

/// Dispatches configured sources to the host serving their type.
pub struct TunerHostRegistry {
    hosts: HashMap<String, Arc<dyn TunerHost>>,
    sources: Vec<TunerSourceConfig>,
}

impl TunerHostRegistry {
    /// Create a registry over `sources`.
    ///
    /// Every source must validate, and ids must be unique ignoring case.
    pub fn new(sources: Vec<TunerSourceConfig>) -> Result<Self, TunerError> {
        let mut seen = HashSet::new();
        for source in &sources {
            source.validate()?;
            if !seen.insert(source.id.to_ascii_lowercase()) {
                return Err(TunerError::InvalidConfig(format!(
                    "duplicate source id {}",
                    source.id
                )));
            }
        }

        Ok(Self {
            hosts: HashMap::new(),
            sources,
        })
    }

    /// Register the host for its source type, replacing any previous one.
    pub fn register_host(&mut self, host: Arc<dyn TunerHost>) {
        let source_type = host.source_type().to_ascii_lowercase();
        info!("[Registry] Registered {} for source type {}", host.name(), source_type);
        self.hosts.insert(source_type, host);
    }

    pub fn sources(&self) -> &[TunerSourceConfig] {
        &self.sources
    }

    /// Look up a source by id, ignoring case.
    pub fn source(&self, source_id: &str) -> Result<&TunerSourceConfig, TunerError> {
        self.sources
            .iter()
            .find(|s| s.id_matches(source_id))
            .ok_or_else(|| TunerError::InvalidConfig(format!("unknown source {}", source_id)))
    }

    /// Host serving the given source.
    pub fn host_for(&self, source: &TunerSourceConfig) -> Result<&Arc<dyn TunerHost>, TunerError> {
        self.hosts
            .get(&source.source_type.to_ascii_lowercase())
            .ok_or_else(|| {
                TunerError::InvalidConfig(format!(
                    "no tuner host for source type {}",
                    source.source_type
                ))
            })
    }

    /// Catalogue of one source. Errors are returned unchanged.
    pub async fn list_channels(
        &self,
        source_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChannelDescriptor>, TunerError> {
        let source = self.source(source_id)?;
        self.host_for(source)?.list_channels(source, cancel).await
    }

    /// Catalogues of every enabled source, resolved concurrently.
    ///
    /// A source that fails is logged and contributes an empty catalogue.
    pub async fn list_all_channels(&self, cancel: &CancellationToken) -> Vec<SourceCatalogue> {
        let tasks = self
            .sources
            .iter()
            .filter(|source| source.enabled)
            .map(|source| async move {
                let channels = match self.host_for(source) {
                    Ok(host) => host.list_channels(source, cancel).await,
                    Err(e) => Err(e),
                };
                let channels = channels.unwrap_or_else(|e| {
                    error!("[Registry] Failed to load channels for {}: {}", source.id, e);
                    Vec::new()
                });
                SourceCatalogue {
                    source_id: source.id.clone(),
                    channels,
                }
            });

        join_all(tasks).await
    }

    /// Summaries of every configured source with a registered host.
    pub fn tuner_infos(&self) -> Vec<TunerInfo> {
        self.sources
            .iter()
            .filter_map(|source| {
                match self.host_for(source).and_then(|host| host.describe_source(source)) {
                    Ok(info) => Some(info),
                    Err(e) => {
                        warn!("[Registry] Cannot describe source {}: {}", source.id, e);
                        None
                    }
                }
            })
            .collect()
    }

    pub async fn validate(
        &self,
        source_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TunerError> {
        let source = self.source(source_id)?;
        self.host_for(source)?.validate(source, cancel).await
    }

    /// Resolve a channel of a source by id.
    pub async fn find_channel(
        &self,
        source_id: &str,
        channel_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ChannelDescriptor, TunerError> {
        self.list_channels(source_id, cancel)
            .await?
            .into_iter()
            .find(|channel| channel.id == channel_id)
            .ok_or_else(|| TunerError::ChannelNotFound(channel_id.to_string()))
    }

    /// Claim a slot for `channel` on a source. See [`TunerHost::request_stream`].
    pub fn request_stream(
        &self,
        source_id: &str,
        channel: &ChannelDescriptor,
        stream_id: &str,
    ) -> Result<LiveStreamHandle, TunerError> {
        let source = self.source(source_id)?;
        self.host_for(source)?.request_stream(source, channel, stream_id)
    }

    /// Claim a slot and open it on `engine`.
    ///
    /// If the engine fails, the slot is already released when the error
    /// comes back.
    pub async fn start_stream(
        &self,
        source_id: &str,
        channel: &ChannelDescriptor,
        stream_id: &str,
        engine: &dyn StreamingEngine,
        cancel: &CancellationToken,
    ) -> Result<LiveStreamHandle, TunerError> {
        let mut handle = self.request_stream(source_id, channel, stream_id)?;
        handle.open(engine, cancel).await?;
        Ok(handle)
    }

    /// Run discovery on every registered host kind.
    pub async fn discover_sources(&self, timeout: Duration) -> Vec<TunerSourceConfig> {
        let tasks = self.hosts.values().map(|host| host.discover_sources(timeout));
        join_all(tasks).await.into_iter().flatten().collect()
    }
}
