//! Live stream handles returned by stream requests.

use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use livetv_model::{MediaSourceDescriptor, TransportKind, TunerError};

use crate::engine::{OpenedStream, StreamingEngine};
use crate::tuner::TunerLease;

/// Lifecycle of a handle. `Released` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleState {
    /// Tuner slot held, engine not opened yet.
    Granted,
    /// Engine confirmed the stream.
    Active,
    Released,
}

/// One granted stream on a tuner source.
///
/// Holds the tuner slot until [`close`](Self::close) or
/// [`release`](Self::release) is called, or the handle is dropped.
#[derive(Debug)]
pub struct LiveStreamHandle {
    lease: Arc<TunerLease>,
    channel_id: String,
    media_source: MediaSourceDescriptor,
    transport: TransportKind,
    state: HandleState,
    opened: Option<OpenedStream>,
}

impl LiveStreamHandle {
    pub(crate) fn new(
        lease: TunerLease,
        channel_id: String,
        media_source: MediaSourceDescriptor,
        transport: TransportKind,
    ) -> Self {
        Self {
            lease: Arc::new(lease),
            channel_id,
            media_source,
            transport,
            state: HandleState::Granted,
            opened: None,
        }
    }

    pub fn source_id(&self) -> &str {
        self.lease.source_id()
    }

    pub fn stream_id(&self) -> &str {
        self.lease.stream_id()
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn media_source(&self) -> &MediaSourceDescriptor {
        &self.media_source
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn state(&self) -> HandleState {
        if self.state != HandleState::Released && self.lease.is_released() {
            return HandleState::Released;
        }
        self.state
    }

    /// The engine stream, once opened.
    pub fn opened(&self) -> Option<&OpenedStream> {
        self.opened.as_ref()
    }

    /// Shared handle to the slot, for releasing from a reader task that
    /// detects the consumer disconnect.
    pub fn lease(&self) -> Arc<TunerLease> {
        Arc::clone(&self.lease)
    }

    /// Cancelled when the stream idled out. The owner should then
    /// [`close`](Self::close) it; an opened stream holds its slot until then.
    pub fn expired(&self) -> CancellationToken {
        self.lease.expired()
    }

    /// Heartbeat from the consumer. Returns false once the slot is gone.
    pub fn touch(&self) -> bool {
        self.lease.touch()
    }

    /// Ask the engine to open the stream.
    ///
    /// On failure the tuner slot is released before the error is returned,
    /// so a failed open never keeps a slot occupied.
    pub async fn open(
        &mut self,
        engine: &dyn StreamingEngine,
        cancel: &CancellationToken,
    ) -> Result<&OpenedStream, TunerError> {
        if self.state() != HandleState::Granted {
            return Err(TunerError::Open(format!(
                "stream {} is {:?}, not awaiting open",
                self.stream_id(),
                self.state()
            )));
        }

        match engine.open(&self.media_source, self.transport, cancel).await {
            Ok(opened) => {
                self.lease.activate();
                self.state = HandleState::Active;
                info!(
                    "[LiveStream] Stream {} on source {} opened as {:?}",
                    self.stream_id(),
                    self.source_id(),
                    self.transport
                );
                Ok(&*self.opened.insert(opened))
            }
            Err(e) => {
                warn!(
                    "[LiveStream] Failed to open stream {} on source {}: {}",
                    self.stream_id(),
                    self.source_id(),
                    e
                );
                self.release();
                Err(e)
            }
        }
    }

    /// Close the engine stream (if opened) and free the tuner slot.
    ///
    /// Calling it again is a no-op.
    pub async fn close(&mut self, engine: &dyn StreamingEngine) -> Result<(), TunerError> {
        let result = match self.opened.take() {
            Some(opened) => engine.close(&opened).await,
            None => Ok(()),
        };
        self.release();
        result
    }

    /// Free the tuner slot without involving the engine.
    pub fn release(&mut self) -> bool {
        self.state = HandleState::Released;
        self.lease.release()
    }
}
