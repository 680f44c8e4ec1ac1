//! Boundary to the external streaming engine that moves the bytes.

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use livetv_model::{MediaSourceDescriptor, TransportKind, TunerError};

/// A stream the engine has opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenedStream {
    /// Engine-side identifier of the stream.
    pub engine_stream_id: String,
    pub transport: TransportKind,
}

/// The proxying/looping engine behind a granted tuner slot.
///
/// Implementations report open failures as [`TunerError::Open`].
#[async_trait]
pub trait StreamingEngine: Send + Sync {
    /// Open `media_source` with the chosen transport.
    async fn open(
        &self,
        media_source: &MediaSourceDescriptor,
        transport: TransportKind,
        cancel: &CancellationToken,
    ) -> Result<OpenedStream, TunerError>;

    /// Close a stream previously returned by [`open`](Self::open).
    async fn close(&self, stream: &OpenedStream) -> Result<(), TunerError>;
}
