//! Error types for the live TV tuner host.

use thiserror::Error;

/// Message carried by [`TunerError::Conflict`] when a source's tuner limit is hit.
pub const TUNER_LIMIT_MESSAGE: &str = "M3U simultaneous stream limit has been reached.";

/// Errors surfaced by catalogue resolution and stream allocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TunerError {
    /// The playlist could not be retrieved (network or file I/O failure).
    #[error("Failed to fetch playlist: {0}")]
    CatalogueFetch(String),

    /// The playlist was retrieved but is not a usable M3U document.
    #[error("Malformed playlist: {0}")]
    CatalogueFormat(String),

    /// No free tuner slot on the requested source.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The streaming engine failed to open the chosen transport.
    #[error("Failed to open stream: {0}")]
    Open(String),

    /// Channel id does not belong to the source or is not in its catalogue.
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// The source configuration is unusable.
    #[error("Invalid source configuration: {0}")]
    InvalidConfig(String),

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,
}

impl TunerError {
    /// Conflict error for an exhausted tuner pool.
    pub fn tuner_limit_reached() -> Self {
        TunerError::Conflict(TUNER_LIMIT_MESSAGE.to_string())
    }

    /// Returns true if this error came from retrieving or parsing a catalogue.
    pub fn is_catalogue_error(&self) -> bool {
        matches!(
            self,
            TunerError::CatalogueFetch(_) | TunerError::CatalogueFormat(_)
        )
    }

    /// Returns true if this error is a tuner-limit rejection.
    pub fn is_conflict(&self) -> bool {
        matches!(self, TunerError::Conflict(_))
    }
}
