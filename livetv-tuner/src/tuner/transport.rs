//! Transport selection for granted streams.
//!
//! Sharing one upstream byte stream between consumers is only safe when
//! the container can be joined at any byte offset (MPEG-TS and friends).
//! Containers with their own index or manifest need the buffered engine.

use url::Url;

use livetv_model::{MediaProtocol, MediaSourceDescriptor, TransportKind, TunerSourceConfig};

/// Extensions that never use shared passthrough.
pub const DISALLOWED_SHARED_EXTENSIONS: [&str; 4] = [".mkv", ".mp4", ".m3u8", ".mpd"];

/// Chooses between shared passthrough and the buffered/looping engine.
#[derive(Debug, Clone)]
pub struct TransportSelector {
    disallowed_extensions: Vec<String>,
}

impl Default for TransportSelector {
    fn default() -> Self {
        Self {
            disallowed_extensions: DISALLOWED_SHARED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl TransportSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selector with its own list of extensions that never share.
    ///
    /// Extensions are matched with their leading dot, ignoring case.
    pub fn with_disallowed_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            disallowed_extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    /// Shared passthrough iff HTTP, no looping, and an allowed extension.
    pub fn choose(&self, media_source: &MediaSourceDescriptor) -> TransportKind {
        if media_source.protocol != MediaProtocol::Http || media_source.requires_looping {
            return TransportKind::BufferedLoop;
        }

        match path_extension(&media_source.path) {
            Some(ext) if self.is_disallowed(&ext) => TransportKind::BufferedLoop,
            _ => TransportKind::SharedPassthrough,
        }
    }

    /// [`choose`](Self::choose), honouring the source's sharing switch.
    pub fn choose_for_source(
        &self,
        source: &TunerSourceConfig,
        media_source: &MediaSourceDescriptor,
    ) -> TransportKind {
        if !source.allow_stream_sharing {
            return TransportKind::BufferedLoop;
        }
        self.choose(media_source)
    }

    fn is_disallowed(&self, ext: &str) -> bool {
        self.disallowed_extensions
            .iter()
            .any(|d| d.eq_ignore_ascii_case(ext))
    }
}

/// Lowercased extension (with dot) of the last path segment, ignoring the
/// query string and fragment.
fn path_extension(path: &str) -> Option<String> {
    let url_path = match Url::parse(path) {
        Ok(url) => url.path().to_string(),
        Err(_) => path.split(['?', '#']).next().unwrap_or(path).to_string(),
    };

    let file = url_path.rsplit('/').next()?;
    let dot = file.rfind('.')?;
    let ext = &file[dot..];
    (ext.len() > 1).then(|| ext.to_ascii_lowercase())
}
