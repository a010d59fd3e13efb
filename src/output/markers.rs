//! Status markers printed by the inference binary

use serde::Deserialize;

use crate::error::{Result, SessionError};

/// Marker printed when the binary starts ingesting a prompt
pub const DEFAULT_LOADING_MARKER: &str = "Reading prompt";

/// Marker printed when the binary waits for the next input line
pub const DEFAULT_READY_MARKER: &str = ">";

/// Marker printed repeatedly while a prompt is being ingested
pub const DEFAULT_PROGRESS_MARKER: &str = "..";

/// Kind of a status marker, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// Prompt ingestion started
    Loading,
    /// Waiting for input
    Ready,
    /// Ingestion progress
    Progress,
}

impl MarkerKind {
    /// All kinds, highest precedence first
    pub const PRECEDENCE: [Self; 3] = [Self::Loading, Self::Ready, Self::Progress];
}

/// The set of markers used to classify output
///
/// The default ready marker `>` matches anywhere in the stream, so a
/// response containing `a > b` ends its exchange at the `>`. When the binary
/// prints its prompt at the start of a line, use `"\n> "` instead:
///
/// ```
/// use gemma_session::Markers;
///
/// let markers = Markers {
///     ready: "\n> ".to_string(),
///     ..Markers::default()
/// };
/// assert!(markers.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Markers {
    /// Prompt ingestion marker
    pub loading: String,
    /// Ready-for-input marker
    pub ready: String,
    /// Progress marker, only recognized while a prompt is loading
    pub progress: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            loading: DEFAULT_LOADING_MARKER.to_string(),
            ready: DEFAULT_READY_MARKER.to_string(),
            progress: DEFAULT_PROGRESS_MARKER.to_string(),
        }
    }
}

impl Markers {
    /// Text of the marker of the given kind
    #[must_use]
    pub fn get(&self, kind: MarkerKind) -> &str {
        match kind {
            MarkerKind::Loading => &self.loading,
            MarkerKind::Ready => &self.ready,
            MarkerKind::Progress => &self.progress,
        }
    }

    /// Length in bytes of the longest marker
    #[must_use]
    pub fn longest(&self) -> usize {
        MarkerKind::PRECEDENCE
            .iter()
            .map(|k| self.get(*k).len())
            .max()
            .unwrap_or(0)
    }

    /// Check that every marker is non-empty and distinct
    ///
    /// # Errors
    /// Returns `InvalidConfig` naming the offending marker
    pub fn validate(&self) -> Result<()> {
        for kind in MarkerKind::PRECEDENCE {
            if self.get(kind).is_empty() {
                return Err(SessionError::invalid_config(format!(
                    "{kind:?} marker must not be empty"
                )));
            }
        }
        if self.loading == self.ready || self.loading == self.progress || self.ready == self.progress
        {
            return Err(SessionError::invalid_config("markers must be distinct"));
        }
        Ok(())
    }
}
