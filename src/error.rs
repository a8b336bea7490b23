//! Error types for the grid renderer

use thiserror::Error;

/// Result type alias for renderer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering a grid
#[derive(Error, Debug)]
pub enum Error {
    /// The request grid is malformed (client fault, not retryable)
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// An image URL could not be resolved (transient; never cached)
    #[error("failed to fetch asset {url}: {source}")]
    AssetFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The shared rendering engine failed to launch
    #[error("rendering surface failed to start: {0}")]
    SurfaceStart(String),

    /// Document load or screenshot capture failed after a context was acquired
    #[error("capture failed: {0}")]
    Capture(String),
}

impl Error {
    /// Whether the caller is at fault (maps to a 4xx at the HTTP boundary).
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Error::InvalidGrid(_))
    }
}

// The CDP backend surfaces `anyhow` errors; anything it reports once a
// context exists is a capture failure. Surface launch maps its own errors
// before this conversion can apply.
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Capture(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_grid_is_client_fault() {
        assert!(Error::InvalidGrid("empty".into()).is_client_fault());
        assert!(!Error::SurfaceStart("no chrome".into()).is_client_fault());
        assert!(!Error::Capture("boom".into()).is_client_fault());
    }
}
