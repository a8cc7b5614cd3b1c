//! Error types for the viewer crate.

use thiserror::Error;

/// Errors that can occur while resolving, drawing or extracting layers.
///
/// Per-slot failures ([`Load`](Self::Load) and
/// [`DimensionMismatch`](Self::DimensionMismatch)) never abort an update;
/// they are recorded on the slot and reported through
/// [`Viewer::status`](crate::Viewer::status).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewerError {
    /// A referenced image could not be fetched or decoded.
    #[error("failed to load '{uri}': {reason}")]
    Load { uri: String, reason: String },

    /// A raw pixel buffer does not hold `width * height * 4` bytes.
    #[error("pixel buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA8")]
    DimensionMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// An update supplied a different number of overlays than the viewer
    /// was created with.
    #[error("expected {expected} overlay layers, got {actual}")]
    LayerCountMismatch { expected: usize, actual: usize },

    /// A slot index past the end of the layer stack.
    #[error("slot {index} out of range (stack has {len} slots)")]
    SlotOutOfRange { index: usize, len: usize },

    /// An extraction rect whose RGBA8 buffer cannot be allocated.
    #[error("extraction rect {width}x{height} is too large")]
    InvalidRect { width: u32, height: u32 },

    /// A deferred painter panicked on a loader worker.
    #[error("deferred painter panicked: {0}")]
    PainterPanicked(String),

    /// The background loader refused a job because its queue is full.
    #[error("too many pending loads (max {0})")]
    TooManyPending(usize),

    /// The background loader's workers are gone.
    #[error("loader workers have shut down")]
    LoaderShutdown,

    /// A background worker thread could not be started.
    #[error("failed to spawn loader worker: {0}")]
    WorkerSpawn(String),
}

/// Result type for viewer operations.
pub type ViewerResult<T> = Result<T, ViewerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ViewerError::DimensionMismatch {
            width: 2,
            height: 2,
            expected: 16,
            actual: 15,
        };
        assert_eq!(
            err.to_string(),
            "pixel buffer holds 15 bytes, expected 16 for 2x2 RGBA8"
        );

        let err = ViewerError::Load {
            uri: "missing.png".into(),
            reason: "not found".into(),
        };
        assert_eq!(err.to_string(), "failed to load 'missing.png': not found");

        let err = ViewerError::InvalidRect {
            width: 1 << 31,
            height: 3,
        };
        assert_eq!(err.to_string(), "extraction rect 2147483648x3 is too large");
    }
}
