//! Error types for ripplefield.

use thiserror::Error;

/// Result type alias using [`RippleError`].
pub type Result<T> = std::result::Result<T, RippleError>;

/// Errors raised while sequencing frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// A frame was requested before any solver buffers were allocated.
    #[error("solver buffers are not allocated")]
    NotAllocated,

    /// The previous frame stopped part-way and was never completed.
    #[error("frame {frame} did not complete (stopped in stage {stage})")]
    FrameInProgress {
        /// Frame number that was interrupted.
        frame: u64,
        /// Stage the interrupted frame stopped in.
        stage: String,
    },
}

/// Error type for ripplefield operations.
#[derive(Error, Debug)]
pub enum RippleError {
    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration for `{parameter}`: {reason}")]
    Configuration {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// Human readable reason.
        reason: String,
    },

    /// Frame sequencing error.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// A strict cell lookup fell outside the grid.
    #[error("disturbance at ({x}, {y}) is outside the {nx}x{ny} grid")]
    DisturbanceOutOfBounds {
        /// Requested x cell.
        x: i64,
        /// Requested y cell.
        y: i64,
        /// Grid width.
        nx: u32,
        /// Grid height.
        ny: u32,
    },

    /// Frame delta time was zero, negative or not finite.
    #[error("invalid frame delta time: {0}")]
    InvalidFrameDelta(f32),

    /// The published field left the configured range.
    #[error("field diverged at frame {frame}: max |value| = {max_abs}")]
    Diverged {
        /// Frame on which divergence was detected.
        frame: u64,
        /// Largest absolute value found (may be NaN or infinite).
        max_abs: f32,
    },

    /// No suitable compute backend could be created.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Compute backend failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// Host/device transfer failure.
    #[error("transfer failed: {0}")]
    TransferFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl RippleError {
    /// Build a configuration error for `parameter`.
    pub fn config(parameter: &'static str, reason: impl Into<String>) -> Self {
        RippleError::Configuration {
            parameter,
            reason: reason.into(),
        }
    }

    /// Whether this error was raised during setup rather than while running.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RippleError::Configuration { .. }
                | RippleError::ConfigParse(_)
                | RippleError::DisturbanceOutOfBounds { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_message_names_parameter() {
        let err = RippleError::config("solver.cfl", "must be in [0, 1], got 1.5");
        let msg = err.to_string();
        assert!(msg.contains("solver.cfl"));
        assert!(msg.contains("1.5"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_state_error_conversion() {
        let err: RippleError = StateError::NotAllocated.into();
        assert!(matches!(err, RippleError::State(StateError::NotAllocated)));
        assert!(!err.is_configuration());
    }
}
