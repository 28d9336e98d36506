use std::time::Duration;

/// Convenience result type used across the engine.
pub type EngineResult<T> = Result<T, SynthesisError>;

/// Typed failure taxonomy surfaced to the caller of a synthesis run.
///
/// Every sub-component failure maps to exactly one variant; nothing is retried internally.
#[derive(thiserror::Error, Debug)]
pub enum SynthesisError {
    /// No image was supplied, or the image/configuration is unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The runtime offers no viable encoder for the requested clip format.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The encoder produced no data (duration too short, or capture stopped before the first
    /// chunk arrived).
    #[error("empty output: the encoder produced no data")]
    EmptyOutput,

    /// Capture was stopped but the encoder never delivered its final data.
    #[error("finalize timeout: no final data within {}ms", .0.as_millis())]
    FinalizeTimeout(Duration),

    /// Caller-initiated abort.
    #[error("cancelled")]
    Cancelled,

    /// The encoder session failed mid-run (process exit, broken pipe, codec error).
    #[error("encoder error: {0}")]
    Encoder(String),
}

/// Discriminant of [`SynthesisError`], convenient for matching and UI messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`SynthesisError::InvalidInput`].
    InvalidInput,
    /// See [`SynthesisError::UnsupportedFormat`].
    UnsupportedFormat,
    /// See [`SynthesisError::EmptyOutput`].
    EmptyOutput,
    /// See [`SynthesisError::FinalizeTimeout`].
    FinalizeTimeout,
    /// See [`SynthesisError::Cancelled`].
    Cancelled,
    /// See [`SynthesisError::Encoder`].
    Encoder,
}

impl ErrorKind {
    /// `false` only for [`ErrorKind::Cancelled`]: a cancelled run is not a failure.
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Short message suitable for showing next to a "try again" control.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::InvalidInput => "No usable image to animate.",
            Self::UnsupportedFormat => "Video encoding is not available on this device.",
            Self::EmptyOutput => "The video came out empty.",
            Self::FinalizeTimeout => "The video encoder stopped responding.",
            Self::Cancelled => "Video generation was cancelled.",
            Self::Encoder => "The video encoder failed.",
        }
    }
}

impl SynthesisError {
    /// Build a [`SynthesisError::InvalidInput`] value.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Build a [`SynthesisError::UnsupportedFormat`] value.
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Build a [`SynthesisError::Encoder`] value.
    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder(msg.into())
    }

    /// Taxonomy member of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::EmptyOutput => ErrorKind::EmptyOutput,
            Self::FinalizeTimeout(_) => ErrorKind::FinalizeTimeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Encoder(_) => ErrorKind::Encoder,
        }
    }

    /// `true` for a caller-initiated abort.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
