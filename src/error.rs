// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the detector invoker.

use std::fmt;

/// Result type alias for invoker operations.
pub type Result<T> = std::result::Result<T, DetectError>;

/// Failures the invoker can report to its caller.
#[derive(Debug)]
pub enum DetectError {
    /// Missing or malformed command-line arguments.
    InvalidArgument(String),
    /// The model artifact is missing, unreadable or not a detection model.
    ModelLoadError(String),
    /// The input image could not be read or decoded.
    DecodeFailure(String),
    /// Failure while running the model or reading its output.
    InferenceError(String),
    /// Failure while persisting the annotated result image.
    SaveError(String),
    /// Wrapped `std::io::Error`.
    Io(std::io::Error),
}

impl fmt::Display for DetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::ModelLoadError(msg) => write!(f, "model load error: {msg}"),
            Self::DecodeFailure(msg) => write!(f, "decode failure: {msg}"),
            Self::InferenceError(msg) => write!(f, "inference error: {msg}"),
            Self::SaveError(msg) => write!(f, "save error: {msg}"),
            Self::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for DetectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DetectError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for DetectError {
    fn from(err: image::ImageError) -> Self {
        Self::DecodeFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DetectError::ModelLoadError("weights not found".to_string());
        assert_eq!(err.to_string(), "model load error: weights not found");

        let err = DetectError::DecodeFailure("bad header".to_string());
        assert_eq!(err.to_string(), "decode failure: bad header");
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error;

        let err = DetectError::from(std::io::Error::other("disk full"));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "io error: disk full");
    }
}
