//! Error handling for the ritual engine
//!
//! Degraded conditions (no audio device, recorder failures, out-of-range
//! pointers, library capacity) are logged and absorbed; only the failures
//! below ever reach a caller.

use thiserror::Error;

/// Result type alias for ritual engine operations
pub type Result<T> = std::result::Result<T, RitualError>;

/// Main error type for ritual engine operations
#[derive(Error, Debug)]
pub enum RitualError {
    // Audio Errors
    #[error("Failed to decode audio: {reason}")]
    Decode {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Audio contains no samples")]
    EmptyAudio,

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio output unavailable: {reason}")]
    AudioUnavailable { reason: String },

    #[error("Recording unavailable: {reason}")]
    RecordingUnavailable { reason: String },

    // Session Errors
    #[error("Invalid session state: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: String,
    },

    // Library Errors
    #[error("Sound print not found: {id}")]
    PrintNotFound { id: String },

    #[error("Sound print {id} is not in the {collection} collection")]
    NotInCollection { id: String, collection: String },

    #[error("Integrity check failed for {key}: checksum mismatch")]
    Integrity { key: String },

    #[error("Storage error for key '{key}': {source}")]
    Storage {
        key: String,
        #[source]
        source: std::io::Error,
    },

    // Capture Errors
    #[error("Image encoding failed: {reason}")]
    ImageEncode { reason: String },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RitualError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            RitualError::Decode { .. } => "DECODE_FAILED",
            RitualError::EmptyAudio => "EMPTY_AUDIO",
            RitualError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            RitualError::AudioUnavailable { .. } => "AUDIO_UNAVAILABLE",
            RitualError::RecordingUnavailable { .. } => "RECORDING_UNAVAILABLE",
            RitualError::InvalidState { .. } => "INVALID_STATE",
            RitualError::PrintNotFound { .. } => "PRINT_NOT_FOUND",
            RitualError::NotInCollection { .. } => "NOT_IN_COLLECTION",
            RitualError::Integrity { .. } => "INTEGRITY",
            RitualError::Storage { .. } => "STORAGE",
            RitualError::ImageEncode { .. } => "IMAGE_ENCODE",
            RitualError::Config { .. } => "CONFIG",
            RitualError::Io(_) => "IO_ERROR",
            RitualError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the caller can retry or pick another input
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RitualError::Decode { .. }
                | RitualError::EmptyAudio
                | RitualError::UnsupportedFormat { .. }
                | RitualError::AudioUnavailable { .. }
                | RitualError::RecordingUnavailable { .. }
                | RitualError::InvalidState { .. }
                | RitualError::PrintNotFound { .. }
                | RitualError::NotInCollection { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RitualError::Decode { .. } => vec![
                "Try converting the clip to WAV first",
                "Check that the file plays in another application",
            ],
            RitualError::EmptyAudio => vec!["Choose a clip that contains audio"],
            RitualError::UnsupportedFormat { .. } => vec![
                "Use a mono or stereo WAV file",
                "Supported sample formats: 8/16/24/32-bit integer, 32-bit float",
            ],
            RitualError::InvalidState { .. } => {
                vec!["Wait for the current ritual to complete, or reset the session"]
            }
            RitualError::PrintNotFound { .. } | RitualError::NotInCollection { .. } => {
                vec!["List the library to find the print's current collection"]
            }
            RitualError::Integrity { .. } => vec![
                "The stored artifact was modified or truncated",
                "Delete the print and record a new ritual",
            ],
            RitualError::Storage { .. } => vec![
                "Check that the library directory is writable",
                "Free up disk space",
            ],
            RitualError::Config { .. } => vec!["Run 'ritual-cli config' to write a default file"],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = RitualError::PrintNotFound {
            id: "abc".to_string(),
        };
        assert_eq!(err.error_code(), "PRINT_NOT_FOUND");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = RitualError::Decode {
            reason: "bad header".to_string(),
            source: None,
        };
        assert!(!err.recovery_suggestions().is_empty());
        assert!(err.to_string().contains("bad header"));
    }

    #[test]
    fn test_integrity_not_recoverable() {
        let err = RitualError::Integrity {
            key: "blob/x/audio".to_string(),
        };
        assert!(!err.is_recoverable());
    }
}
