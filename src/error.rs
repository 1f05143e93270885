//! Error types for stt-relay.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    // Configuration errors
    #[error("Failed to load configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    // Audio capture errors
    #[error("Audio input device unavailable: {device}")]
    DeviceUnavailable { device: String },

    #[error("Audio capture failed: {message}")]
    Capture { message: String },

    // Transport errors
    #[error("Failed to connect to {url} within {timeout_secs}s: {message}")]
    ConnectFailed {
        url: String,
        timeout_secs: u64,
        message: String,
    },

    #[error("WebSocket send failed: {0}")]
    TransportSend(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("WebSocket receive failed: {0}")]
    TransportRecv(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("Transport closed by peer")]
    TransportClosed,

    // Protocol errors
    #[error("Unrecognized server message: {detail}")]
    MalformedMessage { detail: String },

    #[error("Failed to encode client message: {0}")]
    Encode(#[from] serde_json::Error),

    // Artifact errors
    #[error("Failed to write session artifact {path}: {message}")]
    ArtifactWrite { path: PathBuf, message: String },

    // Engine subprocess errors
    #[error("Engine process error: {message}")]
    Engine { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Whether this error still allows a clean artifact flush.
    ///
    /// Malformed messages are dropped and never tear down the session;
    /// everything else ends the streaming phase.
    pub fn is_session_fatal(&self) -> bool {
        !matches!(self, RelayError::MalformedMessage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_device_unavailable_display() {
        let error = RelayError::DeviceUnavailable {
            device: "default".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Audio input device unavailable: default"
        );
    }

    #[test]
    fn test_connect_failed_display() {
        let error = RelayError::ConnectFailed {
            url: "ws://127.0.0.1:8000/v1/audio/transcriptions/realtime".to_string(),
            timeout_secs: 5,
            message: "connection refused".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to connect to ws://127.0.0.1:8000/v1/audio/transcriptions/realtime \
             within 5s: connection refused"
        );
    }

    #[test]
    fn test_invalid_config_display() {
        let error = RelayError::InvalidConfig {
            key: "audio.chunk_size".to_string(),
            message: "must be a power of two".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for audio.chunk_size: must be a power of two"
        );
    }

    #[test]
    fn test_malformed_message_display() {
        let error = RelayError::MalformedMessage {
            detail: "unknown field `foo`".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Unrecognized server message: unknown field `foo`"
        );
    }

    #[test]
    fn test_artifact_write_display() {
        let error = RelayError::ArtifactWrite {
            path: PathBuf::from("/tmp/session/session.wav"),
            message: "disk full".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to write session artifact /tmp/session/session.wav: disk full"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: RelayError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_malformed_is_not_session_fatal() {
        let error = RelayError::MalformedMessage {
            detail: "bad payload".to_string(),
        };
        assert!(!error.is_session_fatal());
        assert!(RelayError::TransportClosed.is_session_fatal());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RelayError>();
        assert_sync::<RelayError>();
    }
}
