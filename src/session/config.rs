use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::ClientConfig;

/// Configuration for a streaming session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket endpoint of the realtime transcription stream
    pub websocket_url: String,

    /// How long to keep retrying the initial connection
    pub connect_timeout: Duration,

    /// Directory receiving this session's artifacts
    pub session_dir: PathBuf,

    /// Hello frame sent once, immediately after the socket opens
    pub hello: ClientConfig,
}

impl SessionConfig {
    /// Audio artifact location within the session directory.
    pub fn recording_path(&self) -> PathBuf {
        self.session_dir.join("session.wav")
    }

    /// Transcript artifact location within the session directory.
    pub fn transcript_path(&self) -> PathBuf {
        self.session_dir.join("transcript.txt")
    }
}
