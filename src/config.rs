use serde::Deserialize;

use crate::error::{RelayError, Result};

/// Top-level configuration, assembled from an optional TOML file plus
/// `STT__`-prefixed environment overrides (e.g. `STT__SERVER__PORT=9000`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub recording: RecordingConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// STT server host
    pub host: String,
    /// STT server port
    pub port: u16,
    /// Model identifier sent in the session hello
    pub model: String,
    /// ISO 639 language code (2-5 alphabetic characters)
    pub language: String,
    /// How long to keep retrying the initial connection
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            model: "mlx-community/whisper-large-v3-turbo".to_string(),
            language: "en".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

impl ServerConfig {
    /// WebSocket endpoint for the realtime transcription stream.
    pub fn websocket_url(&self) -> String {
        format!(
            "ws://{}:{}/v1/audio/transcriptions/realtime",
            self.host, self.port
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture sample rate in Hz (8000-48000)
    pub sample_rate: u32,
    /// Capture channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Samples per transmitted frame (power of two, 256-8192)
    pub chunk_size: usize,
    /// Input device name; None selects the host default
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // Whisper expects 16kHz
            channels: 1,        // Mono
            chunk_size: 1024,
            device: None,
        }
    }
}

/// VAD tuning forwarded to the server. Values are validated here but never
/// interpreted locally; the engine owns endpointing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    pub enabled: bool,
    /// webrtcvad-style aggressiveness (0 = permissive, 3 = aggressive)
    pub aggressiveness: u8,
    /// Analysis frame length in ms (10, 20 or 30)
    pub frame_duration_ms: u32,
    /// Trailing silence that closes an utterance (100-5000 ms)
    pub silence_limit_ms: u32,
    /// Audio retained from before speech onset (0-2000 ms)
    pub pre_speech_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            aggressiveness: 3,
            frame_duration_ms: 30,
            silence_limit_ms: 1000,
            pre_speech_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Directory that receives per-session subdirectories
    pub output_dir: String,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: "recordings".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Spawn the STT engine as a subprocess before connecting
    pub autostart: bool,
    /// Engine executable
    pub command: String,
    /// Extra arguments appended after --host/--port
    pub args: Vec<String>,
    /// How long to wait after SIGTERM before killing the engine
    pub shutdown_grace_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            autostart: false,
            command: "mlx_audio.server".to_string(),
            args: Vec::new(),
            shutdown_grace_secs: 5,
        }
    }
}

impl Config {
    /// Load configuration, layering sources in increasing precedence:
    /// built-in defaults, the TOML file (if any), then environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(path) => builder.add_source(config::File::with_name(path)),
            None => builder.add_source(config::File::with_name("stt-relay").required(false)),
        };

        let settings = builder
            .add_source(config::Environment::with_prefix("STT").separator("__"))
            .build()
            .map_err(|e| RelayError::ConfigParse {
                message: e.to_string(),
            })?;

        settings
            .try_deserialize()
            .map_err(|e| RelayError::ConfigParse {
                message: e.to_string(),
            })
    }

    /// Validate every tunable before a session is created, normalizing the
    /// language code in place. Also ensures the output directory exists so
    /// artifact flushes cannot fail on a missing parent.
    pub fn validate(&mut self) -> Result<()> {
        if self.server.model.trim().is_empty() {
            return Err(invalid("server.model", "must not be empty"));
        }

        self.server.language = normalize_language(&self.server.language)?;

        if self.server.connect_timeout_secs == 0 {
            return Err(invalid("server.connect_timeout_secs", "must be at least 1"));
        }

        if !(8000..=48000).contains(&self.audio.sample_rate) {
            return Err(invalid("audio.sample_rate", "must be 8000-48000 Hz"));
        }
        if !(1..=2).contains(&self.audio.channels) {
            return Err(invalid("audio.channels", "must be 1 (mono) or 2 (stereo)"));
        }
        if !(256..=8192).contains(&self.audio.chunk_size) {
            return Err(invalid("audio.chunk_size", "must be 256-8192 samples"));
        }
        if !self.audio.chunk_size.is_power_of_two() {
            return Err(invalid("audio.chunk_size", "must be a power of two"));
        }

        if self.vad.aggressiveness > 3 {
            return Err(invalid("vad.aggressiveness", "must be 0-3"));
        }
        if ![10, 20, 30].contains(&self.vad.frame_duration_ms) {
            return Err(invalid("vad.frame_duration_ms", "must be 10, 20 or 30"));
        }
        if !(100..=5000).contains(&self.vad.silence_limit_ms) {
            return Err(invalid("vad.silence_limit_ms", "must be 100-5000 ms"));
        }
        if self.vad.pre_speech_ms > 2000 {
            return Err(invalid("vad.pre_speech_ms", "must be 0-2000 ms"));
        }

        std::fs::create_dir_all(&self.recording.output_dir).map_err(|e| {
            invalid(
                "recording.output_dir",
                &format!("cannot create {}: {}", self.recording.output_dir, e),
            )
        })?;

        if self.engine.autostart && self.engine.command.trim().is_empty() {
            return Err(invalid("engine.command", "must not be empty when autostart is set"));
        }

        Ok(())
    }
}

/// Trim and lowercase a language code, then require 2-5 ASCII letters.
/// `"EN "` becomes `"en"`; `"12"` is rejected.
pub fn normalize_language(raw: &str) -> Result<String> {
    let code = raw.trim().to_ascii_lowercase();
    if !(2..=5).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid(
            "server.language",
            "must be 2-5 alphabetic characters (e.g. \"en\")",
        ));
    }
    Ok(code)
}

fn invalid(key: &str, message: &str) -> RelayError {
    RelayError::InvalidConfig {
        key: key.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.recording.output_dir = dir.path().join("recordings").display().to_string();
        config.validate().expect("default configuration should validate");
    }

    #[test]
    fn language_is_normalized_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.recording.output_dir = dir.path().display().to_string();
        config.server.language = "EN ".to_string();
        config.validate().unwrap();
        assert_eq!(config.server.language, "en");
    }

    #[test]
    fn numeric_language_is_rejected() {
        let err = normalize_language("12").unwrap_err();
        assert!(err.to_string().contains("server.language"));
    }

    #[test]
    fn chunk_size_must_be_power_of_two() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.recording.output_dir = dir.path().display().to_string();
        config.audio.chunk_size = 1000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("power of two"));
    }

    #[test]
    fn websocket_url_includes_realtime_path() {
        let server = ServerConfig::default();
        assert_eq!(
            server.websocket_url(),
            "ws://127.0.0.1:8000/v1/audio/transcriptions/realtime"
        );
    }
}
