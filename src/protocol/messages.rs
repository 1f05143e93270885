use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{normalize_language, VadConfig};
use crate::error::{RelayError, Result};

/// Session hello sent once, immediately after the WebSocket opens.
///
/// The server rejects the session if any field is out of range, so the
/// constructor enforces the same contract locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub model: String,
    pub language: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub vad_enabled: bool,
    pub vad_aggressiveness: u8,
}

impl ClientConfig {
    pub fn new(
        model: &str,
        language: &str,
        sample_rate: u32,
        channels: u16,
        vad: &VadConfig,
    ) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(RelayError::InvalidConfig {
                key: "server.model".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            model: model.to_string(),
            language: normalize_language(language)?,
            sample_rate,
            channels,
            vad_enabled: vad.enabled,
            vad_aggressiveness: vad.aggressiveness,
        })
    }
}

/// Classified inbound traffic. See [`crate::protocol::classify`].
#[derive(Debug, Clone)]
pub enum ServerMessage {
    Transcription(Transcription),
    Status(StatusUpdate),
}

/// Transcription result pushed by the server when VAD closes an utterance
/// (or periodically, for partial results).
///
/// `deny_unknown_fields` keeps this schema disjoint from [`StatusUpdate`]
/// so classification is unambiguous.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transcription {
    /// Transcribed text; empty means "no content, suppress"
    #[serde(default)]
    pub text: String,
    /// Per-segment timing, when the model provides it
    #[serde(default)]
    pub segments: Option<Vec<TranscriptionSegment>>,
    /// Partial (interim) result, subject to revision
    #[serde(default = "default_true")]
    pub is_partial: bool,
    /// Detected language code
    #[serde(default)]
    pub language: Option<String>,
    /// Overall confidence, 0.0-1.0
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// One timed span within a transcription. Fields are individually
/// defaulted; servers vary in how much timing detail they attach.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionSegment {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    #[serde(default)]
    pub text: String,
}

impl Transcription {
    pub fn is_final(&self) -> bool {
        !self.is_partial
    }

    /// Range checks that structural deserialization cannot express.
    pub fn validate(&self) -> Result<()> {
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(RelayError::MalformedMessage {
                    detail: format!("confidence {} outside 0-1", confidence),
                });
            }
        }
        Ok(())
    }
}

/// Server lifecycle/progress notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusUpdate {
    pub status: StatusKind,
    #[serde(default)]
    pub message: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Progress indicator, 0.0-1.0
    #[serde(default)]
    pub progress: Option<f32>,
}

impl StatusUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(progress) = self.progress {
            if !(0.0..=1.0).contains(&progress) {
                return Err(RelayError::MalformedMessage {
                    detail: format!("progress {} outside 0-1", progress),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Ready,
    Processing,
    Error,
    Closed,
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StatusKind::Ready => "ready",
            StatusKind::Processing => "processing",
            StatusKind::Error => "error",
            StatusKind::Closed => "closed",
        };
        f.write_str(label)
    }
}

fn default_true() -> bool {
    true
}
