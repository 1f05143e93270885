pub mod app;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod session;

pub use audio::{
    list_input_devices, AudioFrame, CaptureSource, MicCapture, RecordingArtifact,
    SessionRecorder,
};
pub use config::Config;
pub use error::{RelayError, Result};
pub use protocol::{
    classify, ClientConfig, ServerMessage, StatusKind, StatusUpdate, Transcription,
    TranscriptionSegment,
};
pub use session::{
    RunState, SessionConfig, SessionState, SessionSummary, StopReason, StreamingSession,
    TranscriptSink,
};
