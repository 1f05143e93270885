//! Streaming session management
//!
//! This module provides the `StreamingSession` abstraction that manages:
//! - The persistent WebSocket to the STT server
//! - The send path (captured audio -> binary frames) and receive path
//!   (server text frames -> transcript) as concurrent tasks
//! - The run-state machine and deterministic shutdown
//! - Session artifacts (recording + transcript), flushed exactly once

mod config;
mod session;
mod state;
mod summary;
mod transcript;

pub use config::SessionConfig;
pub use session::StreamingSession;
pub use state::{RunState, SessionState, StopReason};
pub use summary::SessionSummary;
pub use transcript::{TranscriptArtifact, TranscriptSink};
