use chrono::{DateTime, Utc};
use std::path::PathBuf;

use super::state::StopReason;

/// Final accounting for a completed session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// When the session connected
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Binary frames sent to the server
    pub frames_sent: usize,

    /// Frames discarded because the send path fell behind
    pub frames_dropped: usize,

    /// Transcript lines delivered by the server
    pub transcript_lines: usize,

    /// Why the session left the Active state
    pub stop_reason: StopReason,

    /// Audio artifact, present when any audio was captured
    pub recording: Option<PathBuf>,

    /// Transcript artifact, present when any lines were delivered
    pub transcript: Option<PathBuf>,
}
