use crate::error::{RelayError, Result};

use super::messages::{ServerMessage, StatusUpdate, Transcription};

/// Classify one inbound text payload.
///
/// Transcriptions dominate the traffic, so that schema is tried first;
/// the status schema is the fallback. Both schemas reject unknown fields,
/// which keeps the two attempts disjoint. A payload failing both is
/// reported with the reason from each attempt so the server side can be
/// debugged from client logs alone.
pub fn classify(raw: &str) -> Result<ServerMessage> {
    let transcription_err = match serde_json::from_str::<Transcription>(raw) {
        Ok(msg) => match msg.validate() {
            Ok(()) => return Ok(ServerMessage::Transcription(msg)),
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };

    let status_err = match serde_json::from_str::<StatusUpdate>(raw) {
        Ok(msg) => match msg.validate() {
            Ok(()) => return Ok(ServerMessage::Status(msg)),
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };

    Err(RelayError::MalformedMessage {
        detail: format!(
            "not a transcription ({}) nor a status ({})",
            transcription_err, status_err
        ),
    })
}
