//! Wire protocol for the realtime transcription endpoint.
//!
//! The client speaks a small asymmetric protocol:
//! - outbound: one `ClientConfig` JSON text frame, then raw PCM binary frames
//! - inbound: JSON text frames, either a `Transcription` or a `StatusUpdate`
//!
//! Inbound payloads carry no type tag; [`classify`] resolves them by trying
//! the two mutually-exclusive schemas in a fixed order.

mod messages;
mod router;

pub use messages::{
    ClientConfig, ServerMessage, StatusKind, StatusUpdate, Transcription, TranscriptionSegment,
};
pub use router::classify;
