pub mod capture;
pub mod recorder;

pub use capture::{list_input_devices, AudioFrame, CaptureSource, MicCapture};
pub use recorder::{RecordingArtifact, SessionRecorder};
