use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{RelayError, Result};

use super::capture::AudioFrame;

/// Metadata for a flushed session recording
#[derive(Debug, Clone)]
pub struct RecordingArtifact {
    /// File path of the WAV artifact
    pub path: PathBuf,
    /// Number of frames written
    pub frames: usize,
    /// Total samples written
    pub samples: usize,
    /// Artifact size on disk
    pub size_bytes: u64,
}

/// Accumulates captured frames and writes them once, at session teardown,
/// as a single 16-bit PCM WAV file.
///
/// The flush is destructive and guarded: the buffer is cleared whether or
/// not the write succeeds, and any later call is a no-op. An empty buffer
/// produces no file.
#[derive(Debug, Default)]
pub struct SessionRecorder {
    frames: Vec<AudioFrame>,
    flushed: bool,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer one captured frame, in arrival order.
    pub fn append(&mut self, frame: AudioFrame) {
        self.frames.push(frame);
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Write the buffered audio to `path`. Returns `Ok(None)` when there is
    /// nothing to write (empty session or already flushed).
    pub fn flush(&mut self, path: &Path) -> Result<Option<RecordingArtifact>> {
        if self.flushed || self.frames.is_empty() {
            return Ok(None);
        }
        self.flushed = true;

        let frames = std::mem::take(&mut self.frames);
        let result = write_wav(path, &frames);

        if let Ok(Some(artifact)) = &result {
            info!(
                "Saved session recording ({:.2} MB)",
                artifact.size_bytes as f64 / (1024.0 * 1024.0)
            );
        }

        result
    }
}

fn write_wav(path: &Path, frames: &[AudioFrame]) -> Result<Option<RecordingArtifact>> {
    let artifact_error = |message: String| RelayError::ArtifactWrite {
        path: path.to_path_buf(),
        message,
    };

    // Capture format is fixed for the whole session; the first frame
    // defines the container spec.
    let spec = hound::WavSpec {
        channels: frames[0].channels,
        sample_rate: frames[0].sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    info!("Saving session recording to {}...", path.display());

    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| artifact_error(e.to_string()))?;

    let mut samples = 0usize;
    for frame in frames {
        for &sample in &frame.samples {
            writer
                .write_sample(sample)
                .map_err(|e| artifact_error(e.to_string()))?;
        }
        samples += frame.samples.len();
    }

    writer
        .finalize()
        .map_err(|e| artifact_error(e.to_string()))?;

    let size_bytes = fs::metadata(path)
        .map_err(|e| artifact_error(e.to_string()))?
        .len();

    Ok(Some(RecordingArtifact {
        path: path.to_path_buf(),
        frames: frames.len(),
        samples,
        size_bytes,
    }))
}
