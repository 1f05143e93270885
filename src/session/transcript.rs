use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{RelayError, Result};

/// Metadata for a flushed transcript
#[derive(Debug, Clone)]
pub struct TranscriptArtifact {
    pub path: PathBuf,
    pub lines: usize,
}

/// Accumulates delivered transcript lines and writes them once, at session
/// teardown, newline-joined with no trailing newline.
///
/// Same single-shot contract as the audio recorder: the flush clears the
/// buffer regardless of outcome, later calls are no-ops, and an empty
/// session produces no file.
#[derive(Debug, Default)]
pub struct TranscriptSink {
    lines: Vec<String>,
    flushed: bool,
}

impl TranscriptSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer one delivered line, in arrival order.
    pub fn append(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Write the buffered lines to `path`. Returns `Ok(None)` when there is
    /// nothing to write (empty session or already flushed).
    pub fn flush(&mut self, path: &Path) -> Result<Option<TranscriptArtifact>> {
        if self.flushed || self.lines.is_empty() {
            return Ok(None);
        }
        self.flushed = true;

        let lines = std::mem::take(&mut self.lines);

        info!("Saving transcript to {}...", path.display());

        fs::write(path, lines.join("\n")).map_err(|e| RelayError::ArtifactWrite {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        info!("Saved transcript ({} entries)", lines.len());

        Ok(Some(TranscriptArtifact {
            path: path.to_path_buf(),
            lines: lines.len(),
        }))
    }
}
