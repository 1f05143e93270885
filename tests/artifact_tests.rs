// Integration tests for session artifacts
//
// These tests verify that buffered audio survives the round trip through
// the WAV writer byte-identically and that both artifact buffers honor
// their single-shot flush contract.

use anyhow::Result;
use stt_relay::{AudioFrame, SessionRecorder, TranscriptSink};
use tempfile::TempDir;

fn frame(samples: Vec<i16>) -> AudioFrame {
    AudioFrame {
        samples,
        sample_rate: 16000,
        channels: 1,
    }
}

#[test]
fn test_recorder_wav_round_trip_is_byte_identical() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("session.wav");

    // Three frames with distinct content so ordering mistakes are visible
    let frames = vec![
        frame((0..1024).map(|i| i as i16).collect()),
        frame((0..1024).map(|i| (i as i16).wrapping_mul(-3)).collect()),
        frame(vec![i16::MIN, -1, 0, 1, i16::MAX]),
    ];
    let expected: Vec<i16> = frames.iter().flat_map(|f| f.samples.clone()).collect();

    let mut recorder = SessionRecorder::new();
    for f in &frames {
        recorder.append(f.clone());
    }

    let artifact = recorder
        .flush(&path)?
        .ok_or_else(|| anyhow::anyhow!("flush should produce an artifact"))?;

    assert_eq!(artifact.frames, 3);
    assert_eq!(artifact.samples, expected.len());
    assert!(artifact.size_bytes > 0, "Artifact should not be empty");

    // Read the file back and compare every sample
    let mut reader = hound::WavReader::open(&path)?;
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);

    let read_back: Vec<i16> = reader.samples::<i16>().collect::<std::result::Result<_, _>>()?;
    assert_eq!(
        read_back, expected,
        "Samples should round-trip byte-identically in capture order"
    );

    Ok(())
}

#[test]
fn test_recorder_second_flush_is_noop() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("session.wav");

    let mut recorder = SessionRecorder::new();
    recorder.append(frame(vec![1, 2, 3]));

    let first = recorder.flush(&path)?;
    assert!(first.is_some(), "First flush should write the file");

    recorder.append(frame(vec![4, 5, 6]));
    let second = recorder.flush(&path)?;
    assert!(second.is_none(), "Second flush should be a no-op");

    // The file still holds only the first flush's samples
    let mut reader = hound::WavReader::open(&path)?;
    let read_back: Vec<i16> = reader.samples::<i16>().collect::<std::result::Result<_, _>>()?;
    assert_eq!(read_back, vec![1, 2, 3]);

    Ok(())
}

#[test]
fn test_recorder_empty_session_writes_nothing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("session.wav");

    let mut recorder = SessionRecorder::new();
    let artifact = recorder.flush(&path)?;

    assert!(artifact.is_none(), "Empty buffer should produce no artifact");
    assert!(!path.exists(), "No file should exist for an empty session");

    Ok(())
}

#[test]
fn test_recorder_flush_to_missing_directory_fails() {
    let mut recorder = SessionRecorder::new();
    recorder.append(frame(vec![1, 2, 3]));

    let result = recorder.flush(std::path::Path::new(
        "/nonexistent/stt-relay-test/session.wav",
    ));

    assert!(result.is_err(), "Unwritable path should surface an error");
}

#[test]
fn test_transcript_lines_exact_and_ordered() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("transcript.txt");

    let mut sink = TranscriptSink::new();
    sink.append("first utterance");
    sink.append("second utterance");
    sink.append("third");
    assert_eq!(sink.len(), 3);

    let artifact = sink
        .flush(&path)?
        .ok_or_else(|| anyhow::anyhow!("flush should produce an artifact"))?;
    assert_eq!(artifact.lines, 3);

    let written = std::fs::read_to_string(&path)?;
    assert_eq!(
        written, "first utterance\nsecond utterance\nthird",
        "Lines should be newline-joined with no trailing newline"
    );

    Ok(())
}

#[test]
fn test_transcript_second_flush_is_noop() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("transcript.txt");

    let mut sink = TranscriptSink::new();
    sink.append("only line");

    assert!(sink.flush(&path)?.is_some());

    sink.append("late line");
    assert!(
        sink.flush(&path)?.is_none(),
        "Second flush should be a no-op"
    );

    assert_eq!(std::fs::read_to_string(&path)?, "only line");

    Ok(())
}

#[test]
fn test_transcript_empty_session_writes_nothing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("transcript.txt");

    let mut sink = TranscriptSink::new();
    assert!(sink.is_empty());

    let artifact = sink.flush(&path)?;

    assert!(artifact.is_none(), "Empty buffer should produce no artifact");
    assert!(!path.exists(), "No file should exist for an empty session");

    Ok(())
}

#[test]
fn test_transcript_preserves_line_content_verbatim() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("transcript.txt");

    // Punctuation and unicode pass through untouched
    let line = "¿Qué hora es? It's 3:30, give or take.";
    let mut sink = TranscriptSink::new();
    sink.append(line);
    sink.flush(&path)?;

    assert_eq!(std::fs::read_to_string(&path)?, line);

    Ok(())
}
