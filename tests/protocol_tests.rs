// Integration tests for the realtime transcription wire protocol
//
// These tests verify that inbound JSON text frames are classified into the
// right message type, that out-of-range payloads are rejected, and that the
// session hello enforces its field contract before anything is sent.

use anyhow::Result;
use stt_relay::config::VadConfig;
use stt_relay::protocol::{classify, ClientConfig, ServerMessage, StatusKind};
use stt_relay::RelayError;

#[test]
fn test_classify_final_transcription() -> Result<()> {
    let raw = r#"{"text": "hello world", "is_partial": false}"#;

    let message = classify(raw)?;

    match message {
        ServerMessage::Transcription(t) => {
            assert_eq!(t.text, "hello world");
            assert!(t.is_final(), "is_partial=false should mean final");
        }
        other => panic!("Expected transcription, got {:?}", other),
    }

    Ok(())
}

#[test]
fn test_classify_transcription_defaults_to_partial() -> Result<()> {
    let raw = r#"{"text": "hel"}"#;

    let message = classify(raw)?;

    match message {
        ServerMessage::Transcription(t) => {
            assert!(t.is_partial, "Omitted is_partial should default to true");
            assert!(!t.is_final());
        }
        other => panic!("Expected transcription, got {:?}", other),
    }

    Ok(())
}

#[test]
fn test_classify_transcription_with_segments_and_metadata() -> Result<()> {
    let raw = r#"{
        "text": "two segments",
        "is_partial": false,
        "language": "en",
        "confidence": 0.93,
        "segments": [
            {"start": 0.0, "end": 0.8, "text": "two"},
            {"start": 0.8, "end": 1.4, "text": "segments"}
        ]
    }"#;

    let message = classify(raw)?;

    match message {
        ServerMessage::Transcription(t) => {
            let segments = t.segments.as_ref().map(|s| s.len()).unwrap_or(0);
            assert_eq!(segments, 2, "Should keep both segments");
            assert_eq!(t.language.as_deref(), Some("en"));
            assert!((t.confidence.unwrap() - 0.93).abs() < f32::EPSILON);

            let second = &t.segments.unwrap()[1];
            assert_eq!(second.text, "segments");
            assert!(second.end > second.start, "Segment timing should be ordered");
        }
        other => panic!("Expected transcription, got {:?}", other),
    }

    Ok(())
}

#[test]
fn test_classify_transcription_segment_fields_are_optional() -> Result<()> {
    // Servers vary in how much timing detail they attach; a bare-text
    // segment is still valid.
    let raw = r#"{"text": "x", "segments": [{"text": "x"}]}"#;

    let message = classify(raw)?;
    assert!(matches!(message, ServerMessage::Transcription(_)));

    Ok(())
}

#[test]
fn test_classify_status_update() -> Result<()> {
    let raw = r#"{"status": "ready", "message": "model loaded"}"#;

    let message = classify(raw)?;

    match message {
        ServerMessage::Status(s) => {
            assert_eq!(s.status, StatusKind::Ready);
            assert_eq!(s.message, "model loaded");
        }
        other => panic!("Expected status, got {:?}", other),
    }

    Ok(())
}

#[test]
fn test_classify_status_all_kinds() -> Result<()> {
    for (raw_kind, expected) in [
        ("ready", StatusKind::Ready),
        ("processing", StatusKind::Processing),
        ("error", StatusKind::Error),
        ("closed", StatusKind::Closed),
    ] {
        let raw = format!(r#"{{"status": "{}"}}"#, raw_kind);
        let message = classify(&raw)?;
        match message {
            ServerMessage::Status(s) => assert_eq!(s.status, expected),
            other => panic!("Expected status for {:?}, got {:?}", raw_kind, other),
        }
    }

    Ok(())
}

#[test]
fn test_classify_status_with_progress() -> Result<()> {
    let raw = r#"{"status": "processing", "progress": 0.4}"#;

    let message = classify(raw)?;

    match message {
        ServerMessage::Status(s) => {
            assert!((s.progress.unwrap() - 0.4).abs() < f32::EPSILON);
        }
        other => panic!("Expected status, got {:?}", other),
    }

    Ok(())
}

#[test]
fn test_classify_rejects_unknown_shape() {
    // Matches neither schema: no transcription fields, no status field.
    let result = classify(r#"{"foo": 1}"#);

    match result {
        Err(RelayError::MalformedMessage { detail }) => {
            assert!(
                detail.contains("transcription") && detail.contains("status"),
                "Error should carry both schema failures, got: {}",
                detail
            );
        }
        other => panic!("Expected malformed message error, got {:?}", other),
    }
}

#[test]
fn test_classify_rejects_field_mixture() {
    // A payload mixing both schemas is ambiguous traffic, not a valid
    // member of either; deny_unknown_fields rejects it on both tries.
    let result = classify(r#"{"text": "x", "status": "ready"}"#);

    assert!(
        matches!(result, Err(RelayError::MalformedMessage { .. })),
        "Mixed-schema payload should be rejected, got {:?}",
        result
    );
}

#[test]
fn test_classify_rejects_non_object() {
    for raw in ["[1, 2, 3]", "\"just a string\"", "42", "not json at all"] {
        let result = classify(raw);
        assert!(
            matches!(result, Err(RelayError::MalformedMessage { .. })),
            "{:?} should be rejected",
            raw
        );
    }
}

#[test]
fn test_classify_rejects_out_of_range_confidence() {
    let result = classify(r#"{"text": "x", "confidence": 1.5}"#);

    assert!(
        matches!(result, Err(RelayError::MalformedMessage { .. })),
        "Confidence above 1.0 should be rejected, got {:?}",
        result
    );
}

#[test]
fn test_classify_rejects_out_of_range_progress() {
    let result = classify(r#"{"status": "processing", "progress": 2.0}"#);

    assert!(
        matches!(result, Err(RelayError::MalformedMessage { .. })),
        "Progress above 1.0 should be rejected, got {:?}",
        result
    );
}

#[test]
fn test_classify_empty_object_is_empty_transcription() -> Result<()> {
    // Every transcription field has a default, so {} is a valid empty
    // transcription (suppressed downstream), not a protocol error.
    let message = classify("{}")?;

    match message {
        ServerMessage::Transcription(t) => assert!(t.text.is_empty()),
        other => panic!("Expected empty transcription, got {:?}", other),
    }

    Ok(())
}

#[test]
fn test_status_timestamp_defaults_when_absent() -> Result<()> {
    let message = classify(r#"{"status": "ready"}"#)?;

    match message {
        ServerMessage::Status(s) => {
            let age = chrono::Utc::now().signed_duration_since(s.timestamp);
            assert!(
                age.num_seconds() < 60,
                "Defaulted timestamp should be roughly now"
            );
        }
        other => panic!("Expected status, got {:?}", other),
    }

    Ok(())
}

#[test]
fn test_client_config_normalizes_language() -> Result<()> {
    let hello = ClientConfig::new("whisper-large-v3", "EN ", 16000, 1, &VadConfig::default())?;

    assert_eq!(hello.language, "en", "Language should be trimmed and lowercased");

    Ok(())
}

#[test]
fn test_client_config_rejects_numeric_language() {
    let result = ClientConfig::new("whisper-large-v3", "12", 16000, 1, &VadConfig::default());

    assert!(
        matches!(result, Err(RelayError::InvalidConfig { .. })),
        "Numeric language code should be rejected, got {:?}",
        result.map(|c| c.language)
    );
}

#[test]
fn test_client_config_rejects_empty_model() {
    let result = ClientConfig::new("  ", "en", 16000, 1, &VadConfig::default());

    assert!(
        matches!(result, Err(RelayError::InvalidConfig { .. })),
        "Blank model name should be rejected"
    );
}

#[test]
fn test_client_config_wire_shape() -> Result<()> {
    let vad = VadConfig {
        enabled: true,
        aggressiveness: 2,
        ..VadConfig::default()
    };
    let hello = ClientConfig::new("whisper-large-v3", "en", 16000, 1, &vad)?;

    let value: serde_json::Value = serde_json::from_str(&serde_json::to_string(&hello)?)?;

    // The server reads these exact keys from the hello frame.
    assert_eq!(value["model"], "whisper-large-v3");
    assert_eq!(value["language"], "en");
    assert_eq!(value["sample_rate"], 16000);
    assert_eq!(value["channels"], 1);
    assert_eq!(value["vad_enabled"], true);
    assert_eq!(value["vad_aggressiveness"], 2);

    Ok(())
}
