//! Unit tests for session configuration
//!
//! Tests builder validation, JSON config files, path resolution, command
//! arguments and phase transitions

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gemma_session::transport::subprocess::CommandBuilder;
use gemma_session::{Phase, SessionConfig, SessionConfigBuilder, SessionError};

fn base() -> SessionConfigBuilder {
    SessionConfig::builder()
        .directory("/opt/gemma")
        .model("2b-it")
        .compressed_weights("2b-it-sfp.sbs")
        .tokenizer("tokenizer.spm")
}

#[test]
fn test_builder_defaults() {
    let config = base().build().unwrap();

    assert_eq!(config.directory(), Path::new("/opt/gemma"));
    assert_eq!(config.model(), "2b-it");
    assert_eq!(config.binary_path(), PathBuf::from("/opt/gemma/gemma"));
    assert_eq!(config.ready_timeout(), Duration::from_secs(100));
    assert_eq!(config.response_timeout(), Duration::from_secs(100));
    assert_eq!(config.stream_buffer(), 32);
    assert!(config.transcript().is_none());
    assert_eq!(config.markers().ready, ">");
}

#[test]
fn test_missing_required_fields() {
    let no_model = SessionConfig::builder()
        .directory("/opt/gemma")
        .compressed_weights("w.sbs")
        .tokenizer("t.spm")
        .build();
    assert!(matches!(no_model, Err(SessionError::InvalidConfig(msg)) if msg.contains("model")));

    let no_tokenizer = SessionConfig::builder()
        .directory("/opt/gemma")
        .model("2b-it")
        .compressed_weights("w.sbs")
        .build();
    assert!(
        matches!(no_tokenizer, Err(SessionError::InvalidConfig(msg)) if msg.contains("tokenizer"))
    );
}

#[test]
fn test_invalid_values_rejected() {
    assert!(matches!(
        base().stream_buffer(0).build(),
        Err(SessionError::InvalidConfig(_))
    ));
    assert!(matches!(
        base().binary("  ").build(),
        Err(SessionError::InvalidConfig(_))
    ));

    let mut markers = gemma_session::Markers::default();
    markers.loading = String::new();
    assert!(matches!(
        base().markers(markers).build(),
        Err(SessionError::InvalidConfig(_))
    ));
}

#[test]
fn test_relative_and_absolute_model_files() {
    let config = base()
        .compressed_weights("/data/weights.sbs")
        .tokenizer("tokenizer.spm")
        .build()
        .unwrap();

    assert_eq!(config.weights_path(), PathBuf::from("/data/weights.sbs"));
    assert_eq!(
        config.tokenizer_path(),
        PathBuf::from("/opt/gemma/tokenizer.spm")
    );
}

#[test]
fn test_command_arguments_are_separate() {
    let config = base()
        .directory("/opt/my models")
        .tokenizer("token izer.spm")
        .build()
        .unwrap();
    let args = CommandBuilder::new(&config).args();

    let expected: Vec<OsString> = vec![
        "--model".into(),
        "2b-it".into(),
        "--compressed_weights".into(),
        "/opt/my models/2b-it-sfp.sbs".into(),
        "--tokenizer".into(),
        "/opt/my models/token izer.spm".into(),
    ];
    assert_eq!(args, expected);
}

#[test]
fn test_json_config() {
    let json = r#"{
        "directory": "/srv/gemma",
        "model": "7b-it",
        "compressed_weights": "7b-it-sfp.sbs",
        "tokenizer": "tokenizer.spm",
        "response_timeout_ms": 2500,
        "stream_buffer": 4,
        "transcript": "session.log",
        "markers": { "ready": "\n> " }
    }"#;

    let config = SessionConfigBuilder::from_json_str(json)
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(config.model(), "7b-it");
    assert_eq!(config.response_timeout(), Duration::from_millis(2500));
    assert_eq!(config.stream_buffer(), 4);
    assert_eq!(config.transcript(), Some(Path::new("session.log")));
    assert_eq!(config.markers().ready, "\n> ");
    // Unset markers keep their defaults
    assert_eq!(config.markers().loading, "Reading prompt");
}

#[test]
fn test_json_config_overridden_by_builder() {
    let config = SessionConfigBuilder::from_json_str(r#"{ "model": "7b-it" }"#)
        .unwrap()
        .directory("/opt/gemma")
        .model("2b-it")
        .compressed_weights("w.sbs")
        .tokenizer("t.spm")
        .build()
        .unwrap();

    assert_eq!(config.model(), "2b-it");
}

#[test]
fn test_json_config_unknown_key() {
    let result = SessionConfigBuilder::from_json_str(r#"{ "modle": "2b-it" }"#);
    assert!(matches!(result, Err(SessionError::ConfigParse(_))));
}

#[test]
fn test_json_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gemma.json");
    std::fs::write(
        &path,
        r#"{"directory": "/opt/gemma", "model": "2b-it", "compressed_weights": "w.sbs", "tokenizer": "t.spm"}"#,
    )
    .unwrap();

    let config = SessionConfig::from_json_file(&path).unwrap();
    assert_eq!(config.binary_path(), PathBuf::from("/opt/gemma/gemma"));

    let missing = SessionConfig::from_json_file(dir.path().join("nope.json"));
    assert!(matches!(missing, Err(SessionError::Io(_))));
}

#[test]
fn test_phase_transitions() {
    use Phase::*;

    assert!(NotStarted.can_transition_to(Starting));
    assert!(Starting.can_transition_to(ReadyForInput));
    assert!(ReadyForInput.can_transition_to(Processing));
    assert!(Processing.can_transition_to(LoadingPrompt));
    assert!(LoadingPrompt.can_transition_to(ReadyForInput));

    assert!(!Closed.can_transition_to(ReadyForInput));
    assert!(!Closed.can_transition_to(Closed));
    assert!(!ReadyForInput.can_transition_to(Starting));
    assert!(!NotStarted.can_transition_to(ReadyForInput));

    for phase in [NotStarted, Starting, LoadingPrompt, ReadyForInput, Processing] {
        assert!(phase.can_transition_to(Closed), "{phase} -> closed");
    }
}

#[test]
fn test_phase_collects_content() {
    assert!(Phase::Processing.collects_content());
    assert!(Phase::LoadingPrompt.collects_content());
    assert!(!Phase::Starting.collects_content());
    assert!(!Phase::ReadyForInput.collects_content());
    assert_eq!(Phase::ReadyForInput.to_string(), "ready_for_input");
}

#[test]
fn test_error_recoverability() {
    assert!(SessionError::Busy.is_recoverable());
    assert!(SessionError::timeout("slow").is_recoverable());
    assert!(!SessionError::closed(vec!["partial".to_string()]).is_recoverable());
    let closed = SessionError::closed(vec!["a".to_string(), "b".to_string()]);
    assert_eq!(closed.partial().map(|p| p.concat()), Some("ab".to_string()));
    assert!(SessionError::Busy.partial().is_none());
}
