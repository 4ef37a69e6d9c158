//! Integration tests for logging system

use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LogLevel, LoggingConfig,
};

#[test]
fn test_logging_initializes_once() {
    // A process-wide subscriber can only be installed once
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    assert!(init_logging(config.clone()).is_ok());
    assert!(init_logging(config).is_err());

    tracing::info!(
        video_id = "xyz123",
        file = strip_path("/srv/staging/youtube/videos/demo.mp4"),
        "logging initialized"
    );
}

#[test]
fn test_tokens_never_survive_redaction() {
    for field in ["access_token", "refresh_token", "Authorization", "client_secret"] {
        assert_eq!(redact_if_sensitive(field, "ya29.a0AfH6SM"), "[REDACTED]");
    }
}

#[test]
fn test_pii_redaction_emails() {
    let redacted = redact_if_sensitive("email", "uploader@example.com");

    assert!(redacted.starts_with('u'));
    assert!(redacted.contains("[REDACTED]"));
    assert!(!redacted.contains("example.com"));
}

#[test]
fn test_staged_paths_reduced_to_basename() {
    assert_eq!(
        strip_path("/home/uploader/.local/share/video-upload-core/clip.mov"),
        "clip.mov"
    );
    assert_eq!(strip_path("D:\\staging\\clip.mov"), "clip.mov");
}
