//! Subscriber installation and diagnostics routed through it
//!
//! Run with: cargo test --test logging
//!
//! The global subscriber can be installed once per process, so this binary
//! holds a single test.

mod support;

use rtcbridge::logging::init_logging;
use rtcbridge::negotiation::NegotiationSession;
use rtcbridge::{LogFormat, LoggingConfig};
use support::FakeEngine;

#[test]
fn test_json_log_file_receives_session_diagnostics() {
    std::env::remove_var("RUST_LOG");
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("rtcbridge.log");

    init_logging(&LoggingConfig {
        level: "debug".to_string(),
        format: LogFormat::Json,
        file_path: Some(path.to_string_lossy().into_owned()),
    })
    .expect("install subscriber");

    // No injected sink: diagnostics go to tracing
    let session = NegotiationSession::builder(FakeEngine::new())
        .id("logged-session")
        .build();
    session.add_ice_candidate("0", 0, "candidate:1 1 udp 1 not-an-address 9 typ host");

    let contents = std::fs::read_to_string(&path).expect("read log file");
    let events: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("json log line"))
        .collect();

    assert!(events
        .iter()
        .any(|event| event["fields"]["message"] == "Logging initialized"));
    let failure = events
        .iter()
        .find(|event| event["level"] == "ERROR")
        .expect("parse failure logged");
    let message = failure["fields"]["message"].as_str().unwrap_or_default();
    assert!(message.contains("not-an-address"), "{message}");

    assert!(init_logging(&LoggingConfig::default()).is_err());
}
