// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Installs the global subscriber, so it lives in its own test binary.

use tracing::Level;

use courier_rpc::{CallContext, Protocol, Scope, Server};
use courier_tracing::{TracingConfiguration, TracingError};

static TEST_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests");

#[tokio::test]
async fn test_subscriber_from_config() {
    let config =
        TracingConfiguration::from_file(&format!("{}/testdata/tracing.yaml", TEST_PATH)).unwrap();
    assert_eq!(config.log_level(), "warn");
    assert_eq!(config.filter(), Some("courier_rpc=debug"));
    assert!(config.display_thread_ids());

    config.setup_tracing_subscriber().unwrap();
    assert!(tracing::enabled!(target: "courier_rpc::server", Level::DEBUG));
    assert!(!tracing::enabled!(target: "courier_other", Level::INFO));
    assert!(tracing::enabled!(target: "courier_other", Level::WARN));

    let protocol =
        Protocol::from_file(&format!("{}/testdata/echo.yaml", TEST_PATH)).unwrap();
    let server = Server::new(protocol);
    server
        .on_message("echo", |(msg,): (String,), _: Scope| async move { Ok(msg) })
        .unwrap();

    let out: String = server
        .client()
        .emit_message(CallContext::new())
        .call("echo", ("logged",))
        .await
        .unwrap();
    assert_eq!(out, "logged");

    assert!(matches!(
        config.setup_tracing_subscriber(),
        Err(TracingError::Init(_))
    ));
}
