// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};
use tracing_test::traced_test;

use courier_config::provider::{ConfigProvider, FileConfigProvider};
use courier_rpc::{
    CallContext, CallError, Client, ClientConfig, ErrorEnvelope, ErrorKind, ErrorType,
    HandlerError, Hook, Interceptor, LocalTransport, Message, Next, Protocol, Scope, Server,
    Transport, TransportError, WireCall, WireReply, WrappedRequest, WrappedResponse,
};

static TEST_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct UpperError {
    reason: String,
}

impl ErrorType for UpperError {
    const NAME: &'static str = "UpperError";
}

fn echo_protocol() -> Protocol {
    Protocol::from_file(&format!("{}/testdata/echo.yaml", TEST_PATH)).unwrap()
}

fn upper_server() -> Server {
    let server = Server::new(echo_protocol());
    server
        .on_message("upper", |(msg,): (String,), _scope: Scope| async move {
            match msg.as_str() {
                "boom" => Err(HandlerError::fault("boom").with_code("ERR_BOOM")),
                "loud" => Err(HandlerError::declared(UpperError {
                    reason: "already loud".to_string(),
                })),
                _ => Ok(msg.to_uppercase()),
            }
        })
        .unwrap();
    server
}

type Events = Arc<Mutex<Vec<String>>>;

struct Recorder {
    name: &'static str,
    events: Events,
}

#[async_trait]
impl Interceptor for Recorder {
    async fn intercept(
        &self,
        req: &mut WrappedRequest,
        res: Option<&mut WrappedResponse>,
        next: Next<'_>,
    ) -> Result<(), CallError> {
        self.events.lock().push(format!("{}-in", self.name));
        let outcome = next.run(req, res).await;
        let tag = if outcome.is_ok() { "out" } else { "unwind" };
        self.events.lock().push(format!("{}-{}", self.name, tag));
        outcome
    }
}

#[tokio::test]
#[traced_test]
async fn test_upper_ok() {
    let server = upper_server();
    let client = server.client();

    let out: String = client
        .emit_message(CallContext::new())
        .call("upper", ("foo",))
        .await
        .unwrap();
    assert_eq!(out, "FOO");
    assert!(logs_contain("emitting call"));
}

#[tokio::test]
async fn test_handler_scope_is_bound_to_server() {
    let server = Server::new(echo_protocol());
    let expected = server.clone();
    server
        .on_message("echo", move |(msg,): (String,), scope: Scope| {
            let bound = scope.server().is_some_and(|s| s.ptr_eq(&expected));
            let has_deadline = scope.context().deadline().is_some();
            let message = scope.message().to_string();
            async move { Ok(json!([msg, bound, has_deadline, message])) }
        })
        .unwrap();

    let ctx = CallContext::new().with_timeout(Duration::from_secs(30));
    let out: Value = server
        .client()
        .emit_message(ctx)
        .call("echo", ("hi",))
        .await
        .unwrap();
    assert_eq!(out, json!(["hi", true, true, "echo"]));
}

#[tokio::test]
async fn test_undeclared_error_is_wrapped() {
    let client = upper_server().client();

    let err = client
        .emit_message(CallContext::new())
        .call::<_, String>("upper", ("boom",))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Application);
    let app = err.as_application().unwrap();
    assert_eq!(app.code(), "ERR_APPLICATION");
    assert_eq!(app.cause().message(), "boom");
    assert_eq!(app.application_code(), Some("ERR_BOOM"));
}

#[tokio::test]
async fn test_declared_error_is_forwarded() {
    let client = upper_server().client();

    let err = client
        .emit_message(CallContext::new())
        .call::<_, String>("upper", ("loud",))
        .await
        .unwrap_err();

    let declared = err.as_declared().unwrap();
    assert!(declared.is::<UpperError>());
    assert_eq!(
        declared.downcast::<UpperError>(),
        Some(UpperError {
            reason: "already loud".to_string()
        })
    );
}

#[tokio::test]
async fn test_declared_error_unknown_to_client_degrades() {
    let server = upper_server();
    let client_protocol = Protocol::new("Echo").with_message(
        "upper",
        Message::new()
            .with_request("message", "string")
            .with_response("string"),
    );
    let client = Client::new(client_protocol, Arc::new(LocalTransport::new(server)));

    let err = client
        .emit_message(CallContext::new())
        .call::<_, String>("upper", ("loud",))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Application);
    assert!(err.as_declared().is_none());
}

#[tokio::test]
async fn test_middleware_order_across_sides() {
    let events = Events::default();
    let server = Server::new(echo_protocol());
    let handler_events = events.clone();
    server
        .use_interceptor(Recorder {
            name: "server",
            events: events.clone(),
        })
        .on_message("echo", move |(msg,): (String,), _: Scope| {
            handler_events.lock().push("handler".to_string());
            async move { Ok(msg) }
        })
        .unwrap();

    let client = server.client();
    client.use_interceptor(Recorder {
        name: "client",
        events: events.clone(),
    });

    let out: String = client
        .emit_message(CallContext::new())
        .call("echo", ("x",))
        .await
        .unwrap();
    assert_eq!(out, "x");
    assert_eq!(
        *events.lock(),
        vec!["client-in", "server-in", "handler", "server-out", "client-out"]
    );
}

#[tokio::test]
async fn test_before_only_hooks() {
    let events = Events::default();
    let server = upper_server();
    let server_events = events.clone();
    server.use_interceptor(Hook::new(move |_req: &mut WrappedRequest| {
        server_events.lock().push("server".to_string());
    }));

    let client = server.client();
    let client_events = events.clone();
    client.use_interceptor(Hook::new(move |req: &mut WrappedRequest| {
        assert!(req.scope().client().is_some());
        client_events.lock().push("client".to_string());
    }));

    let out: String = client
        .emit_message(CallContext::new())
        .call("upper", ("foo",))
        .await
        .unwrap();
    assert_eq!(out, "FOO");
    assert_eq!(*events.lock(), vec!["client", "server"]);
}

#[tokio::test]
async fn test_client_interceptor_rewrites_arguments() {
    let client = upper_server().client();
    client.use_interceptor(Hook::new(|req: &mut WrappedRequest| {
        req.args_mut()[0] = json!("bar");
    }));

    let out: String = client
        .emit_message(CallContext::new())
        .call("upper", ("foo",))
        .await
        .unwrap();
    assert_eq!(out, "BAR");
}

#[tokio::test]
async fn test_one_way_resolves_before_handler_completes() {
    let release = Arc::new(Notify::new());
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    let server = Server::new(echo_protocol());
    let gate = release.clone();
    server
        .on_message("ping", move |(beat,): (i64,), _: Scope| {
            let gate = gate.clone();
            let done = done_tx.clone();
            async move {
                gate.notified().await;
                let _ = done.send(beat);
                Ok(())
            }
        })
        .unwrap();

    let value = server
        .client()
        .emit_message(CallContext::new())
        .call_raw("ping", vec![json!(7)])
        .await
        .unwrap();
    assert_eq!(value, Value::Null);
    assert!(done_rx.try_recv().is_err());

    release.notify_one();
    let beat = tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
        .await
        .unwrap();
    assert_eq!(beat, Some(7));
}

#[tokio::test]
async fn test_one_way_failure_reaches_hook() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let server = Server::new(echo_protocol());
    server
        .on_one_way_failure(move |name, envelope| {
            let _ = tx.send((name.to_string(), envelope.clone()));
        })
        .on_message("ping", |(_beat,): (i64,), _: Scope| async move {
            Err::<(), _>(HandlerError::fault("flatline").with_code("ERR_FLAT"))
        })
        .unwrap();

    let value = server
        .client()
        .emit_message(CallContext::new())
        .call_raw("ping", vec![json!(1)])
        .await
        .unwrap();
    assert_eq!(value, Value::Null);

    let (name, envelope) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(name, "ping");
    assert_eq!(
        envelope,
        ErrorEnvelope::application("flatline", Some("ERR_FLAT".to_string()))
    );
}

#[tokio::test]
async fn test_missing_handler() {
    let client = Server::new(echo_protocol()).client();

    let err = client
        .emit_message(CallContext::new())
        .call::<_, String>("echo", ("foo",))
        .await
        .unwrap_err();
    let app = err.as_application().unwrap();
    assert_eq!(app.application_code(), Some("ERR_NO_HANDLER"));
}

#[tokio::test]
async fn test_unknown_message() {
    let client = upper_server().client();

    let err = client
        .emit_message(CallContext::new())
        .call::<_, Value>("shout", ("foo",))
        .await
        .unwrap_err();
    assert_eq!(err, CallError::UnknownMessage("shout".to_string()));
}

struct Down;

#[async_trait]
impl Transport for Down {
    async fn call(&self, _call: WireCall) -> Result<WireReply, TransportError> {
        Err(TransportError::Unavailable("link down".to_string()))
    }

    async fn post(&self, _call: WireCall) -> Result<(), TransportError> {
        Err(TransportError::Unavailable("link down".to_string()))
    }
}

#[tokio::test]
async fn test_transport_failure_unwinds_client_chain() {
    let events = Events::default();
    let client = Client::new(echo_protocol(), Arc::new(Down));
    client.use_interceptor(Recorder {
        name: "client",
        events: events.clone(),
    });

    let err = client
        .emit_message(CallContext::new())
        .call::<_, String>("upper", ("foo",))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CallError::Transport(TransportError::Unavailable("link down".to_string()))
    );
    assert_eq!(*events.lock(), vec!["client-in", "client-unwind"]);

    let err = client
        .emit_message(CallContext::new())
        .call_raw("ping", vec![json!(1)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

struct Deny;

#[async_trait]
impl Interceptor for Deny {
    async fn intercept(
        &self,
        req: &mut WrappedRequest,
        res: Option<&mut WrappedResponse>,
        next: Next<'_>,
    ) -> Result<(), CallError> {
        if req.context().get("token").is_none() {
            return Err(CallError::Interceptor("missing token".to_string()));
        }
        next.run(req, res).await
    }
}

#[tokio::test]
async fn test_server_interceptor_failure() {
    let server = upper_server();
    server.use_interceptor(Deny);
    let client = server.client();

    let err = client
        .emit_message(CallContext::new())
        .call::<_, String>("upper", ("foo",))
        .await
        .unwrap_err();
    let app = err.as_application().unwrap();
    assert_eq!(app.application_code(), Some("ERR_INTERCEPTOR"));
    assert_eq!(app.cause().message(), "interceptor failure: missing token");

    let out: String = client
        .emit_message(CallContext::new().with_metadata("token", "secret"))
        .call("upper", ("foo",))
        .await
        .unwrap();
    assert_eq!(out, "FOO");
}

#[tokio::test]
async fn test_client_timeout_from_config() {
    let config: ClientConfig = FileConfigProvider
        .load_yaml(&format!("{}/testdata/client.yaml", TEST_PATH))
        .unwrap();
    assert_eq!(config.default_timeout, Some(Duration::from_millis(200)));

    let server = Server::new(echo_protocol());
    server
        .on_message("echo", |(msg,): (String,), _: Scope| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(msg)
        })
        .unwrap();

    let client = Client::with_config(
        server.protocol().clone(),
        Arc::new(LocalTransport::new(server)),
        &config,
    )
    .unwrap();

    let err = client
        .emit_message(CallContext::new())
        .call::<_, String>("echo", ("foo",))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_keep_their_context() {
    let server = Server::new(echo_protocol());
    server
        .on_message("echo", |(msg,): (String,), scope: Scope| async move {
            tokio::task::yield_now().await;
            let tenant = scope.context().get("tenant").unwrap_or_default();
            Ok(format!("{}:{}", tenant, msg))
        })
        .unwrap();
    let client = server.client();

    let calls = (0..64).map(|i| {
        let client = client.clone();
        async move {
            let ctx = CallContext::new().with_metadata("tenant", format!("t{}", i));
            client
                .emit_message(ctx)
                .call::<_, String>("echo", (i.to_string(),))
                .await
        }
    });

    for (i, out) in join_all(calls).await.into_iter().enumerate() {
        assert_eq!(out.unwrap(), format!("t{}:{}", i, i));
    }
}
