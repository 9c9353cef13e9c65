//! End-to-end transport tests against a scripted local HTTP server.
//!
//! Gated behind `CODEX_CLIENT_ALLOW_LOCAL_INTEGRATION` because they bind
//! loopback sockets.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use base64::{engine::general_purpose, Engine as _};
use chat_model::ModelDelta;
use codex_client::{
    BlockingCodexClient, CodexClient, CodexClientError, CodexConfig, CredentialStore, InputItem,
    InputPart, ResponsesRequest,
};
use serde_json::json;

fn allow_local_integration() -> bool {
    std::env::var("CODEX_CLIENT_ALLOW_LOCAL_INTEGRATION")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

struct ScriptedServer {
    base_url: String,
    request_count: Arc<AtomicUsize>,
    // Kept so the acceptor thread outlives the test body; it exits once its
    // script is exhausted and the process teardown reaps it otherwise.
    _handle: JoinHandle<()>,
}

impl ScriptedServer {
    /// Serves each scripted `(status, content_type, body)` response to one
    /// connection, in order, then stops accepting.
    fn start(responses: Vec<(u16, &'static str, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind local listener");
        let addr = listener.local_addr().expect("local addr");
        let request_count = Arc::new(AtomicUsize::new(0));

        let handle = std::thread::spawn({
            let request_count = Arc::clone(&request_count);
            move || {
                for (status, content_type, body) in responses {
                    let Ok((mut socket, _)) = listener.accept() else {
                        break;
                    };
                    request_count.fetch_add(1, Ordering::SeqCst);
                    read_http_request(&mut socket);

                    let reason = if status == 200 { "OK" } else { "Error" };
                    let response = format!(
                        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len(),
                    );
                    let _ = socket.write_all(response.as_bytes());
                    let _ = socket.flush();
                }
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            request_count,
            _handle: handle,
        }
    }

    fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

fn read_http_request(socket: &mut std::net::TcpStream) {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let Ok(read) = socket.read(&mut chunk) else {
            return;
        };
        if read == 0 {
            return;
        }
        raw.extend_from_slice(&chunk[..read]);

        let Some(header_end) = raw.windows(4).position(|window| window == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&raw[..header_end]).to_ascii_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if raw.len() >= header_end + 4 + content_length {
            return;
        }
    }
}

fn sse_body(frames: &[&str]) -> String {
    let mut body = String::new();
    for frame in frames {
        body.push_str("data: ");
        body.push_str(frame);
        body.push_str("\n\n");
    }
    body
}

fn weather_frames() -> Vec<&'static str> {
    vec![
        r#"{"type":"response.output_item.added","item":{"type":"function_call","id":"fc_c1","call_id":"c1","name":"get_weather"}}"#,
        r#"{"type":"response.function_call_arguments.delta","item_id":"fc_c1","delta":"{\"city\":"}"#,
        r#"{"type":"response.function_call_arguments.delta","item_id":"fc_c1","delta":"\"Lyon\"}"}"#,
        r#"{"type":"response.completed","response":{"usage":{"input_tokens":7,"output_tokens":5,"total_tokens":12}}}"#,
        "[DONE]",
    ]
}

fn request() -> ResponsesRequest {
    ResponsesRequest::new(
        "codex-mini-latest",
        "be terse",
        vec![InputItem::UserMessage {
            parts: vec![InputPart::Text {
                text: "weather in Lyon?".to_string(),
            }],
        }],
    )
}

fn config(base_url: &str) -> CodexConfig {
    CodexConfig::new("token-123", "acct-9").with_base_url(base_url)
}

#[test]
fn blocking_invoke_assembles_the_tool_call_end_to_end() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::start(vec![(
        200,
        "text/event-stream",
        sse_body(&weather_frames()),
    )]);
    let client = BlockingCodexClient::new(config(&server.base_url)).expect("client");

    let output = client.invoke(&request()).expect("invoke");
    assert_eq!(output.tool_calls.len(), 1);
    assert_eq!(output.tool_calls[0].id, "c1");
    assert_eq!(output.tool_calls[0].arguments, "{\"city\":\"Lyon\"}");
    assert_eq!(server.request_count(), 1);
}

#[test]
fn blocking_stream_yields_deltas_lazily() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::start(vec![(
        200,
        "text/event-stream",
        sse_body(&weather_frames()),
    )]);
    let client = BlockingCodexClient::new(config(&server.base_url)).expect("client");

    let deltas: Vec<ModelDelta> = client
        .stream(&request())
        .expect("stream")
        .collect::<Result<_, _>>()
        .expect("deltas");

    assert!(matches!(&deltas[0], ModelDelta::ToolCallStarted { .. }));
    assert!(matches!(deltas.last(), Some(ModelDelta::Completed(_))));
}

#[test]
fn blocking_error_status_surfaces_before_any_event() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::start(vec![(
        401,
        "application/json",
        r#"{"error":{"message":"token expired"}}"#.to_string(),
    )]);
    let client = BlockingCodexClient::new(config(&server.base_url)).expect("client");

    let error = client.invoke(&request()).expect_err("401 should fail");
    assert!(matches!(
        error,
        CodexClientError::Status(status, ref message)
            if status.as_u16() == 401 && message == "token expired"
    ));
}

#[test]
fn blocking_protocol_error_event_is_fatal_inside_a_200_stream() {
    if !allow_local_integration() {
        return;
    }

    let body = sse_body(&[r#"{"type":"error","code":"overloaded","message":"try later"}"#]);
    let server = ScriptedServer::start(vec![(200, "text/event-stream", body)]);
    let client = BlockingCodexClient::new(config(&server.base_url)).expect("client");

    let error = client.invoke(&request()).expect_err("error event is fatal");
    assert!(matches!(error, CodexClientError::Protocol { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn async_invoke_matches_blocking_assembly() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::start(vec![(
        200,
        "text/event-stream",
        sse_body(&weather_frames()),
    )]);
    let client = CodexClient::new(config(&server.base_url)).expect("client");

    let output = client.invoke(&request()).await.expect("invoke");
    assert_eq!(output.tool_calls.len(), 1);
    assert_eq!(output.tool_calls[0].arguments, "{\"city\":\"Lyon\"}");
}

#[tokio::test(flavor = "multi_thread")]
async fn async_stream_pulls_deltas_until_terminal() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::start(vec![(
        200,
        "text/event-stream",
        sse_body(&weather_frames()),
    )]);
    let client = CodexClient::new(config(&server.base_url)).expect("client");

    let mut stream = client.stream(&request()).await.expect("stream");
    let mut deltas = Vec::new();
    while let Some(delta) = stream.next().await {
        deltas.push(delta.expect("delta"));
    }

    assert!(matches!(&deltas[0], ModelDelta::ToolCallStarted { .. }));
    let Some(ModelDelta::Completed(output)) = deltas.last() else {
        panic!("stream should end with a terminal delta");
    };
    assert_eq!(output.tool_calls[0].arguments, "{\"city\":\"Lyon\"}");
}

fn token_with_expiry(exp: u64) -> String {
    let claims = json!({
        "exp": exp,
        "https://api.openai.com/auth": { "chatgpt_account_id": "acct-42" },
    });
    let payload = serde_json::to_vec(&claims).expect("serialize token claims");
    let payload = general_purpose::URL_SAFE_NO_PAD.encode(payload);
    format!("header.{payload}.signature")
}

#[test]
fn stale_credential_triggers_exactly_one_refresh_exchange() {
    if !allow_local_integration() {
        return;
    }

    let rotated = token_with_expiry(4_102_444_800);
    let grant = json!({ "access_token": rotated, "refresh_token": "rt-2" }).to_string();
    let server = ScriptedServer::start(vec![(200, "application/json", grant)]);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("auth.json");
    let body = json!({
        "tokens": { "access_token": token_with_expiry(10), "refresh_token": "rt-1" }
    });
    std::fs::write(&path, body.to_string()).expect("write auth file");

    let store = CredentialStore::new(&path)
        .with_token_url(format!("{}/oauth/token", server.base_url));

    let credential = store.obtain().expect("obtain");
    assert_eq!(credential.access_token, rotated);
    assert_eq!(credential.refresh_token.as_deref(), Some("rt-2"));
    assert_eq!(server.request_count(), 1);

    // The rotated pair was persisted in full, so the next obtain is local.
    let credential = store.obtain().expect("second obtain");
    assert_eq!(credential.access_token, rotated);
    assert_eq!(server.request_count(), 1);

    let persisted: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read auth file"))
            .expect("parse auth file");
    assert_eq!(persisted["tokens"]["access_token"], rotated);
    assert_eq!(persisted["tokens"]["refresh_token"], "rt-2");
    assert!(persisted["last_refresh"].is_string());
}
