//! Wire-level tests for the completion client against a local one-shot HTTP
//! server.  Each test serves exactly one canned response and captures the
//! request the client sent.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use toolmate_llm::{LlmClient, LlmClientConfig, LlmError};
use toolmate_planner::{Generator, PlannerError};

/// A request as seen by the mock server.
struct Captured {
    head: String,
    body: serde_json::Value,
}

/// Serve one HTTP response on an ephemeral port; returns the base URL and a
/// handle resolving to the captured request.
async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let (head, body_start) = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break (String::from_utf8_lossy(&buf[..pos]).to_string(), pos + 4);
            }
        };

        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while buf.len() < body_start + content_length {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending the body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let request_body =
            serde_json::from_slice(&buf[body_start..body_start + content_length]).unwrap();

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();

        Captured {
            head,
            body: request_body,
        }
    });

    (format!("http://127.0.0.1:{port}"), handle)
}

const PLAN: &str = r#"[{"function":"send_email_tool","inputs":{"to":"?","content":"?"}}]"#;

#[tokio::test]
async fn openai_compatible_completion() {
    let reply = serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": PLAN}}]
    });
    let (base_url, server) = serve_once("200 OK", reply.to_string()).await;

    let client = LlmClient::new(
        LlmClientConfig::openai_compatible("sk-local", "test-model", format!("{base_url}/v1"))
            .with_temperature(0.2),
    )
    .unwrap();
    let text = client.complete("email my boss the report").await.unwrap();
    assert_eq!(text, PLAN);

    let captured = server.await.unwrap();
    assert!(captured.head.starts_with("POST /v1/chat/completions"));
    assert!(
        captured
            .head
            .to_ascii_lowercase()
            .contains("authorization: bearer sk-local")
    );
    assert_eq!(captured.body["model"], "test-model");
    assert_eq!(captured.body["messages"][0]["content"], "email my boss the report");
}

#[tokio::test]
async fn anthropic_completion() {
    let reply = serde_json::json!({
        "content": [{"type": "text", "text": PLAN}],
        "stop_reason": "end_turn"
    });
    let (base_url, server) = serve_once("200 OK", reply.to_string()).await;

    let client = LlmClient::new(
        LlmClientConfig::anthropic("sk-ant", "claude-test").with_base_url(base_url),
    )
    .unwrap();
    assert_eq!(client.complete("plan").await.unwrap(), PLAN);

    let captured = server.await.unwrap();
    assert!(captured.head.starts_with("POST /v1/messages"));
    assert!(captured.head.to_ascii_lowercase().contains("x-api-key: sk-ant"));
}

#[tokio::test]
async fn error_status_is_request_failure() {
    let (base_url, server) =
        serve_once("503 Service Unavailable", r#"{"error":"overloaded"}"#.into()).await;

    let client =
        LlmClient::new(LlmClientConfig::openai_compatible("k", "m", base_url)).unwrap();
    let err = client.complete("plan").await.unwrap_err();
    match err {
        LlmError::RequestFailed { reason } => {
            assert!(reason.contains("503"));
            assert!(reason.contains("overloaded"));
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn blank_content_is_empty_completion() {
    let reply = serde_json::json!({"choices": [{"message": {"content": "  "}}]});
    let (base_url, server) = serve_once("200 OK", reply.to_string()).await;

    let client = LlmClient::new(LlmClientConfig::ollama("llama3.1", Some(base_url))).unwrap();
    assert!(matches!(
        client.complete("plan").await,
        Err(LlmError::EmptyCompletion { provider }) if provider == "ollama"
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn generator_maps_errors_to_backend_failure() {
    let (base_url, server) = serve_once("200 OK", "not json".into()).await;

    let client =
        LlmClient::new(LlmClientConfig::openai_compatible("k", "m", base_url)).unwrap();
    let err = client.generate("plan").await.unwrap_err();
    match err {
        PlannerError::BackendFailure { reason } => {
            assert!(reason.contains("invalid JSON response"));
        }
        other => panic!("expected BackendFailure, got {other:?}"),
    }
    server.await.unwrap();
}
