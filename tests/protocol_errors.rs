//! Integration tests for per-event errors, flood control and frame limits.

mod common;

use common::TestServer;
use common::client::Closed;
use common::server::RELAXED_RATE_LIMITS;
use serde_json::json;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

#[tokio::test]
async fn test_bad_events_get_error_events_and_connection_survives() {
    let server = TestServer::spawn(18731).await.expect("Failed to spawn test hub");
    let mut dave = server.connect("dave").await.expect("dave connects");

    dave.send_json(json!({"type": "teleport"})).await.expect("send");
    let error = dave.recv_type("error").await.expect("error");
    assert_eq!(error["code"], "unknown_event_type");

    dave.send_raw("{not json").await.expect("send");
    let error = dave.recv_type("error").await.expect("error");
    assert_eq!(error["code"], "malformed_event");

    dave.send_binary(vec![1, 2, 3]).await.expect("send");
    let error = dave.recv_type("error").await.expect("error");
    assert_eq!(error["code"], "unsupported_frame");

    dave.send_json(json!({"type": "ping"})).await.expect("send");
    dave.recv_type("pong").await.expect("still connected");
}

#[tokio::test]
async fn test_flooding_client_is_warned_then_closed() {
    let rate_limits = r#"
[security.rate_limits]
event_rate_per_second = 1
event_burst = 2
connection_rate_per_second = 1000
connection_burst_per_ip = 1000
"#;
    let server = TestServer::spawn_with(18732, rate_limits, "")
        .await
        .expect("Failed to spawn test hub");
    let mut dave = server.connect("dave").await.expect("dave connects");

    for _ in 0..5 {
        dave.send_json(json!({"type": "ping"})).await.expect("send");
    }

    dave.recv_type("pong").await.expect("first pong");
    dave.recv_type("pong").await.expect("second pong");
    assert_eq!(dave.recv().await.expect("warning")["code"], "rate_limited");
    assert_eq!(dave.recv().await.expect("warning")["code"], "rate_limited");

    match dave.recv_close().await.expect("close") {
        Closed::Frame(Some(frame)) => assert_eq!(frame.code, CloseCode::Policy),
        other => panic!("expected policy close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    let extra = "[limits]\nmax_frame_size = 1024\n";
    let server = TestServer::spawn_with(18733, RELAXED_RATE_LIMITS, extra)
        .await
        .expect("Failed to spawn test hub");
    let mut dave = server.connect("dave").await.expect("dave connects");

    let content = "x".repeat(2048);
    dave.send_json(json!({"type": "chat_message", "conversation_id": "c1", "content": content}))
        .await
        .expect("send");

    match dave.recv_close().await.expect("close") {
        Closed::Frame(Some(frame)) => assert_eq!(frame.code, CloseCode::Size),
        Closed::Eof => {}
        other => panic!("expected size close, got {other:?}"),
    }
}
