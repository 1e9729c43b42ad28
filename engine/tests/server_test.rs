//! HTTP transport tests driven through the router in-process

mod common;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{item, Fixture, Script};
use fundrag_engine::app::App;
use fundrag_engine::pii::{NoopGate, PiiCheck, PiiGate};
use fundrag_engine::server::router;
use sdk::SourceKind;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct BlockingGate;

#[async_trait]
impl PiiGate for BlockingGate {
    async fn check(&self, _text: &str) -> PiiCheck {
        PiiCheck {
            blocked: true,
            categories: vec!["Email".to_string()],
            error: None,
        }
    }
}

fn app_with(fixture: &Fixture, gate: Arc<dyn PiiGate>) -> App {
    App::new(fixture.orchestrator.clone(), gate)
}

fn fixture() -> Fixture {
    Fixture::new(
        Script::Query(
            vec![item(SourceKind::Sql, "0001", "{\"net_assets\":9.1e9}", 1.0)],
            "SELECT 1".to_string(),
        ),
        Script::Items(vec![item(SourceKind::Semantic, "0003", "Income fund", 1.0)]),
        Script::Items(vec![item(SourceKind::Raptor, "weo#1", "Growth steady", 1.0)]),
    )
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_health() {
    let fixture = fixture();
    let response = router(app_with(&fixture, Arc::new(NoopGate)))
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body, json!({"status": "ok", "service": "fundrag"}));
}

#[tokio::test]
async fn test_chat_requires_message() {
    let fixture = fixture();
    let response = router(app_with(&fixture, Arc::new(NoopGate)))
        .oneshot(post("/api/chat", json!({"history": []})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_collects_answer() {
    let fixture = fixture();
    let response = router(app_with(&fixture, Arc::new(NoopGate)))
        .oneshot(post(
            "/api/chat",
            json!({"message": "Top 10 funds by total net assets"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["route"], "SQL");
    assert_eq!(body["generated_query"], "SELECT 1");
    assert_eq!(body["verified"], true);
    assert_eq!(body["pii_blocked"], false);
    assert_eq!(body["citations"][0]["number"], 1);
    assert_eq!(body["citations"][0]["source"], "SQL");
}

#[tokio::test]
async fn test_chat_follow_up_uses_history() {
    let fixture = fixture();
    let response = router(app_with(&fixture, Arc::new(NoopGate)))
        .oneshot(post(
            "/api/chat",
            json!({
                "message": "And for 2024?",
                "history": [
                    {"role": "user", "text": "Top 10 funds by total net assets"},
                    {"role": "assistant", "text": "Here they are [1]"}
                ]
            }),
        ))
        .await
        .unwrap();

    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["route"], "SQL");
}

#[tokio::test]
async fn test_chat_blocked_by_pii_gate() {
    let fixture = fixture();
    let response = router(app_with(&fixture, Arc::new(BlockingGate)))
        .oneshot(post("/api/chat", json!({"message": "Email me at a@b.com"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["pii_blocked"], true);
    assert!(body["pii_warning"]
        .as_str()
        .unwrap()
        .contains("email address"));
    assert_eq!(fixture.structured.calls(), 0);
    assert_eq!(fixture.semantic.calls(), 0);
}

#[tokio::test]
async fn test_chat_total_failure_is_unavailable() {
    let fixture = Fixture::new(Script::Fail, Script::Fail, Script::Fail);
    let response = router(app_with(&fixture, Arc::new(NoopGate)))
        .oneshot(post(
            "/api/chat",
            json!({"message": "Top 10 funds by total net assets"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(body["error"].as_str().unwrap().contains("fund database"));
}

#[tokio::test]
async fn test_stream_emits_one_sse_event_per_stream_event() {
    let fixture = fixture();
    let response = router(app_with(&fixture, Arc::new(NoopGate)))
        .oneshot(post(
            "/api/chat/stream",
            json!({"message": "How should I position my portfolio for IMF's growth forecast?"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/event-stream"
    );
    let text = String::from_utf8(body_bytes(response).await).unwrap();

    let names: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("event:").map(str::trim))
        .collect();
    let first_metadata = names.iter().position(|n| *n == "metadata").unwrap();
    assert_eq!(&names[..first_metadata], ["progress", "progress", "progress"]);
    assert_eq!(names[first_metadata + 1], "citations");
    assert_eq!(names.last(), Some(&"answer"));
    assert!(text.contains(r#""stage":"fetch-macro""#));
}
