use std::time::Duration;

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::post};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use uclips_core::{
    Endpoint, ResponseShape, SegmentSelector, SelectionRequest,
    error::SelectionError,
};

const TRANSCRIPT: &str = "00:00:00.000 --> 00:00:05.000\nwelcome back\n\n\
                          00:00:05.000 --> 00:00:40.000\nthe trick nobody tells you\n\n";

fn segments() -> Value {
    json!({
        "Segment 2": {
            "Start Timestamp": "00:01:00.000",
            "End Timestamp": "00:01:30.000",
            "caption": "second",
            "hashtags": ["#two"]
        },
        "Segment 1": {
            "Start Timestamp": "00:00:05.000",
            "End Timestamp": "00:00:35.000",
            "caption": "first",
            "hashtags": ["#one", "#hook"]
        }
    })
}

async fn direct(Json(request): Json<Value>) -> impl IntoResponse {
    let messages = request["messages"].as_array().cloned().unwrap_or_default();
    if messages.len() != 2 || messages[0]["role"] != "system" || messages[1]["role"] != "user" {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "bad messages"})));
    }
    (StatusCode::OK, Json(segments()))
}

async fn chat_envelope() -> Json<Value> {
    let content = format!("```json\n{}\n```", segments());
    Json(json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    }))
}

async fn broken() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded")
}

async fn not_json() -> &'static str {
    "Sure! Here are some great segments for you."
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(3)).await;
    Json(segments())
}

async fn start_test_server() -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/direct", post(direct))
        .route("/openai", post(chat_envelope))
        .route("/broken", post(broken))
        .route("/prose", post(not_json))
        .route("/slow", post(slow));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    (url, handle)
}

fn endpoint(base: &str, path: &str, shape: ResponseShape) -> Endpoint {
    Endpoint {
        url: format!("{}{}", base, path),
        shape,
    }
}

async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

#[tokio::test]
async fn direct_and_chat_responses_normalize_identically() {
    let (base, _server) = start_test_server().await;
    let request = SelectionRequest::new(2, 30, Default::default()).unwrap();

    let direct = SegmentSelector::new(
        vec![endpoint(&base, "/direct", ResponseShape::Direct)],
        Duration::from_secs(5),
    )
    .unwrap()
    .select(TRANSCRIPT, &request)
    .await;

    let chat = SegmentSelector::new(
        vec![endpoint(&base, "/openai", ResponseShape::ChatCompletion)],
        Duration::from_secs(5),
    )
    .unwrap()
    .select(TRANSCRIPT, &request)
    .await;

    assert_eq!(direct.len(), 2);
    assert_eq!(direct, chat);

    let first = &direct.segments()[0];
    assert_eq!(first.name, "Segment 1");
    assert_eq!(first.ordinal, 1);
    assert_eq!(first.start.as_deref(), Some("00:00:05.000"));
    assert_eq!(first.hashtag_line(), "#one #hook");
}

#[tokio::test]
async fn falls_through_to_next_endpoint() {
    let (base, _server) = start_test_server().await;
    let selector = SegmentSelector::new(
        vec![
            endpoint(&base, "/broken", ResponseShape::Direct),
            endpoint(&base, "/prose", ResponseShape::Direct),
            endpoint(&base, "/openai", ResponseShape::ChatCompletion),
        ],
        Duration::from_secs(5),
    )
    .unwrap();

    let report = selector
        .select_with_diagnostics(TRANSCRIPT, &SelectionRequest::default())
        .await;

    assert_eq!(report.selection.len(), 2);
    assert_eq!(report.failures.len(), 2);
    assert!(matches!(report.failures[0].error, SelectionError::Http(_)));
    assert!(matches!(report.failures[1].error, SelectionError::Json(_)));
    assert_eq!(
        report.failures[0].endpoint.as_deref(),
        Some(format!("{}/broken", base).as_str())
    );
}

#[tokio::test]
async fn unreachable_endpoints_yield_empty_selection() {
    let first = closed_port_url().await;
    let second = closed_port_url().await;
    let selector = SegmentSelector::new(
        vec![
            endpoint(&first, "/", ResponseShape::Direct),
            endpoint(&second, "/openai", ResponseShape::ChatCompletion),
        ],
        Duration::from_secs(2),
    )
    .unwrap();

    let report = selector
        .select_with_diagnostics(TRANSCRIPT, &SelectionRequest::default())
        .await;

    assert!(report.selection.is_empty());
    assert_eq!(report.failures.len(), 2);
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let (base, _server) = start_test_server().await;
    let selector = SegmentSelector::new(
        vec![endpoint(&base, "/slow", ResponseShape::Direct)],
        Duration::from_millis(300),
    )
    .unwrap();

    let report = selector
        .select_with_diagnostics(TRANSCRIPT, &SelectionRequest::default())
        .await;

    assert!(report.selection.is_empty());
    match &report.failures[0].error {
        SelectionError::Http(e) => assert!(e.is_timeout()),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_or_missing_transcript_skips_the_network() {
    let selector = SegmentSelector::new(
        vec![endpoint(&closed_port_url().await, "/", ResponseShape::Direct)],
        Duration::from_secs(1),
    )
    .unwrap();

    let report = selector
        .select_with_diagnostics("  \n", &SelectionRequest::default())
        .await;
    assert!(report.selection.is_empty());
    assert!(matches!(
        report.failures.as_slice(),
        [failure] if failure.endpoint.is_none()
            && matches!(failure.error, SelectionError::EmptyTranscript)
    ));

    let dir = tempfile::tempdir().unwrap();
    let report = selector
        .select_from_file(&dir.path().join("transcript.txt"), &SelectionRequest::default())
        .await;
    assert!(report.selection.is_empty());
    assert!(matches!(
        report.failures[0].error,
        SelectionError::TranscriptMissing(_)
    ));
}
