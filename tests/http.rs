//! HTTP-level tests: the extension endpoint plus the Gemini and Classroom
//! clients against local mock servers.

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Path;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use classroom_rag::classroom::fetch_courses;
use classroom_rag::config::{ClassroomConfig, Config, LlmConfig};
use classroom_rag::handler::{Services, Session};
use classroom_rag::llm::{GeminiClient, LanguageModel};
use classroom_rag::server::{router, AppState};
use classroom_rag::storage::KvStore;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct EchoModel;

#[async_trait]
impl LanguageModel for EchoModel {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(format!("echo: {} chars", prompt.chars().count()))
    }
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn mock_classroom() -> SocketAddr {
    async fn courses(headers: HeaderMap) -> impl IntoResponse {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if auth != "Bearer good-token" {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": {"message": "invalid credentials"}})),
            );
        }
        (
            StatusCode::OK,
            Json(json!({
                "courses": [
                    {"id": "c1", "name": "Biology", "description": "Cells and more"},
                    {"id": "c2", "name": "History"},
                    {"name": "No id"}
                ]
            })),
        )
    }
    spawn(Router::new().route("/courses", get(courses))).await
}

async fn mock_gemini() -> SocketAddr {
    async fn generate(
        Path(action): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> impl IntoResponse {
        let key = headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let prompt = body
            .pointer("/contents/0/parts/0/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match prompt.as_str() {
            "overloaded" => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": {"message": "The model is overloaded."}})),
            ),
            "blocked" => (StatusCode::OK, Json(json!({"promptFeedback": {"blockReason": "SAFETY"}}))),
            "silent" => (
                StatusCode::OK,
                Json(json!({"candidates": [{"content": {"parts": [{"text": ""}]}}]})),
            ),
            _ => (
                StatusCode::OK,
                Json(json!({
                    "candidates": [{
                        "content": {"parts": [{"text": format!("{}|{}|{}", action, key, prompt)}]}
                    }]
                })),
            ),
        }
    }
    spawn(Router::new().route("/models/{action}", post(generate))).await
}

fn gemini_config(addr: SocketAddr, key_env: &str) -> LlmConfig {
    LlmConfig {
        model: "gemini-test".into(),
        endpoint: format!("http://{}/models/", addr),
        api_key_env: key_env.into(),
        timeout_secs: 5,
    }
}

async fn app_state(config: Config) -> (TempDir, AppState) {
    let tmp = TempDir::new().unwrap();
    let mut config = config;
    config.db.path = tmp.path().join("kv.sqlite");
    let store = KvStore::open(&config).await.unwrap();
    let state = AppState {
        session: Arc::new(Session::new()),
        services: Services {
            config: Arc::new(config),
            store,
            model: Arc::new(EchoModel),
        },
    };
    (tmp, state)
}

async fn post_message(app: Router, body: Value) -> Value {
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/messages")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (_tmp, state) = app_state(Config::default()).await;
    let resp = router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_unknown_message_type() {
    let (_tmp, state) = app_state(Config::default()).await;
    let body = post_message(router(state), json!({"type": "PING"})).await;
    assert_eq!(body, json!({"course": null, "error": "Unknown message type"}));
}

#[tokio::test]
async fn test_scrape_then_chat_over_http() {
    let (_tmp, state) = app_state(Config::default()).await;
    let app = router(state);

    let page = json!({
        "url": "https://classroom.google.com/c/abc123",
        "classInfo": {"name": "Chemistry"},
        "assignments": [{"id": "a1", "title": "Titration Lab", "description": "Measure acid concentration by titration."}],
        "materials": []
    });
    let body = post_message(app.clone(), json!({"type": "CLASSROOM_DATA", "data": page})).await;
    assert_eq!(body, json!({"course": null, "success": true}));

    let body = post_message(app.clone(), json!({"type": "UI_INIT"})).await;
    assert_eq!(body["course"]["courseId"], "abc123");
    assert_eq!(body["course"]["name"], "Chemistry");

    let body = post_message(
        app,
        json!({"type": "CHAT", "mode": "explain", "message": "How does titration work?"}),
    )
    .await;
    assert!(body["answer"].as_str().unwrap().starts_with("echo: "));
    assert_eq!(body["course"]["courseId"], "abc123");
    assert_eq!(body["sources"][0]["title"], "Titration Lab");
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_classroom_token_lists_classes() {
    let addr = mock_classroom().await;
    let mut config = Config::default();
    config.classroom.base_url = format!("http://{}", addr);
    let (_tmp, state) = app_state(config).await;

    let body = post_message(
        router(state.clone()),
        json!({"type": "CLASSROOM_DATA", "token": "good-token"}),
    )
    .await;
    assert_eq!(body["success"], true);
    let classes = body["classes"].as_array().unwrap();
    assert_eq!(classes.len(), 2);
    assert_eq!(classes[1], json!({"id": "c2", "name": "History", "description": ""}));

    let body = post_message(
        router(state),
        json!({"type": "CLASSROOM_DATA", "token": "bad-token"}),
    )
    .await;
    assert!(body["error"].as_str().unwrap().contains("401"));
}

#[tokio::test]
async fn test_fetch_courses_trailing_slash_base_url() {
    let addr = mock_classroom().await;
    let config = ClassroomConfig {
        base_url: format!("http://{}/", addr),
    };
    let courses = fetch_courses(&config, "good-token").await.unwrap();
    assert_eq!(courses[0].name, "Biology");
    assert_eq!(courses[0].description, "Cells and more");
}

#[tokio::test]
async fn test_gemini_request_shape() {
    let addr = mock_gemini().await;
    std::env::set_var("CLASSROOM_RAG_TEST_KEY_SHAPE", "secret-key");
    let client = GeminiClient::new(&gemini_config(addr, "CLASSROOM_RAG_TEST_KEY_SHAPE")).unwrap();

    let answer = client.generate("What is osmosis?").await.unwrap();
    assert_eq!(answer, "gemini-test:generateContent|secret-key|What is osmosis?");
}

#[tokio::test]
async fn test_gemini_error_responses() {
    let addr = mock_gemini().await;
    std::env::set_var("CLASSROOM_RAG_TEST_KEY_ERRORS", "secret-key");
    let client = GeminiClient::new(&gemini_config(addr, "CLASSROOM_RAG_TEST_KEY_ERRORS")).unwrap();

    let err = client.generate("overloaded").await.unwrap_err().to_string();
    assert_eq!(
        err,
        "Gemini API returned 503 Service Unavailable. The model is overloaded."
    );

    let err = client.generate("blocked").await.unwrap_err().to_string();
    assert_eq!(err, "Unexpected response format: no candidates");

    let err = client.generate("silent").await.unwrap_err().to_string();
    assert_eq!(err, "No response from Gemini - response was empty.");
}

#[tokio::test]
async fn test_gemini_unreachable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    std::env::set_var("CLASSROOM_RAG_TEST_KEY_DOWN", "secret-key");
    let client = GeminiClient::new(&gemini_config(addr, "CLASSROOM_RAG_TEST_KEY_DOWN")).unwrap();
    let err = client.generate("hello").await.unwrap_err();
    assert!(format!("{:#}", err).starts_with("could not fetch answer"));
}
