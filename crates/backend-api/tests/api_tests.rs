use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD, CONTENT_TYPE, ORIGIN,
        },
        Method, Request, StatusCode,
    },
    Router,
};
use http_body_util::BodyExt;
use nooverfit_backend_api::{build_router, AppState};
use nooverfit_config::AppConfig;
use nooverfit_inference::{
    InferenceError, InferenceGateway, InferenceResult, InlineAttachment,
    MISSING_CREDENTIAL_MESSAGE,
};
use serde_json::{json, Value};
use tower::ServiceExt;

type TestResult<T = ()> = anyhow::Result<T>;

#[derive(Debug, Clone)]
struct Seen {
    prompt: String,
    model: String,
    attachments: Vec<InlineAttachment>,
}

enum Reply {
    Text(&'static str),
    Quota,
    Unconfigured,
}

struct StubGateway {
    reply: Reply,
    seen: Mutex<Vec<Seen>>,
}

impl StubGateway {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl InferenceGateway for StubGateway {
    async fn query(
        &self,
        prompt: &str,
        model: &str,
        attachments: &[InlineAttachment],
    ) -> InferenceResult<String> {
        self.seen.lock().unwrap().push(Seen {
            prompt: prompt.to_string(),
            model: model.to_string(),
            attachments: attachments.to_vec(),
        });
        match self.reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Quota => Err(InferenceError::Status {
                status: 429,
                message: Some("Resource has been exhausted".into()),
            }),
            Reply::Unconfigured => Err(InferenceError::MissingCredential),
        }
    }
}

fn router(gateway: Option<Arc<StubGateway>>) -> Router {
    let gateway = gateway.map(|gateway| gateway as Arc<dyn InferenceGateway>);
    build_router(AppState::new(Arc::new(AppConfig::default()), gateway))
}

async fn send(router: Router, request: Request<Body>) -> TestResult<(StatusCode, Value)> {
    let response = router.oneshot(request).await?;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

fn post_chat(body: Value) -> TestResult<Request<Body>> {
    Ok(Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))?)
}

#[tokio::test]
async fn health_reports_ok() -> TestResult {
    let request = Request::get("/health").body(Body::empty())?;
    let (status, body) = send(router(None), request).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn models_lists_catalogue_with_default() -> TestResult {
    let request = Request::get("/api/models").body(Body::empty())?;
    let (status, body) = send(router(None), request).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["default"], "gemini-3-flash-preview");
    let models = body["models"].as_array().expect("models array");
    assert_eq!(models.len(), 4);
    let thinking = models
        .iter()
        .find(|model| model["id"] == "gemini-2.0-flash-thinking-exp")
        .expect("thinking model listed");
    assert_eq!(thinking["thinking"], true);
    Ok(())
}

#[tokio::test]
async fn chat_forwards_prompt_model_and_attachments() -> TestResult {
    let gateway = StubGateway::new(Reply::Text("Section 2 defines the API **[Page 2]**."));
    let request = post_chat(json!({
        "prompt": "What does section 2 cover?",
        "model": "gemini-3-pro-preview",
        "attachments": [{ "mimeType": "application/pdf", "base64": "data:application/pdf;base64,JVBERg==" }]
    }))?;

    let (status, body) = send(router(Some(gateway.clone())), request).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "text": "Section 2 defines the API **[Page 2]**." }));
    let seen = gateway.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].prompt, "What does section 2 cover?");
    assert_eq!(seen[0].model, "gemini-3-pro-preview");
    assert_eq!(seen[0].attachments[0].mime_type, "application/pdf");
    Ok(())
}

#[tokio::test]
async fn chat_defaults_model_and_attachments() -> TestResult {
    let gateway = StubGateway::new(Reply::Text("ok"));
    let request = post_chat(json!({ "prompt": "hi" }))?;

    let (status, _) = send(router(Some(gateway.clone())), request).await?;

    assert_eq!(status, StatusCode::OK);
    let seen = gateway.seen.lock().unwrap().clone();
    assert_eq!(seen[0].model, "gemini-3-flash-preview");
    assert!(seen[0].attachments.is_empty());
    Ok(())
}

#[tokio::test]
async fn chat_requires_prompt() -> TestResult {
    for body in [json!({}), json!({ "prompt": "" })] {
        let gateway = StubGateway::new(Reply::Text("unused"));
        let (status, response) = send(router(Some(gateway.clone())), post_chat(body)?).await?;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response, json!({ "error": "Prompt is required" }));
        assert!(gateway.seen.lock().unwrap().is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn malformed_chat_bodies_get_json_errors() -> TestResult {
    let gateway = StubGateway::new(Reply::Text("unused"));

    let wrong_type = Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header(CONTENT_TYPE, "text/plain")
        .body(Body::from(r#"{"prompt":"hi"}"#))?;
    let (status, body) = send(router(Some(gateway.clone())), wrong_type).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body");
    assert!(body["details"].is_string());

    let (status, body) =
        send(router(Some(gateway.clone())), post_chat(json!({ "prompt": 42 }))?).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body");
    assert!(body["details"].as_str().unwrap_or_default().contains("prompt"));

    assert!(gateway.seen.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn chat_without_credential_reports_configuration_error() -> TestResult {
    let (status, body) = send(router(None), post_chat(json!({ "prompt": "hi" }))?).await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": MISSING_CREDENTIAL_MESSAGE }));

    let gateway = StubGateway::new(Reply::Unconfigured);
    let (status, body) =
        send(router(Some(gateway)), post_chat(json!({ "prompt": "hi" }))?).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], MISSING_CREDENTIAL_MESSAGE);
    Ok(())
}

#[tokio::test]
async fn chat_upstream_failure_carries_message_and_details() -> TestResult {
    let gateway = StubGateway::new(Reply::Quota);
    let (status, body) =
        send(router(Some(gateway)), post_chat(json!({ "prompt": "hi" }))?).await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Resource has been exhausted");
    assert!(body["details"].as_str().unwrap_or_default().contains("429"));
    Ok(())
}

#[tokio::test]
async fn chat_accepts_bodies_above_default_extractor_limit() -> TestResult {
    let gateway = StubGateway::new(Reply::Text("big"));
    let payload = "A".repeat(5 * 1024 * 1024);
    let request = post_chat(json!({
        "prompt": "hi",
        "attachments": [{ "mimeType": "text/plain", "base64": payload }]
    }))?;

    let (status, _) = send(router(Some(gateway)), request).await?;

    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn cors_preflight_allows_any_origin() -> TestResult {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/chat")
        .header(ORIGIN, "http://localhost:5173")
        .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())?;

    let response = router(None).oneshot(request).await?;

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );
    Ok(())
}
