//! HTTP request handlers

use super::sse::ruling_sse;
use super::types::{ErrorResponse, ModelsResponse};
use super::AppState;
use crate::ruling::{RulingError, RulingRequest};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Streaming ruling
        .route("/api/ruling", post(create_ruling))
        // Model info
        .route("/api/models", get(list_models))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Ruling
// ============================================================

async fn create_ruling(
    State(state): State<AppState>,
    payload: Result<Json<RulingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let service = state.ruling.as_ref().ok_or_else(|| {
        AppError::Unavailable("No language model is configured".to_string())
    })?;

    let rulings = service.generate_ruling_stream(&request)?;
    Ok(ruling_sse(rulings))
}

// ============================================================
// Model Info
// ============================================================

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = state.llm_registry.available_model_info();

    Json(ModelsResponse {
        models,
        default: state.llm_registry.default_model_id().to_string(),
    })
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("halal_check ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unavailable(String),
    Internal(String),
}

impl From<RulingError> for AppError {
    fn from(error: RulingError) -> Self {
        match error {
            RulingError::InvalidRequest(_) => AppError::BadRequest(error.public_message()),
            RulingError::GatewayFailure(_) | RulingError::SchemaViolation(_) => {
                tracing::error!(error = %error, "Ruling failed before streaming");
                AppError::Internal(error.public_message())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ModelInfo, ERROR_EVENT, PARTIAL_EVENT};
    use crate::llm::testing::MockLlmService;
    use crate::llm::{LlmError, ModelRegistry};
    use crate::ruling::{PartialRulingResult, Ruling, GENERIC_FAILURE_MESSAGE};
    use crate::sse::{SseDecoder, SseFrame};
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app_with_mock() -> (Arc<MockLlmService>, Router) {
        let mock = Arc::new(MockLlmService::new("mock"));
        let mut registry = ModelRegistry::new_empty();
        let id = registry.default_model_id().to_string();
        registry.insert(id, mock.clone());
        (mock, create_router(AppState::new(Arc::new(registry))))
    }

    fn ruling_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/ruling")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn sse_frames(response: Response) -> Vec<SseFrame> {
        let bytes = body_bytes(response).await;
        let mut decoder = SseDecoder::new();
        let mut frames = decoder.push(&bytes);
        frames.extend(decoder.finish());
        frames
    }

    #[tokio::test]
    async fn test_ruling_streams_cumulative_partials() {
        let (mock, app) = app_with_mock();
        mock.queue_object(vec![
            json!({ "ruling": "PROBABLY_HALAL" }),
            json!({
                "ruling": "PROBABLY_HALAL",
                "explanation": "Most schools permit seafood.",
                "references": ["Quran 5:96"],
                "clarifyingQuestion": null
            }),
        ]);

        let response = app
            .oneshot(ruling_request(r#"{"query":"eating shellfish"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/event-stream"));

        let frames = sse_frames(response).await;
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.event.as_deref() == Some(PARTIAL_EVENT)));

        let first: PartialRulingResult = serde_json::from_str(&frames[0].data).unwrap();
        assert_eq!(first.ruling, Some(Ruling::ProbablyHalal));
        assert_eq!(first.explanation, None);

        let last: PartialRulingResult = serde_json::from_str(&frames[1].data).unwrap();
        assert!(last.validate().is_ok());
        assert_eq!(last.references.map(|r| r.len()), Some(1));
    }

    #[tokio::test]
    async fn test_history_is_accepted() {
        let (mock, app) = app_with_mock();
        mock.queue_object(vec![json!({ "ruling": "HARAM", "explanation": "Gambling." })]);

        let body = json!({
            "query": "this",
            "history": [
                { "role": "assistant", "content": "What do you mean?" },
                { "role": "user", "content": "I mean playing chess for money" }
            ]
        });
        let response = app.oneshot(ruling_request(&body.to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        sse_frames(response).await;

        assert_eq!(mock.recorded_requests()[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected_before_gateway() {
        let (mock, app) = app_with_mock();
        for body in [
            "not json",
            r#"{"history":[]}"#,
            r#"{"query":"x","history":[{"role":"system","content":"x"}]}"#,
        ] {
            let response = app.clone().oneshot(ruling_request(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            let error: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
            assert!(!error.error.is_empty());
        }
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected_before_gateway() {
        let (mock, app) = app_with_mock();
        let response = app.oneshot(ruling_request(r#"{"query":"   "}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_gateway_failure_ends_with_error_event() {
        let (mock, app) = app_with_mock();
        mock.queue_error(LlmError::rate_limit("quota exceeded"));

        let response = app.oneshot(ruling_request(r#"{"query":"music"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let frames = sse_frames(response).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some(ERROR_EVENT));
        let error: ErrorResponse = serde_json::from_str(&frames[0].data).unwrap();
        assert_eq!(error.error, GENERIC_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_no_models_is_service_unavailable() {
        let app = create_router(AppState::new(Arc::new(ModelRegistry::new_empty())));
        let response = app.oneshot(ruling_request(r#"{"query":"music"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_list_models() {
        let registry = ModelRegistry::new(&crate::llm::LlmConfig {
            openai_api_key: Some("test-key".to_string()),
            ..Default::default()
        });
        let app = create_router(AppState::new(Arc::new(registry)));

        let response = app
            .oneshot(Request::builder().uri("/api/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let models: ModelsResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(models.default, "gpt-4.1-nano");
        let ids: Vec<&str> = models.models.iter().map(|m: &ModelInfo| m.id.as_str()).collect();
        assert_eq!(ids, vec!["gpt-4.1-nano", "gpt-4o-mini"]);
    }

    #[tokio::test]
    async fn test_version() {
        let app = create_router(AppState::new(Arc::new(ModelRegistry::new_empty())));
        let response = app
            .oneshot(Request::builder().uri("/version").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(body.starts_with("halal_check "));
    }
}
