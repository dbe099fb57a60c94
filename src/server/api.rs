use crate::admission::validation::{
    is_json_content_type,
    last_user_messages_identical,
    validate,
    ValidationError,
    MAX_BODY_BYTES,
};
use crate::admission::{ client_key, AdmissionGuards, AdmissionPolicy };
use crate::config::knowledge::KnowledgeBase;
use crate::config::prompt::build_system_instruction;
use crate::llm::chat::{ ChatClient, GenerationRequest };
use crate::models::chat::{ ChatRequest, ChatResponse, Citation, ErrorResponse };
use std::fmt;
use std::sync::Arc;
use axum::{
    body::to_bytes,
    extract::{ Request, State },
    http::{ header, HeaderMap, HeaderName, HeaderValue, StatusCode },
    middleware::{ self, Next },
    response::{ IntoResponse, Response },
    routing::post,
    Extension,
    Json,
    Router,
};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tower_http::set_header::SetResponseHeaderLayer;
use uuid::Uuid;
use log::{ info, warn, error };

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id assigned to every API request and echoed in `X-Request-Id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestId(pub Uuid);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self { max_output_tokens: 600, temperature: 0.2 }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub guards: AdmissionGuards,
    pub policy: AdmissionPolicy,
    /// `None` when the provider needs an API key and none was configured.
    pub chat_client: Option<Arc<dyn ChatClient>>,
    pub knowledge: Arc<KnowledgeBase>,
    pub generation: GenerationSettings,
    pub production: bool,
}

impl AppState {
    /// Logs a server-side failure. Details stay out of production logs.
    fn upstream_failure(&self, request_id: RequestId, detail: impl fmt::Display) -> ChatError {
        if self.production {
            error!("chat_error request_id={}", request_id);
        } else {
            error!("chat_error request_id={} error={}", request_id, detail);
        }
        ChatError::Upstream
    }
}

/// Every way `POST /api/chat` can refuse a request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Content-Type header is required")]
    MissingContentType,
    #[error("Content-Type must be application/json")]
    UnsupportedMediaType,
    #[error("Request too large")]
    RequestTooLarge,
    #[error("Too many requests. Please wait and try again.")]
    RateLimited { retry_after_secs: u64 },
    #[error("Invalid JSON payload")]
    InvalidJson,
    #[error("Invalid request shape")]
    InvalidShape,
    #[error("Conversation too long")]
    ConversationTooLong,
    #[error("Please avoid sending repeated messages.")]
    RepeatedMessage,
    #[error("Please avoid sending repeated messages quickly.")]
    RepeatedQuickly,
    #[error("Server is not configured")]
    NotConfigured,
    #[error("Unable to process request")]
    Upstream,
    #[error("No response generated")]
    EmptyAnswer,
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::MissingContentType | ChatError::UnsupportedMediaType => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ChatError::RequestTooLarge | ChatError::ConversationTooLong => StatusCode::PAYLOAD_TOO_LARGE,
            ChatError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ChatError::InvalidJson
            | ChatError::InvalidShape
            | ChatError::RepeatedMessage
            | ChatError::RepeatedQuickly => StatusCode::BAD_REQUEST,
            ChatError::NotConfigured | ChatError::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
            ChatError::EmptyAnswer => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<ValidationError> for ChatError {
    fn from(err: ValidationError) -> Self {
        if err.is_shape_error() {
            ChatError::InvalidShape
        } else {
            ChatError::ConversationTooLong
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut resp = (status, Json(ErrorResponse { error: self.to_string() })).into_response();
        if let ChatError::RateLimited { retry_after_secs } = self {
            resp.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        resp
    }
}

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .layer(middleware::from_fn(assign_request_id))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store")
        ))
        .with_state(state)
}

async fn assign_request_id(mut req: Request, next: Next) -> Response {
    let request_id = RequestId(Uuid::new_v4());
    req.extensions_mut().insert(request_id);
    let mut resp = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        resp.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    resp
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

async fn chat_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    request: Request,
) -> Result<Json<ChatResponse>, ChatError> {
    let (parts, body) = request.into_parts();
    let headers = &parts.headers;

    let Some(content_type) = headers.get(header::CONTENT_TYPE) else {
        return Err(ChatError::MissingContentType);
    };
    if !is_json_content_type(content_type.to_str().unwrap_or("")) {
        return Err(ChatError::UnsupportedMediaType);
    }
    if declared_length(headers).is_some_and(|len| len > MAX_BODY_BYTES) {
        return Err(ChatError::RequestTooLarge);
    }

    let client = client_key(headers);
    let policy = &state.policy;
    let allowed = state.guards.rate_limiter
        .check(&client, policy.rate_limit, policy.rate_window).await
        .map_err(|e| state.upstream_failure(request_id, e))?;
    if !allowed {
        warn!("Rate limit exceeded for {} (request_id={})", client, request_id);
        return Err(ChatError::RateLimited { retry_after_secs: policy.retry_after_secs() });
    }

    // Undeclared or understated lengths are caught while reading.
    let bytes = to_bytes(body, MAX_BODY_BYTES).await.map_err(|_| ChatError::RequestTooLarge)?;
    let payload: JsonValue = serde_json::from_slice(&bytes).map_err(|_| ChatError::InvalidJson)?;
    let decoded: ChatRequest = serde_json::from_value(payload).map_err(|_| ChatError::InvalidShape)?;
    let conversation = validate(&decoded)?;

    if last_user_messages_identical(&conversation) {
        return Err(ChatError::RepeatedMessage);
    }
    if let Some(latest) = conversation.user_messages().last() {
        let repeated = state.guards.repeat_suppressor
            .is_repeat(&client, &latest.content, policy.repeat_window).await
            .map_err(|e| state.upstream_failure(request_id, e))?;
        if repeated {
            return Err(ChatError::RepeatedQuickly);
        }
    }

    let Some(chat_client) = state.chat_client.as_ref() else {
        error!("chat_error request_id={} no chat provider credentials configured", request_id);
        return Err(ChatError::NotConfigured);
    };

    let user_turns: Vec<String> = conversation
        .user_messages()
        .map(|m| m.content.clone())
        .collect();
    info!(
        "chat_request request_id={} messages={} user_messages={}",
        request_id,
        conversation.messages.len(),
        user_turns.len()
    );

    let kb = state.knowledge.load().await;
    let generation = GenerationRequest {
        system_instruction: build_system_instruction(kb),
        user_turns,
        max_output_tokens: state.generation.max_output_tokens,
        temperature: state.generation.temperature,
    };

    let completion = chat_client
        .generate(&generation).await
        .map_err(|e| state.upstream_failure(request_id, e))?;
    if completion.response.trim().is_empty() {
        error!("chat_error request_id={} empty generation", request_id);
        return Err(ChatError::EmptyAnswer);
    }

    let citations = kb
        .map(|doc| vec![Citation { filename: doc.filename.clone() }])
        .unwrap_or_default();
    Ok(Json(ChatResponse { answer: completion.response, citations }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_taxonomy() {
        assert_eq!(ChatError::UnsupportedMediaType.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(ChatError::MissingContentType.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(ChatError::ConversationTooLong.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ChatError::RepeatedQuickly.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ChatError::NotConfigured.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ChatError::EmptyAnswer.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn validation_errors_map_to_endpoint_errors() {
        assert_eq!(ChatError::from(ValidationError::TooManyMessages(25)), ChatError::InvalidShape);
        assert_eq!(ChatError::from(ValidationError::EmptyMessage(0)), ChatError::InvalidShape);
        assert_eq!(
            ChatError::from(ValidationError::MessageTooLong { index: 0, chars: 1001 }),
            ChatError::InvalidShape
        );
        assert_eq!(
            ChatError::from(ValidationError::ConversationTooLong(9000)),
            ChatError::ConversationTooLong
        );
    }

    #[test]
    fn rate_limit_response_carries_retry_after() {
        let resp = ChatError::RateLimited { retry_after_secs: 300 }.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()[header::RETRY_AFTER], "300");
    }

    #[test]
    fn declared_length_ignores_garbage() {
        let mut headers = HeaderMap::new();
        assert_eq!(declared_length(&headers), None);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("abc"));
        assert_eq!(declared_length(&headers), None);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("20001"));
        assert_eq!(declared_length(&headers), Some(20_001));
    }
}
