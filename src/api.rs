//! REST API for the conversation backend
//!
//! Thin HTTP surface over the stores, assembler and query pipeline.
//! Input validation happens here, before anything reaches the core.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::ServiceError;
use crate::models::{ConversationCreate, ConversationUpdate, MessageRole, Params, MAX_NAME_LEN};
use crate::query::QueryPipeline;
use crate::store::ConversationStore;
use crate::transcript::TranscriptAssembler;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub role: MessageRole,
    pub content: String,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub conversations: Arc<ConversationStore>,
    pub assembler: Arc<TranscriptAssembler>,
    pub pipeline: Arc<QueryPipeline>,
}

/// =============================
/// Error Responses
/// =============================

type ErrorResponse = (StatusCode, Json<Value>);

/// Error body shape: `{code, message, request: {method, url}, details}`.
fn api_error(method: &str, url: &str, err: &ServiceError) -> ErrorResponse {
    let (status, message) = match err {
        ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "Conversation not found"),
        ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "Invalid parameters provided"),
        ServiceError::Provider(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Unable to create resource due to errors",
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
    };

    error!("Error handling {} {}: {}", method, url, err);

    (
        status,
        Json(json!({
            "code": status.as_u16(),
            "message": message,
            "request": {"method": method, "url": url},
            "details": {"error": err.to_string()},
        })),
    )
}

fn validate_name(name: &str) -> crate::Result<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(ServiceError::Validation(format!(
            "Conversation name exceeds {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn validate_params(params: &Params) -> crate::Result<()> {
    for (key, value) in params {
        if !value.is_finite() {
            return Err(ServiceError::Validation(format!(
                "Parameter {} must be a finite number",
                key
            )));
        }
    }
    Ok(())
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Conversation Endpoints
/// =============================

async fn create_conversation(
    State(state): State<ApiState>,
    Json(payload): Json<ConversationCreate>,
) -> Result<(StatusCode, Json<Value>), ErrorResponse> {
    validate_name(&payload.name)
        .and_then(|_| validate_params(&payload.params))
        .map_err(|e| api_error("POST", "/conversations", &e))?;

    let id = state
        .conversations
        .create(payload.name, payload.params)
        .await
        .map_err(|e| api_error("POST", "/conversations", &e))?;

    Ok((StatusCode::CREATED, Json(json!({"id": id}))))
}

async fn list_conversations(
    State(state): State<ApiState>,
) -> Result<Json<Value>, ErrorResponse> {
    let summaries = state
        .conversations
        .list_all()
        .await
        .map_err(|e| api_error("GET", "/conversations", &e))?;

    Ok(Json(json!(summaries)))
}

async fn get_conversation(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ErrorResponse> {
    let url = format!("/conversations/{}", id);

    let transcript = state
        .assembler
        .assemble(&id)
        .await
        .map_err(|e| api_error("GET", &url, &e))?;

    Ok(Json(json!(transcript)))
}

async fn update_conversation(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(payload): Json<ConversationUpdate>,
) -> Result<StatusCode, ErrorResponse> {
    let url = format!("/conversations/{}", id);

    if let Some(name) = &payload.name {
        validate_name(name).map_err(|e| api_error("PUT", &url, &e))?;
    }
    if let Some(params) = &payload.params {
        validate_params(params).map_err(|e| api_error("PUT", &url, &e))?;
    }

    state
        .conversations
        .update_metadata(&id, payload)
        .await
        .map_err(|e| api_error("PUT", &url, &e))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn delete_conversation(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ErrorResponse> {
    let url = format!("/conversations/{}", id);

    state
        .conversations
        .delete(&id)
        .await
        .map_err(|e| api_error("DELETE", &url, &e))?;

    Ok(StatusCode::NO_CONTENT)
}

/// =============================
/// Query Endpoint
/// =============================

async fn query_conversation(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<Value>, ErrorResponse> {
    let url = format!("/query/{}", id);

    let reply = state
        .pipeline
        .handle(&id, payload.role, payload.content)
        .await
        .map_err(|e| api_error("POST", &url, &e))?;

    // Only the reply content goes back, never the full transcript.
    Ok(Json(json!({"response": reply})))
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/conversations", post(create_conversation).get(list_conversations))
        .route(
            "/conversations/:id",
            get(get_conversation)
                .put(update_conversation)
                .delete(delete_conversation),
        )
        .route("/query/:id", post(query_conversation))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let err = ServiceError::NotFound("Conversation with id x not found".to_string());
        let (status, Json(body)) = api_error("GET", "/conversations/x", &err);

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], 404);
        assert_eq!(body["message"], "Conversation not found");
        assert_eq!(body["request"]["method"], "GET");
        assert_eq!(body["request"]["url"], "/conversations/x");
        assert!(body["details"]["error"].is_string());
    }

    #[test]
    fn test_provider_errors_map_to_422() {
        let err = ServiceError::Provider("provider down".to_string());
        let (status, _) = api_error("POST", "/query/x", &err);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_name_length_validation() {
        assert!(validate_name("chat").is_ok());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_params_must_be_finite() {
        let ok = Params::from([("temperature".to_string(), 0.5)]);
        assert!(validate_params(&ok).is_ok());

        let bad = Params::from([("temperature".to_string(), f64::NAN)]);
        assert!(validate_params(&bad).is_err());
    }
}
