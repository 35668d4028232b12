use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::Nestwatch;
use crate::config::Config;
use crate::error::{NestwatchError, Result};
use crate::services::ingest::{AlertDetails, ConversationRequest, MessageRequest};

/// Single-tenant stub: every parent-keyed read runs as this fixed parent until
/// real identity resolution replaces it.
pub const PLACEHOLDER_PARENT_USER_ID: i64 = 1;

#[derive(Clone)]
pub struct AppState {
    pub app: Arc<Nestwatch>,
    pub token: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Deserialize)]
struct IdGenerationRequest {
    #[serde(rename = "childUserId")]
    child_user_id: i64,
    platform: String,
}

#[derive(Deserialize)]
struct AlertRequest {
    user: String,
    alert_type: String,
    alert_details: String,
}

#[derive(Deserialize)]
struct ChatbotRequest {
    chatbot_id: i64,
    name: String,
    #[serde(default)]
    metadata: Value,
    #[serde(rename = "chatbotPlatform")]
    platform: String,
}

#[derive(Deserialize)]
struct AddChildRequest {
    parent_user_id: i64,
    child_name: String,
    child_age: i64,
}

#[derive(Deserialize)]
struct RemoveChildRequest {
    parent_user_id: i64,
    child_user_id: i64,
}

#[derive(Deserialize)]
struct RenameChildRequest {
    child_user_id: i64,
    new_name: String,
}

#[derive(Deserialize)]
struct EmailNotificationRequest {
    email: String,
    child_name: String,
    risk_level: String,
    redirect_url: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ids/generate", post(generate_ids))
        .route("/conversations/receive", post(receive_conversation))
        .route("/messages/receive", post(receive_message))
        .route("/alerts/receive", post(receive_alert))
        .route("/chatbots/receive", post(receive_chatbot))
        .route(
            "/parental_control/risky_conversations",
            get(risky_conversations),
        )
        .route("/parental_control/conversations", get(conversations))
        .route(
            "/parental_control/risky_event/:risky_event_id",
            get(risky_event_detail),
        )
        .route(
            "/parental_control/conversation_times",
            get(conversation_times),
        )
        .route("/family/children", get(family_children))
        .route("/family/add_child", post(add_child))
        .route("/family/remove_child", post(remove_child))
        .route("/family/rename_child", post(rename_child))
        .route("/notify/email", post(notify_email))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn generate_ids(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<IdGenerationRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    match state
        .app
        .ids()
        .generate_for_child(payload.child_user_id, &payload.platform)
        .await
    {
        Ok(ids) => (StatusCode::OK, Json(ids)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn receive_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(raw): Json<Value>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    let request = match ConversationRequest::parse(raw) {
        Ok(request) => request,
        Err(err) => return error_response(err),
    };

    match state
        .app
        .ingest()
        .write_conversation(&request.conversation_details)
        .await
    {
        Ok(row) => (
            StatusCode::OK,
            Json(json!({
                "message": "Conversation received and saved successfully",
                "conversation_id": row.get("conversation_id").cloned().unwrap_or(Value::Null),
            })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

/// The one soft ingestion endpoint: a failed write reports `{ok:false}` in a
/// 200 body so an extension mid-conversation never sees an error status.
async fn receive_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<MessageRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    match state.app.ingest().write_message(&payload).await {
        Ok(row) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "message": "Message received successfully",
                "message_id": row.get("message_id").cloned().unwrap_or(Value::Null),
            })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!("error processing message: {err}");
            (
                StatusCode::OK,
                Json(json!({
                    "ok": false,
                    "error": err.to_string(),
                    "message": "Error processing message",
                })),
            )
                .into_response()
        }
    }
}

async fn receive_alert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AlertRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    let details: AlertDetails = match serde_json::from_str(&payload.alert_details) {
        Ok(details) => details,
        Err(err) => {
            return error_response(NestwatchError::Validation(format!(
                "invalid JSON in alert_details: {err}"
            )))
        }
    };
    tracing::info!(
        "received {} alert from {}",
        payload.alert_type,
        payload.user
    );

    match state.app.ingest().write_alert(&details).await {
        Ok(row) => (
            StatusCode::OK,
            Json(json!({
                "message": "Alert received and risk event saved successfully",
                "risk_event_id": row.get("risky_event_id").cloned().unwrap_or(Value::Null),
            })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn receive_chatbot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ChatbotRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    // Metadata arrives structured and is stored as one opaque string.
    let metadata = match serde_json::to_string(&payload.metadata) {
        Ok(metadata) => metadata,
        Err(err) => return error_response(NestwatchError::Validation(err.to_string())),
    };

    match state
        .app
        .ingest()
        .write_chatbot(payload.chatbot_id, &payload.name, &metadata, &payload.platform)
        .await
    {
        Ok(row) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "message": "Chatbot received and saved successfully",
                "chatbot_id": row.get("chatbot_id").cloned().unwrap_or(Value::Null),
            })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!("error processing chatbot: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "ok": false,
                    "error": err.to_string(),
                    "message": "Error processing chatbot",
                })),
            )
                .into_response()
        }
    }
}

async fn risky_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    match state
        .app
        .aggregation()
        .risky_conversations(PLACEHOLDER_PARENT_USER_ID)
        .await
    {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn conversations(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    match state
        .app
        .aggregation()
        .conversation_overviews(PLACEHOLDER_PARENT_USER_ID)
        .await
    {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn risky_event_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(risky_event_id): Path<i64>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    match state
        .app
        .aggregation()
        .risky_event_detail(risky_event_id)
        .await
    {
        Ok(Some(detail)) => (StatusCode::OK, Json(detail)).into_response(),
        Ok(None) => error_response(NestwatchError::NotFound(format!(
            "risky event with id {risky_event_id} not found"
        ))),
        Err(err) => error_response(err),
    }
}

async fn conversation_times(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    match state
        .app
        .aggregation()
        .conversation_times(PLACEHOLDER_PARENT_USER_ID)
        .await
    {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn family_children(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    match state
        .app
        .family()
        .children(PLACEHOLDER_PARENT_USER_ID)
        .await
    {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn add_child(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AddChildRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    match state
        .app
        .family()
        .add_child(payload.parent_user_id, &payload.child_name, payload.child_age)
        .await
    {
        Ok(child_user_id) => (
            StatusCode::OK,
            Json(json!({
                "message": "Child added successfully",
                "child_user_id": child_user_id,
            })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn remove_child(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RemoveChildRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    match state
        .app
        .family()
        .remove_child(payload.parent_user_id, payload.child_user_id)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Child removed successfully" })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn rename_child(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RenameChildRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    match state
        .app
        .family()
        .rename_child(payload.child_user_id, &payload.new_name)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Child renamed successfully" })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn notify_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<EmailNotificationRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    let Some(notifier) = state.app.notifier() else {
        return error_response(NestwatchError::Config("smtp is not configured".to_string()));
    };

    match notifier
        .send_risk_notification(
            &payload.email,
            &payload.child_name,
            &payload.risk_level,
            &payload.redirect_url,
        )
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Email notification sent successfully" })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

/// Maps each error kind to its own status code, with the original message
/// embedded in the body.
fn error_response(err: NestwatchError) -> Response {
    let status = match &err {
        NestwatchError::NotFound(_) => StatusCode::NOT_FOUND,
        NestwatchError::Validation(_) => StatusCode::BAD_REQUEST,
        NestwatchError::Conflict(_) => StatusCode::CONFLICT,
        NestwatchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        NestwatchError::Upstream(_) => StatusCode::BAD_GATEWAY,
        NestwatchError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn authorize(
    headers: &HeaderMap,
    token: &str,
) -> std::result::Result<(), (StatusCode, Json<ErrorResponse>)> {
    if token.is_empty() {
        return Ok(());
    }

    let header = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let api_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let bearer = header.strip_prefix("Bearer ").unwrap_or("");

    if bearer == token || api_key == token {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Unauthorized".to_string(),
            }),
        ))
    }
}

pub async fn run(host: &str, port: u16, config: Config, token: &str) -> Result<()> {
    run_with_shutdown(host, port, config, token, futures::future::pending::<()>()).await
}

pub async fn run_with_shutdown<F>(
    host: &str,
    port: u16,
    config: Config,
    token: &str,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = Arc::new(Nestwatch::from_config(&config)?);
    let state = AppState {
        app,
        token: token.to_string(),
    };
    let router = build_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| NestwatchError::Config(e.to_string()))?;
    tracing::info!("listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| NestwatchError::Upstream(e.to_string()))?;

    Ok(())
}
