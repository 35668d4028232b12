use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use nestwatch::client::Nestwatch;
use nestwatch::daemon::{build_router, AppState};
use nestwatch::interfaces::store::StorageGateway;

mod common;
use common::{monitoring_store, seed_parent_with_children, FailingStore};

fn app_with(store: Arc<dyn StorageGateway>, token: &str) -> axum::Router {
    let state = AppState {
        app: Arc::new(Nestwatch::from_parts(store, None)),
        token: token.to_string(),
    };
    build_router(state)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_and_bearer_auth() {
    let app = app_with(Arc::new(monitoring_store()), "secret");

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_json("/family/rename_child", json!({"child_user_id": 1, "new_name": "x"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = post_json(
        "/family/rename_child",
        json!({"child_user_id": 1, "new_name": "x"}),
    );
    request
        .headers_mut()
        .insert("authorization", "Bearer secret".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn generate_ids_for_known_and_unknown_children() {
    let store = Arc::new(monitoring_store());
    seed_parent_with_children(&store, 1, &[(2, "alice")]).await;
    store.seed("chatbots", json!({"chatbot_id": 4})).await;
    let app = app_with(store, "");

    let response = app
        .clone()
        .oneshot(post_json(
            "/ids/generate",
            json!({"childUserId": 2, "platform": "discord"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["chatbotId"], 5);
    assert_eq!(body["conversationId"], 1);
    assert_eq!(body["riskEventId"], 1);
    assert_eq!(body["messageId"], 1);

    let response = app
        .oneshot(post_json(
            "/ids/generate",
            json!({"childUserId": 99, "platform": "discord"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn conversation_ingestion_accepts_both_shapes() {
    let store = Arc::new(monitoring_store());
    let app = app_with(store.clone(), "");

    let response = app
        .clone()
        .oneshot(post_json(
            "/conversations/receive",
            json!({
                "user": "extension",
                "conversation_details": {"conversation_id": 10, "child_user_id": 2}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["conversation_id"], 10);

    let response = app
        .oneshot(post_json(
            "/conversations/receive",
            json!({"conversation_id": 11, "conversation_topic": "games"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let rows = store.select("conversations", &[], &[]).await.unwrap();
    assert_eq!(rows.len(), 2);
    // The flat shape fell back to the placeholder child account.
    assert_eq!(rows[1]["child_user_id"], 1);
}

#[tokio::test]
async fn message_ingestion_failure_stays_a_soft_response() {
    let app = app_with(Arc::new(FailingStore), "");

    let response = app
        .oneshot(post_json(
            "/messages/receive",
            json!({"conversation_id": 10, "sender": "bot", "message_text": "hi"}),
        ))
        .await
        .unwrap();

    // This endpoint never maps store failures onto an error status.
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().unwrap().contains("store unreachable"));
}

#[tokio::test]
async fn message_ingestion_success_echoes_message_id() {
    let app = app_with(Arc::new(monitoring_store()), "");

    let response = app
        .oneshot(post_json(
            "/messages/receive",
            json!({"message_id": 7, "conversation_id": 10, "sender": "bot", "message_text": "hi"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["message_id"], 7);
}

#[tokio::test]
async fn chatbot_ingestion_serializes_metadata_and_fails_hard() {
    let store = Arc::new(monitoring_store());
    let app = app_with(store.clone(), "");

    let response = app
        .clone()
        .oneshot(post_json(
            "/chatbots/receive",
            json!({
                "chatbot_id": 3,
                "name": "HelperBot",
                "metadata": {"model": "gpt"},
                "chatbotPlatform": "discord",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["chatbot_id"], 3);

    let rows = store.select("chatbots", &[], &[]).await.unwrap();
    let metadata: Value = serde_json::from_str(rows[0]["metadata"].as_str().unwrap()).unwrap();
    assert_eq!(metadata["model"], "gpt");

    // Unlike messages, a chatbot write failure is a hard 500.
    let app = app_with(Arc::new(FailingStore), "");
    let response = app
        .oneshot(post_json(
            "/chatbots/receive",
            json!({"chatbot_id": 3, "name": "x", "chatbotPlatform": "discord"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["ok"], false);
}

#[tokio::test]
async fn alert_ingestion_validates_the_details_string() {
    let store = Arc::new(monitoring_store());
    let app = app_with(store.clone(), "");

    let response = app
        .clone()
        .oneshot(post_json(
            "/alerts/receive",
            json!({
                "user": "extension",
                "alert_type": "risk",
                "alert_details": "{\"risk_event_id\": 5, \"riskType\": \"Bullying\"}",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["risk_event_id"], 5);

    let response = app
        .oneshot(post_json(
            "/alerts/receive",
            json!({"user": "extension", "alert_type": "risk", "alert_details": "not json"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn risky_event_lookup_maps_missing_to_404() {
    let app = app_with(Arc::new(monitoring_store()), "");

    let response = app
        .oneshot(get("/parental_control/risky_event/42"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn identifier_collision_maps_to_409() {
    let store = Arc::new(monitoring_store());
    store
        .seed("conversations", json!({"conversation_id": 10}))
        .await;
    let app = app_with(store, "");

    let response = app
        .oneshot(post_json(
            "/conversations/receive",
            json!({"conversation_id": 10}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn parental_control_reads_use_the_placeholder_parent() {
    let store = Arc::new(monitoring_store());
    seed_parent_with_children(&store, 1, &[(2, "alice")]).await;
    store
        .seed(
            "conversations",
            json!({"conversation_id": 10, "child_user_id": 2, "chatbot_id": 7}),
        )
        .await;
    store
        .seed(
            "risky_events",
            json!({
                "risky_event_id": 1,
                "conversation_id": 10,
                "child_user_id": 2,
                "risk_type": "Bullying",
                "risk_level": "high",
            }),
        )
        .await;
    let app = app_with(store, "");

    let response = app
        .clone()
        .oneshot(get("/parental_control/risky_conversations"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body[0]["riskLevel"], "High");
    assert_eq!(body[0]["username"], "alice");

    let response = app
        .clone()
        .oneshot(get("/parental_control/conversations"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body[0]["conversation_id"], 10);

    let response = app
        .oneshot(get("/family/children"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body[0]["child"]["username"], "alice");
}
