use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{NestwatchError, Result};
use crate::interfaces::store::{Filter, StorageGateway};

/// Placeholder child account used when a client submits a flat conversation
/// payload without a `child_user_id` (single-tenant stub).
pub const DEFAULT_CHILD_USER_ID: i64 = 1;

const UNKNOWN: &str = "unknown";
const NO_SUMMARY_AVAILABLE: &str = "No summary available";

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationDetails {
    #[serde(default)]
    pub conversation_id: Option<i64>,
    #[serde(default)]
    pub child_user_id: Option<i64>,
    #[serde(default)]
    pub chatbot_id: Option<i64>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub conversation_topic: Option<String>,
    #[serde(default)]
    pub conversation_summary: Option<String>,
    #[serde(default)]
    pub messages: Option<Value>,
    #[serde(default)]
    pub platform: Option<String>,
}

/// Canonical form of a conversation submission. Clients send either the nested
/// envelope or the same fields flat at the top level; `parse` folds both into
/// this one shape at the boundary, so nothing downstream branches on it.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationRequest {
    pub user: String,
    pub conversation_details: ConversationDetails,
}

impl ConversationRequest {
    pub fn parse(raw: Value) -> Result<Self> {
        if raw.get("user").is_some() && raw.get("conversation_details").is_some() {
            return serde_json::from_value(raw)
                .map_err(|e| NestwatchError::Validation(e.to_string()));
        }

        let user = raw
            .get("user")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN)
            .to_string();
        let mut details: ConversationDetails =
            serde_json::from_value(raw).map_err(|e| NestwatchError::Validation(e.to_string()))?;
        if details.child_user_id.is_none() {
            details.child_user_id = Some(DEFAULT_CHILD_USER_ID);
        }
        if details.platform.is_none() {
            details.platform = Some(UNKNOWN.to_string());
        }

        Ok(Self {
            user,
            conversation_details: details,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub message_id: Option<i64>,
    pub conversation_id: i64,
    pub sender: String,
    pub message_text: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub sender_type: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

/// Alert payload as carried inside the `alert_details` JSON string.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertDetails {
    #[serde(default)]
    pub risk_event_id: Option<i64>,
    #[serde(default)]
    pub conversation_id: Option<i64>,
    #[serde(default)]
    pub child_user_id: Option<i64>,
    #[serde(default, rename = "riskLevel")]
    pub risk_level: Option<String>,
    #[serde(default, rename = "riskType")]
    pub risk_type: Option<String>,
    #[serde(default, rename = "riskyReason")]
    pub reason: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub messages: Option<Value>,
}

/// Persists incoming records, substituting documented defaults for anything a
/// client left out. Inserts either return the stored row or fail; the softer
/// message contract lives at the HTTP boundary, not here.
pub struct IngestService {
    store: Arc<dyn StorageGateway>,
}

impl IngestService {
    pub fn new(store: Arc<dyn StorageGateway>) -> Self {
        Self { store }
    }

    pub async fn write_conversation(&self, details: &ConversationDetails) -> Result<Value> {
        let row = json!({
            "conversation_id": details.conversation_id,
            "child_user_id": details.child_user_id,
            "chatbot_id": details.chatbot_id,
            "start_time": details.start_time,
            "end_time": details.end_time,
            "topic": details.conversation_topic.as_deref().unwrap_or(UNKNOWN),
            "summary": details.conversation_summary.as_deref().unwrap_or(NO_SUMMARY_AVAILABLE),
            "platform": details.platform.as_deref().unwrap_or(UNKNOWN),
        });
        self.store.insert("conversations", row).await
    }

    pub async fn write_message(&self, request: &MessageRequest) -> Result<Value> {
        let row = json!({
            "message_id": request.message_id,
            "conversation_id": request.conversation_id,
            "sender": request.sender,
            "text": request.message_text,
            "timestamp": request.timestamp.clone().unwrap_or_else(now_rfc3339),
            "sender_type": request.sender_type.as_deref().unwrap_or(UNKNOWN),
        });
        self.store.insert("messages", row).await
    }

    pub async fn write_alert(&self, details: &AlertDetails) -> Result<Value> {
        let messages = match &details.messages {
            Some(snapshot) if !snapshot_is_empty(snapshot) => Some(
                serde_json::to_string(snapshot)
                    .map_err(|e| NestwatchError::Validation(e.to_string()))?,
            ),
            _ => None,
        };
        let row = json!({
            "risky_event_id": details.risk_event_id,
            "conversation_id": details.conversation_id,
            "child_user_id": details.child_user_id,
            "risk_level": details.risk_level,
            "risk_type": details.risk_type,
            "reason": details.reason,
            "timestamp": details.timestamp.clone().unwrap_or_else(now_rfc3339),
            "messages": messages,
        });
        self.store.insert("risky_events", row).await
    }

    /// Upsert by `chatbot_id`: update the existing row if one exists, insert
    /// otherwise. `metadata` must already be serialized by the caller.
    pub async fn write_chatbot(
        &self,
        chatbot_id: i64,
        name: &str,
        metadata: &str,
        platform: &str,
    ) -> Result<Value> {
        let existing = self
            .store
            .select(
                "chatbots",
                &["chatbot_id"],
                &[Filter::eq("chatbot_id", chatbot_id)],
            )
            .await?;

        let row = json!({
            "chatbot_id": chatbot_id,
            "name": name,
            "metadata": metadata,
            "platform": platform,
        });

        if existing.is_empty() {
            self.store.insert("chatbots", row).await
        } else {
            self.store
                .update("chatbots", row, &[Filter::eq("chatbot_id", chatbot_id)])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    NestwatchError::Upstream(
                        "chatbot update returned no representation".to_string(),
                    )
                })
        }
    }
}

fn snapshot_is_empty(snapshot: &Value) -> bool {
    snapshot.is_null() || snapshot.as_array().is_some_and(|items| items.is_empty())
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
