use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chatbot {
    pub chatbot_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

/// A recorded conversation. Rows written by older clients may carry nulls in any
/// column except the surrogate key, so every field decodes permissively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
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
    pub topic: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub message_id: Option<i64>,
    pub conversation_id: i64,
    pub sender: String,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub sender_type: Option<String>,
}
