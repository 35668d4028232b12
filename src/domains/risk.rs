use serde::{Deserialize, Serialize};

/// A flagged moment in a conversation: classification, severity, and an optional
/// serialized snapshot of the messages around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskyEvent {
    #[serde(default)]
    pub risky_event_id: Option<i64>,
    #[serde(default)]
    pub conversation_id: Option<i64>,
    #[serde(default)]
    pub child_user_id: Option<i64>,
    #[serde(default)]
    pub risk_type: Option<String>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub messages: Option<String>,
}
