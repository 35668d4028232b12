use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::domains::chat::{Chatbot, Conversation};
use crate::domains::decode_rows;
use crate::domains::risk::RiskyEvent;
use crate::domains::user::User;
use crate::error::Result;
use crate::interfaces::store::{Filter, StorageGateway};

const NO_RISK: &str = "no risk";

const UNKNOWN_USER: &str = "Unknown User";
const UNKNOWN_RISK: &str = "Unknown Risk";
const UNKNOWN_LEVEL: &str = "Unknown";
const NO_REASON: &str = "No reason provided";
const UNKNOWN_TIMESTAMP: &str = "Unknown timestamp";
const UNKNOWN_PLATFORM: &str = "Unknown Platform";
const UNKNOWN_CHATBOT: &str = "Unknown Chatbot";
const NO_SUMMARY: &str = "No summarization available";
const UNKNOWN_START: &str = "Unknown start time";
const UNKNOWN_END: &str = "Unknown end time";

/// One risky event joined with its conversation, chatbot, and child username.
/// Field names on the wire match what the dashboard consumes.
#[derive(Debug, Clone, Serialize)]
pub struct RiskyConversation {
    pub username: String,
    #[serde(rename = "riskyEvent_id")]
    pub risky_event_id: Option<i64>,
    pub conversation_id: Option<i64>,
    #[serde(rename = "conversationTopics")]
    pub conversation_topics: Option<String>,
    #[serde(rename = "conversationSummarization")]
    pub conversation_summarization: String,
    #[serde(rename = "riskType")]
    pub risk_type: String,
    #[serde(rename = "riskLevel")]
    pub risk_level: String,
    #[serde(rename = "riskyReason")]
    pub risky_reason: String,
    pub timestamp: String,
    #[serde(rename = "chatbotPlatform")]
    pub chatbot_platform: String,
    #[serde(rename = "chatbotDescription")]
    pub chatbot_description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationOverview {
    pub conversation_id: Option<i64>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(rename = "conversationTopics")]
    pub conversation_topics: Option<String>,
    #[serde(rename = "conversationSummarization")]
    pub conversation_summarization: String,
    #[serde(rename = "chatbotPlatform")]
    pub chatbot_platform: String,
    #[serde(rename = "chatbotDescription")]
    pub chatbot_description: String,
}

/// Enriched single-event view. Unlike the list aggregation, `riskLevel` is
/// passed through uncapitalized here; the divergence is observed behavior and
/// kept until a client confirms which spelling is intended.
#[derive(Debug, Clone, Serialize)]
pub struct RiskyEventDetail {
    #[serde(rename = "riskyEvent_id")]
    pub risky_event_id: Option<i64>,
    pub conversation_id: Option<i64>,
    #[serde(rename = "conversationTopics")]
    pub conversation_topics: Option<String>,
    #[serde(rename = "conversationSummarization")]
    pub conversation_summarization: String,
    #[serde(rename = "riskType")]
    pub risk_type: String,
    #[serde(rename = "riskLevel")]
    pub risk_level: String,
    #[serde(rename = "riskyReason")]
    pub risky_reason: String,
    pub timestamp: String,
    #[serde(rename = "chatbotPlatform")]
    pub chatbot_platform: String,
    #[serde(rename = "chatbotDescription")]
    pub chatbot_description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationTimes {
    pub conversation_id: Option<i64>,
    pub start_time: String,
    pub end_time: String,
}

/// Parent-keyed fan-out reads: each operation resolves the parent's children,
/// issues a short sequence of filtered selects, and joins the rows in memory.
/// A parent with no children short-circuits to an empty result with no further
/// round trips; any read failure aborts the whole aggregation.
pub struct AggregationService {
    store: Arc<dyn StorageGateway>,
}

impl AggregationService {
    pub fn new(store: Arc<dyn StorageGateway>) -> Self {
        Self { store }
    }

    async fn child_ids(&self, parent_user_id: i64) -> Result<Vec<i64>> {
        let rows = self
            .store
            .select(
                "parent_child_relations",
                &["child_user_id"],
                &[Filter::eq("parent_user_id", parent_user_id)],
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("child_user_id").and_then(Value::as_i64))
            .collect())
    }

    async fn conversations_for(&self, filters: &[Filter]) -> Result<Vec<Conversation>> {
        let rows = self
            .store
            .select(
                "conversations",
                &[
                    "conversation_id",
                    "chatbot_id",
                    "child_user_id",
                    "start_time",
                    "end_time",
                    "topic",
                    "summary",
                ],
                filters,
            )
            .await?;
        decode_rows(rows)
    }

    async fn chatbots_by_id(
        &self,
        conversations: impl Iterator<Item = &Conversation>,
    ) -> Result<HashMap<i64, Chatbot>> {
        let chatbot_ids: HashSet<i64> = conversations.filter_map(|c| c.chatbot_id).collect();
        if chatbot_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = self
            .store
            .select(
                "chatbots",
                &["chatbot_id", "name", "platform"],
                &[Filter::is_in(
                    "chatbot_id",
                    chatbot_ids.into_iter().map(Value::from).collect(),
                )],
            )
            .await?;
        let chatbots: Vec<Chatbot> = decode_rows(rows)?;
        Ok(chatbots.into_iter().map(|b| (b.chatbot_id, b)).collect())
    }

    pub async fn risky_conversations(&self, parent_user_id: i64) -> Result<Vec<RiskyConversation>> {
        let children = self.child_ids(parent_user_id).await?;
        if children.is_empty() {
            return Ok(Vec::new());
        }
        let child_values: Vec<Value> = children.iter().copied().map(Value::from).collect();

        let event_rows = self
            .store
            .select(
                "risky_events",
                &[
                    "risky_event_id",
                    "timestamp",
                    "risk_type",
                    "risk_level",
                    "reason",
                    "conversation_id",
                    "child_user_id",
                ],
                &[Filter::is_in("child_user_id", child_values.clone())],
            )
            .await?;
        let events: Vec<RiskyEvent> = decode_rows(event_rows)?;

        // Conversations are double-filtered: by the events' conversation ids AND
        // by the resolved children. An event whose conversation fails the second
        // filter keeps iterating but joins against nothing.
        let event_conversation_ids: Vec<Value> = events
            .iter()
            .filter_map(|e| e.conversation_id)
            .map(Value::from)
            .collect();
        if event_conversation_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conversations = self
            .conversations_for(&[
                Filter::is_in("conversation_id", event_conversation_ids),
                Filter::is_in("child_user_id", child_values.clone()),
            ])
            .await?;
        let conversations: HashMap<i64, Conversation> = conversations
            .into_iter()
            .filter_map(|c| c.conversation_id.map(|id| (id, c)))
            .collect();
        if conversations.is_empty() {
            return Ok(Vec::new());
        }

        let chatbots = self.chatbots_by_id(conversations.values()).await?;

        let user_rows = self
            .store
            .select(
                "users",
                &["user_id", "username"],
                &[Filter::is_in("user_id", child_values)],
            )
            .await?;
        let users: Vec<User> = decode_rows(user_rows)?;
        let usernames: HashMap<i64, String> = users
            .into_iter()
            .filter_map(|u| u.username.map(|name| (u.user_id, name)))
            .collect();

        let mut enriched = Vec::new();
        for event in events {
            if event
                .risk_type
                .as_deref()
                .unwrap_or_default()
                .eq_ignore_ascii_case(NO_RISK)
            {
                continue;
            }
            let conversation = event
                .conversation_id
                .and_then(|id| conversations.get(&id));
            let chatbot = conversation
                .and_then(|c| c.chatbot_id)
                .and_then(|id| chatbots.get(&id));

            enriched.push(RiskyConversation {
                username: event
                    .child_user_id
                    .and_then(|id| usernames.get(&id).cloned())
                    .unwrap_or_else(|| UNKNOWN_USER.to_string()),
                risky_event_id: event.risky_event_id,
                conversation_id: event.conversation_id,
                conversation_topics: conversation.and_then(|c| c.topic.clone()),
                conversation_summarization: conversation
                    .and_then(|c| c.summary.clone())
                    .unwrap_or_else(|| NO_SUMMARY.to_string()),
                risk_type: event
                    .risk_type
                    .unwrap_or_else(|| UNKNOWN_RISK.to_string()),
                risk_level: capitalize(event.risk_level.as_deref().unwrap_or(UNKNOWN_LEVEL)),
                risky_reason: event.reason.unwrap_or_else(|| NO_REASON.to_string()),
                timestamp: event
                    .timestamp
                    .unwrap_or_else(|| UNKNOWN_TIMESTAMP.to_string()),
                chatbot_platform: chatbot
                    .and_then(|b| b.platform.clone())
                    .unwrap_or_else(|| UNKNOWN_PLATFORM.to_string()),
                chatbot_description: chatbot
                    .and_then(|b| b.name.clone())
                    .unwrap_or_else(|| UNKNOWN_CHATBOT.to_string()),
            });
        }
        Ok(enriched)
    }

    pub async fn conversation_overviews(
        &self,
        parent_user_id: i64,
    ) -> Result<Vec<ConversationOverview>> {
        let children = self.child_ids(parent_user_id).await?;
        if children.is_empty() {
            return Ok(Vec::new());
        }
        let child_values: Vec<Value> = children.into_iter().map(Value::from).collect();

        let conversations = self
            .conversations_for(&[Filter::is_in("child_user_id", child_values)])
            .await?;
        if conversations.is_empty() {
            return Ok(Vec::new());
        }

        let chatbots = self.chatbots_by_id(conversations.iter()).await?;

        Ok(conversations
            .into_iter()
            .map(|conversation| {
                let chatbot = conversation
                    .chatbot_id
                    .and_then(|id| chatbots.get(&id));
                ConversationOverview {
                    conversation_id: conversation.conversation_id,
                    start_time: conversation.start_time,
                    end_time: conversation.end_time,
                    conversation_topics: conversation.topic,
                    conversation_summarization: conversation
                        .summary
                        .unwrap_or_else(|| NO_SUMMARY.to_string()),
                    chatbot_platform: chatbot
                        .and_then(|b| b.platform.clone())
                        .unwrap_or_else(|| UNKNOWN_PLATFORM.to_string()),
                    chatbot_description: chatbot
                        .and_then(|b| b.name.clone())
                        .unwrap_or_else(|| UNKNOWN_CHATBOT.to_string()),
                }
            })
            .collect())
    }

    /// Looks up one risky event and walks event -> conversation -> chatbot.
    /// A miss at any stage yields `None`, never an error.
    pub async fn risky_event_detail(
        &self,
        risky_event_id: i64,
    ) -> Result<Option<RiskyEventDetail>> {
        let event_rows = self
            .store
            .select(
                "risky_events",
                &[
                    "risky_event_id",
                    "timestamp",
                    "risk_type",
                    "risk_level",
                    "reason",
                    "conversation_id",
                ],
                &[Filter::eq("risky_event_id", risky_event_id)],
            )
            .await?;
        let Some(event) = decode_rows::<RiskyEvent>(event_rows)?.into_iter().next() else {
            return Ok(None);
        };
        let Some(conversation_id) = event.conversation_id else {
            return Ok(None);
        };

        let conversations = self
            .conversations_for(&[Filter::eq("conversation_id", conversation_id)])
            .await?;
        let Some(conversation) = conversations.into_iter().next() else {
            return Ok(None);
        };
        let Some(chatbot_id) = conversation.chatbot_id else {
            return Ok(None);
        };

        let chatbot_rows = self
            .store
            .select(
                "chatbots",
                &["chatbot_id", "name", "platform"],
                &[Filter::eq("chatbot_id", chatbot_id)],
            )
            .await?;
        let Some(chatbot) = decode_rows::<Chatbot>(chatbot_rows)?.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(RiskyEventDetail {
            risky_event_id: event.risky_event_id,
            conversation_id: Some(conversation_id),
            conversation_topics: conversation.topic,
            conversation_summarization: conversation
                .summary
                .unwrap_or_else(|| NO_SUMMARY.to_string()),
            risk_type: event
                .risk_type
                .unwrap_or_else(|| UNKNOWN_RISK.to_string()),
            risk_level: event
                .risk_level
                .unwrap_or_else(|| UNKNOWN_LEVEL.to_string()),
            risky_reason: event.reason.unwrap_or_else(|| NO_REASON.to_string()),
            timestamp: event
                .timestamp
                .unwrap_or_else(|| UNKNOWN_TIMESTAMP.to_string()),
            chatbot_platform: chatbot
                .platform
                .unwrap_or_else(|| UNKNOWN_PLATFORM.to_string()),
            chatbot_description: chatbot
                .name
                .unwrap_or_else(|| UNKNOWN_CHATBOT.to_string()),
        }))
    }

    pub async fn conversation_times(&self, parent_user_id: i64) -> Result<Vec<ConversationTimes>> {
        let children = self.child_ids(parent_user_id).await?;
        if children.is_empty() {
            return Ok(Vec::new());
        }
        let child_values: Vec<Value> = children.into_iter().map(Value::from).collect();

        let rows = self
            .store
            .select(
                "conversations",
                &["conversation_id", "start_time", "end_time"],
                &[Filter::is_in("child_user_id", child_values)],
            )
            .await?;
        let conversations: Vec<Conversation> = decode_rows(rows)?;

        Ok(conversations
            .into_iter()
            .map(|conversation| ConversationTimes {
                conversation_id: conversation.conversation_id,
                start_time: conversation
                    .start_time
                    .unwrap_or_else(|| UNKNOWN_START.to_string()),
                end_time: conversation
                    .end_time
                    .unwrap_or_else(|| UNKNOWN_END.to_string()),
            })
            .collect())
    }
}

/// First character uppercased, the rest lowercased ("HIGH" -> "High").
fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}
