use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::domains::user::ROLE_CHILD;
use crate::error::{NestwatchError, Result};
use crate::interfaces::store::{Filter, StorageGateway};

/// An entity with its own surrogate-identifier space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Chatbot,
    Conversation,
    RiskyEvent,
    Message,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Chatbot,
        EntityKind::Conversation,
        EntityKind::RiskyEvent,
        EntityKind::Message,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Chatbot => "chatbots",
            EntityKind::Conversation => "conversations",
            EntityKind::RiskyEvent => "risky_events",
            EntityKind::Message => "messages",
        }
    }

    pub fn id_column(&self) -> &'static str {
        match self {
            EntityKind::Chatbot => "chatbot_id",
            EntityKind::Conversation => "conversation_id",
            EntityKind::RiskyEvent => "risky_event_id",
            EntityKind::Message => "message_id",
        }
    }
}

/// Mints surrogate identifiers by scanning a table for its current maximum.
///
/// The hosted store's query surface exposes no native sequence, so allocation
/// is max+1 over a fresh scan. That is only safe under a single writer: two
/// concurrent allocations for the same entity can mint the same identifier,
/// which the store's unique constraint rejects at insert time and the gateway
/// surfaces as `Conflict` (the caller may then retry with a fresh id).
pub struct IdAllocator {
    store: Arc<dyn StorageGateway>,
}

impl IdAllocator {
    pub fn new(store: Arc<dyn StorageGateway>) -> Self {
        Self { store }
    }

    /// Next identifier for `kind`: one past the largest existing value, 1 for
    /// an empty table. Counters are table-scoped, never partitioned by owner.
    pub async fn next_id(&self, kind: EntityKind) -> Result<i64> {
        let rows = self
            .store
            .select(kind.table(), &[kind.id_column()], &[])
            .await?;
        let max = rows
            .iter()
            .filter_map(|row| row.get(kind.id_column()).and_then(Value::as_i64))
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }
}

/// Identifier bundle handed to a client starting a new monitored session.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedIds {
    #[serde(rename = "conversationId")]
    pub conversation_id: i64,
    #[serde(rename = "riskEventId")]
    pub risk_event_id: i64,
    #[serde(rename = "chatbotId")]
    pub chatbot_id: i64,
    #[serde(rename = "messageId")]
    pub message_id: i64,
}

pub struct IdService {
    store: Arc<dyn StorageGateway>,
    allocator: IdAllocator,
}

impl IdService {
    pub fn new(store: Arc<dyn StorageGateway>) -> Self {
        let allocator = IdAllocator::new(store.clone());
        Self { store, allocator }
    }

    pub fn allocator(&self) -> &IdAllocator {
        &self.allocator
    }

    pub async fn verify_child_user(&self, child_user_id: i64) -> Result<bool> {
        let rows = self
            .store
            .select(
                "users",
                &["user_id"],
                &[
                    Filter::eq("user_id", child_user_id),
                    Filter::eq("role", ROLE_CHILD),
                ],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    /// Verifies the child user exists, then mints one identifier per entity
    /// kind. `platform` rides along on the request for symmetry with ingestion
    /// but does not scope any counter.
    pub async fn generate_for_child(
        &self,
        child_user_id: i64,
        _platform: &str,
    ) -> Result<GeneratedIds> {
        if !self.verify_child_user(child_user_id).await? {
            return Err(NestwatchError::NotFound(format!(
                "child user with id {child_user_id} not found"
            )));
        }

        let chatbot_id = self.allocator.next_id(EntityKind::Chatbot).await?;
        let conversation_id = self.allocator.next_id(EntityKind::Conversation).await?;
        let risk_event_id = self.allocator.next_id(EntityKind::RiskyEvent).await?;
        let message_id = self.allocator.next_id(EntityKind::Message).await?;

        Ok(GeneratedIds {
            conversation_id,
            risk_event_id,
            chatbot_id,
            message_id,
        })
    }
}
