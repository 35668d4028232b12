#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};

use nestwatch::error::{NestwatchError, Result};
use nestwatch::interfaces::store::{Filter, StorageGateway};
use nestwatch::providers::memory::InMemoryStore;

/// In-memory store shaped like the hosted one: serial user ids, unique
/// surrogate keys on the allocated tables.
pub fn monitoring_store() -> InMemoryStore {
    InMemoryStore::new()
        .with_serial_key("users", "user_id")
        .with_unique_key("chatbots", "chatbot_id")
        .with_unique_key("conversations", "conversation_id")
        .with_unique_key("risky_events", "risky_event_id")
        .with_unique_key("messages", "message_id")
}

pub async fn seed_parent_with_children(
    store: &InMemoryStore,
    parent: i64,
    children: &[(i64, &str)],
) {
    store
        .seed(
            "users",
            json!({"user_id": parent, "username": "parent", "role": "parent", "user_age": 40}),
        )
        .await;
    for (child_id, name) in children {
        store
            .seed(
                "users",
                json!({"user_id": child_id, "username": name, "role": "child", "user_age": 10}),
            )
            .await;
        store
            .seed(
                "parent_child_relations",
                json!({"parent_user_id": parent, "child_user_id": child_id}),
            )
            .await;
    }
}

/// Counts gateway round trips so tests can assert short-circuits.
pub struct CountingStore {
    inner: InMemoryStore,
    selects: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            selects: AtomicUsize::new(0),
        }
    }

    pub fn select_count(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageGateway for CountingStore {
    async fn select(
        &self,
        table: &str,
        columns: &[&str],
        filters: &[Filter],
    ) -> Result<Vec<Value>> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        self.inner.select(table, columns, filters).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<Vec<Value>> {
        self.inner.update(table, patch, filters).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        self.inner.delete(table, filters).await
    }
}

/// Every call fails as if the hosted store were unreachable.
pub struct FailingStore;

#[async_trait]
impl StorageGateway for FailingStore {
    async fn select(
        &self,
        _table: &str,
        _columns: &[&str],
        _filters: &[Filter],
    ) -> Result<Vec<Value>> {
        Err(NestwatchError::Upstream("store unreachable".to_string()))
    }

    async fn insert(&self, _table: &str, _row: Value) -> Result<Value> {
        Err(NestwatchError::Upstream("store unreachable".to_string()))
    }

    async fn update(
        &self,
        _table: &str,
        _patch: Value,
        _filters: &[Filter],
    ) -> Result<Vec<Value>> {
        Err(NestwatchError::Upstream("store unreachable".to_string()))
    }

    async fn delete(&self, _table: &str, _filters: &[Filter]) -> Result<u64> {
        Err(NestwatchError::Upstream("store unreachable".to_string()))
    }
}

/// Delegates to an in-memory store but rejects inserts into one table, for
/// exercising partial-write recovery.
pub struct FailTableStore {
    pub inner: InMemoryStore,
    pub fail_inserts_into: &'static str,
}

#[async_trait]
impl StorageGateway for FailTableStore {
    async fn select(
        &self,
        table: &str,
        columns: &[&str],
        filters: &[Filter],
    ) -> Result<Vec<Value>> {
        self.inner.select(table, columns, filters).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        if table == self.fail_inserts_into {
            return Err(NestwatchError::Upstream(format!(
                "insert into {table} rejected"
            )));
        }
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<Vec<Value>> {
        self.inner.update(table, patch, filters).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        self.inner.delete(table, filters).await
    }
}
