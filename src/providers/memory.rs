use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::{NestwatchError, Result};
use crate::interfaces::store::{Filter, StorageGateway};

/// In-memory stand-in for the hosted store, mirroring the gateway contract.
///
/// Tables that need store-assigned surrogate keys or unique-key enforcement opt
/// in through `with_serial_key` / `with_unique_key`; everything else behaves as
/// a plain row bag, the way the hosted store does without constraints.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    serial_keys: HashMap<String, String>,
    unique_keys: HashMap<String, String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `column` = max+1 on insert when the row omits it.
    pub fn with_serial_key(mut self, table: &str, column: &str) -> Self {
        self.serial_keys
            .insert(table.to_string(), column.to_string());
        self
    }

    /// Rejects an insert whose `column` value already exists, as the hosted
    /// store's unique constraint would.
    pub fn with_unique_key(mut self, table: &str, column: &str) -> Self {
        self.unique_keys
            .insert(table.to_string(), column.to_string());
        self
    }

    #[doc(hidden)]
    pub async fn seed(&self, table: &str, row: Value) {
        let mut guard = self.tables.write().await;
        guard.entry(table.to_string()).or_default().push(row);
    }
}

#[async_trait]
impl StorageGateway for InMemoryStore {
    async fn select(
        &self,
        table: &str,
        columns: &[&str],
        filters: &[Filter],
    ) -> Result<Vec<Value>> {
        let guard = self.tables.read().await;
        let rows = guard.get(table).cloned().unwrap_or_default();
        Ok(rows
            .into_iter()
            .filter(|row| row_matches(row, filters))
            .map(|row| project(row, columns))
            .collect())
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let mut guard = self.tables.write().await;
        let rows = guard.entry(table.to_string()).or_default();

        let mut row = row;
        if let Some(column) = self.serial_keys.get(table) {
            if row.get(column).map_or(true, Value::is_null) {
                let next = rows
                    .iter()
                    .filter_map(|existing| existing.get(column).and_then(Value::as_i64))
                    .max()
                    .unwrap_or(0)
                    + 1;
                if let Some(object) = row.as_object_mut() {
                    object.insert(column.clone(), Value::from(next));
                }
            }
        }

        if let Some(column) = self.unique_keys.get(table) {
            if let Some(value) = row.get(column) {
                if !value.is_null() && rows.iter().any(|existing| existing.get(column) == Some(value))
                {
                    return Err(NestwatchError::Conflict(format!(
                        "duplicate {column} in {table}"
                    )));
                }
            }
        }

        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<Vec<Value>> {
        let patch = match patch {
            Value::Object(map) => map,
            other => {
                return Err(NestwatchError::Validation(format!(
                    "update patch must be an object, got {other}"
                )))
            }
        };

        let mut guard = self.tables.write().await;
        let rows = guard.entry(table.to_string()).or_default();
        let mut updated = Vec::new();
        for row in rows.iter_mut() {
            if row_matches(row, filters) {
                merge(row, &patch);
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let mut guard = self.tables.write().await;
        let rows = guard.entry(table.to_string()).or_default();
        let before = rows.len();
        rows.retain(|row| !row_matches(row, filters));
        Ok((before - rows.len()) as u64)
    }
}

fn row_matches(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(column, value) => row.get(column) == Some(value),
        Filter::In(column, values) => row
            .get(column)
            .is_some_and(|candidate| values.contains(candidate)),
    })
}

fn project(row: Value, columns: &[&str]) -> Value {
    if columns.is_empty() || columns == ["*"] {
        return row;
    }
    let mut projected = Map::new();
    for column in columns {
        if let Some(value) = row.get(*column) {
            projected.insert((*column).to_string(), value.clone());
        }
    }
    Value::Object(projected)
}

fn merge(row: &mut Value, patch: &Map<String, Value>) {
    if let Some(object) = row.as_object_mut() {
        for (key, value) in patch {
            object.insert(key.clone(), value.clone());
        }
    }
}
