use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Column predicate applied to a gateway read or write.
#[derive(Debug, Clone)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn is_in(column: &str, values: Vec<Value>) -> Self {
        Filter::In(column.to_string(), values)
    }
}

/// The seam in front of the hosted relational store. Everything above this trait
/// joins in application code; everything below is one filtered round trip.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Returns the rows matching every filter, projected to `columns`
    /// (empty slice or `["*"]` selects all columns).
    async fn select(&self, table: &str, columns: &[&str], filters: &[Filter])
        -> Result<Vec<Value>>;

    /// Inserts one row and returns the stored representation.
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Applies `patch` to every matching row and returns the updated rows.
    async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<Vec<Value>>;

    /// Deletes every matching row and returns how many were removed.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64>;
}
