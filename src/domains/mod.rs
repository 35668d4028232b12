pub mod chat;
pub mod risk;
pub mod user;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{NestwatchError, Result};

/// Decodes raw gateway rows into typed records. A row the store hands back that
/// does not decode is an upstream fault, not caller input.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(|e| NestwatchError::Upstream(e.to_string())))
        .collect()
}
