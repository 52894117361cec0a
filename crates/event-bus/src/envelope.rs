//! Event envelope carried on the bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named event with a JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: Uuid,
    pub name: String,
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

impl BusEvent {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            payload,
            emitted_at: Utc::now(),
        }
    }

    /// True when the payload carries no data (`null` or `{}`)
    pub fn is_empty_payload(&self) -> bool {
        match &self.payload {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}
