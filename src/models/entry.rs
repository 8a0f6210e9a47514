use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Whether money came in or went out
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Income,
    Expense,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Income => "income",
            EntryType::Expense => "expense",
        }
    }

    /// Parse the exact wire spelling; anything else is not a type
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "income" => Some(EntryType::Income),
            "expense" => Some(EntryType::Expense),
            _ => None,
        }
    }
}

/// A single income or expense record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub category: String,
    pub amount: f64,
    pub note: String,
    pub created_at: DateTime<Utc>,
    /// Client-owned annotations such as `recurringRuleId`, stored as given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub meta: Option<Map<String, Value>>,
}

/// Request payload for creating or updating an entry
///
/// Only used for the API documentation; handlers accept raw JSON and run it
/// through the normalization pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "type": "expense",
    "category": "rent",
    "amount": 1250.0,
    "note": "March",
    "createdAt": "2026-03-01T09:00:00Z"
}))]
pub struct EntryPayload {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub category: String,
    pub amount: f64,
    pub note: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<Object>)]
    pub meta: Option<Map<String, Value>>,
}
