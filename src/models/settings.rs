use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::entry::EntryType;

/// Which entries the summary covers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataScope {
    #[default]
    Month,
    All,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    DateDesc,
    DateAsc,
    AmountDesc,
    AmountAsc,
}

impl SortOrder {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "date_desc" => Some(SortOrder::DateDesc),
            "date_asc" => Some(SortOrder::DateAsc),
            "amount_desc" => Some(SortOrder::AmountDesc),
            "amount_asc" => Some(SortOrder::AmountAsc),
            _ => None,
        }
    }
}

/// Per-user display preferences
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub default_type: EntryType,
    pub data_scope: DataScope,
    /// Always within 1..=28
    #[schema(minimum = 1, maximum = 28)]
    pub month_start_day: u8,
    pub sort_order: SortOrder,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_type: EntryType::Expense,
            data_scope: DataScope::Month,
            month_start_day: 1,
            sort_order: SortOrder::DateDesc,
        }
    }
}
