use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::entry::EntryType;

/// How often a recurring rule comes due
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
pub enum Frequency {
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "bi-weekly")]
    BiWeekly,
    #[serde(rename = "semi-monthly")]
    SemiMonthly,
    #[serde(rename = "monthly")]
    #[default]
    Monthly,
}

impl Frequency {
    pub const ALL: [Frequency; 4] = [
        Frequency::Weekly,
        Frequency::BiWeekly,
        Frequency::SemiMonthly,
        Frequency::Monthly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::BiWeekly => "bi-weekly",
            Frequency::SemiMonthly => "semi-monthly",
            Frequency::Monthly => "monthly",
        }
    }
}

/// Template for an entry that should repeat
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecurringRule {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub category: String,
    pub amount: f64,
    pub note: String,
    pub frequency: Frequency,
    #[schema(format = "date", example = "2026-03-01")]
    pub next_due: NaiveDate,
    pub active: bool,
}

/// Request payload for creating or updating a recurring rule
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "type": "income",
    "category": "Salary",
    "amount": 3200.0,
    "frequency": "bi-weekly",
    "nextDue": "2026-03-06",
    "active": true
}))]
pub struct RecurringRulePayload {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub category: String,
    pub amount: f64,
    pub note: Option<String>,
    pub frequency: Option<Frequency>,
    pub next_due: Option<NaiveDate>,
    pub active: Option<bool>,
}
