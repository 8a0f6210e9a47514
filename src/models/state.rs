use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::category::CategoryCatalog;
use crate::models::entry::Entry;
use crate::models::recurring::RecurringRule;
use crate::models::settings::Settings;
use crate::models::summary::BudgetSummary;

/// Everything one user has stored. This is both the wire and the storage shape.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FinancialState {
    /// Monthly goal, never negative
    pub budget: f64,
    /// In insertion order
    pub entries: Vec<Entry>,
    pub recurring_rules: Vec<RecurringRule>,
    pub settings: Settings,
    pub category_catalog: CategoryCatalog,
}

impl FinancialState {
    pub fn entry_index(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    pub fn rule_index(&self, id: &str) -> Option<usize> {
        self.recurring_rules.iter().position(|r| r.id == id)
    }
}

/// State document plus totals derived from it
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StateView {
    #[serde(flatten)]
    pub state: FinancialState,
    pub summary: BudgetSummary,
}
