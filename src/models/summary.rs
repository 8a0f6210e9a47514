use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::entry::EntryType;
use crate::models::settings::DataScope;
use crate::models::state::FinancialState;

/// Income/expense totals and how much of the budget is left
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSummary {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
    pub budget: f64,
    pub remaining: f64,
    /// First day of the budget period, absent when the scope is all entries
    pub period_start: Option<NaiveDate>,
    /// First day after the budget period
    pub period_end: Option<NaiveDate>,
}

/// Budget period containing `today` for a month that starts on `start_day`.
///
/// `start_day` is within 1..=28 so every month has that day.
pub fn budget_period(today: NaiveDate, start_day: u8) -> Option<(NaiveDate, NaiveDate)> {
    let day = u32::from(start_day.clamp(1, 28));
    let (year, month) = if today.day() >= day {
        (today.year(), today.month())
    } else if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    let start = NaiveDate::from_ymd_opt(year, month, day)?;
    let end = start.checked_add_months(Months::new(1))?;
    Some((start, end))
}

impl BudgetSummary {
    pub fn compute(state: &FinancialState, today: NaiveDate) -> Self {
        let period = match state.settings.data_scope {
            DataScope::Month => budget_period(today, state.settings.month_start_day),
            DataScope::All => None,
        };

        let in_scope = |date: NaiveDate| match period {
            Some((start, end)) => date >= start && date < end,
            None => true,
        };

        let (mut income, mut expense) = (0.0, 0.0);
        for entry in state
            .entries
            .iter()
            .filter(|e| in_scope(e.created_at.date_naive()))
        {
            match entry.entry_type {
                EntryType::Income => income += entry.amount,
                EntryType::Expense => expense += entry.amount,
            }
        }

        Self {
            income,
            expense,
            balance: income - expense,
            budget: state.budget,
            remaining: state.budget - expense,
            period_start: period.map(|(start, _)| start),
            period_end: period.map(|(_, end)| end),
        }
    }
}
