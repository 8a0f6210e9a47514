use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::category::CategoryCatalog;
use crate::models::entry::{Entry, EntryType};
use crate::models::recurring::RecurringRule;
use crate::models::state::{FinancialState, StateView};
use crate::models::summary::BudgetSummary;
use crate::normalize::{
    ensure_category_exists, field, normalize_category_name, normalize_date, normalize_date_time,
    parse_amount, sanitize_category_catalog, sanitize_entry, sanitize_recurring_rule,
    sanitize_settings, text_of, Rejection,
};
use crate::repositories::{RepositoryError, StateRepository, StateStore};

/// State service errors
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Invalid {}: {}", .field.as_deref().unwrap_or("request body"), .reason)]
    Rejected {
        /// Path of the offending value, e.g. `entries[2].amount`
        field: Option<String>,
        reason: Rejection,
    },

    #[error("An item with id '{0}' already exists")]
    DuplicateId(String),

    #[error("Entry not found")]
    EntryNotFound,

    #[error("Recurring rule not found")]
    RuleNotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<RepositoryError> for StateError {
    fn from(err: RepositoryError) -> Self {
        StateError::DatabaseError(err.to_string())
    }
}

impl StateError {
    /// `prefix.field` when both exist, whichever one exists otherwise
    fn rejected(prefix: Option<&str>, reason: Rejection) -> Self {
        let field = match (prefix, reason.field()) {
            (Some(prefix), Some(name)) => Some(format!("{}.{}", prefix, name)),
            (Some(prefix), None) => Some(prefix.to_string()),
            (None, name) => name.map(str::to_string),
        };
        StateError::Rejected { field, reason }
    }

    fn rejected_at(field: &str, reason: Rejection) -> Self {
        StateError::Rejected {
            field: Some(field.to_string()),
            reason,
        }
    }
}

/// Trait defining operations on a user's financial state.
/// Every payload is untrusted JSON and goes through `normalize` first.
#[async_trait]
pub trait StateService: Send + Sync {
    async fn get_state(&self, user_id: Uuid) -> Result<StateView, StateError>;

    /// Replace the sections present in `raw`, keep the others
    async fn replace_state(&self, user_id: Uuid, raw: Value) -> Result<StateView, StateError>;

    async fn add_entry(&self, user_id: Uuid, raw: Value) -> Result<Entry, StateError>;

    async fn update_entry(
        &self,
        user_id: Uuid,
        entry_id: &str,
        raw: Value,
    ) -> Result<Entry, StateError>;

    /// Returns whether an entry was removed
    async fn delete_entry(&self, user_id: Uuid, entry_id: &str) -> Result<bool, StateError>;

    async fn add_rule(&self, user_id: Uuid, raw: Value) -> Result<RecurringRule, StateError>;

    async fn update_rule(
        &self,
        user_id: Uuid,
        rule_id: &str,
        raw: Value,
    ) -> Result<RecurringRule, StateError>;

    async fn delete_rule(&self, user_id: Uuid, rule_id: &str) -> Result<bool, StateError>;

    async fn update_settings(&self, user_id: Uuid, raw: Value) -> Result<StateView, StateError>;

    async fn update_budget(&self, user_id: Uuid, raw: Value) -> Result<StateView, StateError>;

    async fn replace_categories(&self, user_id: Uuid, raw: Value)
        -> Result<StateView, StateError>;

    async fn add_category(&self, user_id: Uuid, raw: Value) -> Result<StateView, StateError>;
}

/// Implementation of StateService
pub struct StateServiceImpl {
    store: StateStore,
}

impl StateServiceImpl {
    pub fn new(repository: Arc<dyn StateRepository>) -> Self {
        Self {
            store: StateStore::new(repository),
        }
    }

    fn view(state: FinancialState) -> StateView {
        let summary = BudgetSummary::compute(&state, Utc::now().date_naive());
        StateView { state, summary }
    }

    /// Payload fields with the path id written over whatever id the body carried
    fn with_path_id(raw: Value, id: &str) -> Result<Map<String, Value>, StateError> {
        let Value::Object(mut fields) = raw else {
            return Err(StateError::rejected(None, Rejection::NotAnObject));
        };
        fields.insert("id".to_string(), Value::String(id.to_string()));
        Ok(fields)
    }
}

/// Every item must sanitize and ids must be unique, or nothing is accepted
fn sanitize_all<T>(
    raw: &Value,
    section: &str,
    sanitize: fn(&Value) -> Result<T, Rejection>,
    id_of: fn(&T) -> &str,
) -> Result<Vec<T>, StateError> {
    let items = raw
        .as_array()
        .ok_or_else(|| StateError::rejected_at(section, Rejection::NotAList))?;

    let mut ids = HashSet::new();
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let record = sanitize(item).map_err(|reason| {
            StateError::rejected(Some(&format!("{}[{}]", section, index)), reason)
        })?;
        if !ids.insert(id_of(&record).to_string()) {
            return Err(StateError::DuplicateId(id_of(&record).to_string()));
        }
        records.push(record);
    }
    Ok(records)
}

fn entry_id(entry: &Entry) -> &str {
    &entry.id
}

fn rule_id(rule: &RecurringRule) -> &str {
    &rule.id
}

fn ensure_categories_of<'a>(
    catalog: &mut CategoryCatalog,
    used: impl IntoIterator<Item = (EntryType, &'a str)>,
) {
    for (entry_type, name) in used {
        ensure_category_exists(catalog, entry_type, name, None);
    }
}

#[async_trait]
impl StateService for StateServiceImpl {
    async fn get_state(&self, user_id: Uuid) -> Result<StateView, StateError> {
        let state = self.store.load_state(user_id).await?;
        Ok(Self::view(state))
    }

    async fn replace_state(&self, user_id: Uuid, raw: Value) -> Result<StateView, StateError> {
        let fields = raw
            .as_object()
            .ok_or_else(|| StateError::rejected(None, Rejection::NotAnObject))?;

        let budget = fields
            .get("budget")
            .map(|value| {
                parse_amount(value).map_err(|reason| StateError::rejected_at("budget", reason))
            })
            .transpose()?;
        let entries = fields
            .get("entries")
            .map(|value| sanitize_all(value, "entries", sanitize_entry, entry_id))
            .transpose()?;
        let rules = fields
            .get("recurringRules")
            .map(|value| {
                sanitize_all(value, "recurringRules", sanitize_recurring_rule, rule_id)
            })
            .transpose()?;
        let settings = fields.get("settings").map(sanitize_settings);
        let catalog = fields.get("categoryCatalog").map(sanitize_category_catalog);

        let ((), state) = self
            .store
            .mutate_state(user_id, move |state: &mut FinancialState| {
                if let Some(budget) = budget {
                    state.budget = budget;
                }
                if let Some(settings) = settings {
                    state.settings = settings;
                }
                if let Some(catalog) = catalog {
                    state.category_catalog = catalog;
                }
                if let Some(entries) = entries {
                    state.entries = entries;
                    ensure_categories_of(
                        &mut state.category_catalog,
                        state.entries.iter().map(|e| (e.entry_type, e.category.as_str())),
                    );
                }
                if let Some(rules) = rules {
                    state.recurring_rules = rules;
                    ensure_categories_of(
                        &mut state.category_catalog,
                        state
                            .recurring_rules
                            .iter()
                            .map(|r| (r.entry_type, r.category.as_str())),
                    );
                }
                Ok::<(), StateError>(())
            })
            .await?;

        tracing::info!(%user_id, "replaced state");
        Ok(Self::view(state))
    }

    async fn add_entry(&self, user_id: Uuid, raw: Value) -> Result<Entry, StateError> {
        let entry = sanitize_entry(&raw).map_err(|reason| StateError::rejected(None, reason))?;

        let (entry, _) = self
            .store
            .mutate_state(user_id, move |state: &mut FinancialState| {
                if state.entry_index(&entry.id).is_some() {
                    return Err(StateError::DuplicateId(entry.id));
                }
                state.entries.push(entry.clone());
                ensure_category_exists(
                    &mut state.category_catalog,
                    entry.entry_type,
                    &entry.category,
                    None,
                );
                Ok(entry)
            })
            .await?;

        Ok(entry)
    }

    async fn update_entry(
        &self,
        user_id: Uuid,
        entry_id: &str,
        raw: Value,
    ) -> Result<Entry, StateError> {
        let fields = Self::with_path_id(raw, entry_id)?;
        let keep_created_at = normalize_date_time(field(&fields, "createdAt")).is_none();
        let mut entry = sanitize_entry(&Value::Object(fields))
            .map_err(|reason| StateError::rejected(None, reason))?;

        let (entry, _) = self
            .store
            .mutate_state(user_id, move |state: &mut FinancialState| {
                let index = state
                    .entry_index(&entry.id)
                    .ok_or(StateError::EntryNotFound)?;
                if keep_created_at {
                    entry.created_at = state.entries[index].created_at;
                }
                state.entries[index] = entry.clone();
                ensure_category_exists(
                    &mut state.category_catalog,
                    entry.entry_type,
                    &entry.category,
                    None,
                );
                Ok::<Entry, StateError>(entry)
            })
            .await?;

        Ok(entry)
    }

    async fn delete_entry(&self, user_id: Uuid, entry_id: &str) -> Result<bool, StateError> {
        let (removed, _) = self
            .store
            .mutate_state(user_id, |state: &mut FinancialState| {
                let removed = match state.entry_index(entry_id) {
                    Some(index) => {
                        state.entries.remove(index);
                        true
                    }
                    None => false,
                };
                Ok::<bool, StateError>(removed)
            })
            .await?;

        Ok(removed)
    }

    async fn add_rule(&self, user_id: Uuid, raw: Value) -> Result<RecurringRule, StateError> {
        let rule =
            sanitize_recurring_rule(&raw).map_err(|reason| StateError::rejected(None, reason))?;

        let (rule, _) = self
            .store
            .mutate_state(user_id, move |state: &mut FinancialState| {
                if state.rule_index(&rule.id).is_some() {
                    return Err(StateError::DuplicateId(rule.id));
                }
                state.recurring_rules.push(rule.clone());
                ensure_category_exists(
                    &mut state.category_catalog,
                    rule.entry_type,
                    &rule.category,
                    None,
                );
                Ok(rule)
            })
            .await?;

        Ok(rule)
    }

    async fn update_rule(
        &self,
        user_id: Uuid,
        rule_id: &str,
        raw: Value,
    ) -> Result<RecurringRule, StateError> {
        let fields = Self::with_path_id(raw, rule_id)?;
        // Omitted schedule fields keep their stored values
        let keep_next_due = normalize_date(field(&fields, "nextDue")).is_none();
        let keep_active = !fields.contains_key("active");
        let mut rule = sanitize_recurring_rule(&Value::Object(fields))
            .map_err(|reason| StateError::rejected(None, reason))?;

        let (rule, _) = self
            .store
            .mutate_state(user_id, move |state: &mut FinancialState| {
                let index = state.rule_index(&rule.id).ok_or(StateError::RuleNotFound)?;
                let stored = &state.recurring_rules[index];
                if keep_next_due {
                    rule.next_due = stored.next_due;
                }
                if keep_active {
                    rule.active = stored.active;
                }
                state.recurring_rules[index] = rule.clone();
                ensure_category_exists(
                    &mut state.category_catalog,
                    rule.entry_type,
                    &rule.category,
                    None,
                );
                Ok::<RecurringRule, StateError>(rule)
            })
            .await?;

        Ok(rule)
    }

    async fn delete_rule(&self, user_id: Uuid, rule_id: &str) -> Result<bool, StateError> {
        let (removed, _) = self
            .store
            .mutate_state(user_id, |state: &mut FinancialState| {
                let before = state.recurring_rules.len();
                state.recurring_rules.retain(|rule| rule.id != rule_id);
                Ok::<bool, StateError>(state.recurring_rules.len() != before)
            })
            .await?;

        Ok(removed)
    }

    async fn update_settings(&self, user_id: Uuid, raw: Value) -> Result<StateView, StateError> {
        let settings = sanitize_settings(&raw);

        let ((), state) = self
            .store
            .mutate_state(user_id, move |state: &mut FinancialState| {
                state.settings = settings;
                Ok::<(), StateError>(())
            })
            .await?;

        Ok(Self::view(state))
    }

    async fn update_budget(&self, user_id: Uuid, raw: Value) -> Result<StateView, StateError> {
        let value = match raw.as_object() {
            Some(fields) => field(fields, "budget"),
            None => &raw,
        };
        let budget =
            parse_amount(value).map_err(|reason| StateError::rejected_at("budget", reason))?;

        let ((), state) = self
            .store
            .mutate_state(user_id, move |state: &mut FinancialState| {
                state.budget = budget;
                Ok::<(), StateError>(())
            })
            .await?;

        Ok(Self::view(state))
    }

    async fn replace_categories(
        &self,
        user_id: Uuid,
        raw: Value,
    ) -> Result<StateView, StateError> {
        if !raw.is_object() {
            return Err(StateError::rejected_at(
                "categoryCatalog",
                Rejection::NotAnObject,
            ));
        }
        let catalog = sanitize_category_catalog(&raw);

        // Entries keep their category names even if the catalog drops them
        let ((), state) = self
            .store
            .mutate_state(user_id, move |state: &mut FinancialState| {
                state.category_catalog = catalog;
                Ok::<(), StateError>(())
            })
            .await?;

        Ok(Self::view(state))
    }

    async fn add_category(&self, user_id: Uuid, raw: Value) -> Result<StateView, StateError> {
        let fields = raw
            .as_object()
            .ok_or_else(|| StateError::rejected(None, Rejection::NotAnObject))?;
        let entry_type = field(fields, "type")
            .as_str()
            .and_then(EntryType::from_wire)
            .ok_or_else(|| StateError::rejected(None, Rejection::InvalidType))?;
        let name = normalize_category_name(entry_type, &text_of(field(fields, "name")));
        if name.is_empty() {
            return Err(StateError::rejected(None, Rejection::EmptyName));
        }
        let color = text_of(field(fields, "color"));

        let ((), state) = self
            .store
            .mutate_state(user_id, move |state: &mut FinancialState| {
                let preferred = Some(color.as_str()).filter(|c| !c.trim().is_empty());
                ensure_category_exists(&mut state.category_catalog, entry_type, &name, preferred);
                Ok::<(), StateError>(())
            })
            .await?;

        Ok(Self::view(state))
    }
}
