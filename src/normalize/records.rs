//! Whole-record sanitizers built from the scalar normalizers.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{
    clamp_month_start_day, coerce_non_negative, field, normalize_category_name,
    normalize_color_text, normalize_date, normalize_date_time, normalize_frequency,
    parse_amount, text_of, Rejection,
};
use crate::models::category::{palette_for, Category, CategoryCatalog};
use crate::models::entry::{Entry, EntryType};
use crate::models::recurring::RecurringRule;
use crate::models::settings::{DataScope, Settings, SortOrder};
use crate::models::state::FinancialState;

pub(crate) const ENTRY_ID_PREFIX: &str = "id_";
pub(crate) const RULE_ID_PREFIX: &str = "rule_";

pub(crate) fn generate_id(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4().simple())
}

fn generate_category_id(entry_type: EntryType) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}_{}", entry_type.as_str(), &hex[..10])
}

/// Supplied id, trimmed, or a fresh one
fn id_or_generate(fields: &Map<String, Value>, prefix: &str) -> String {
    let id = text_of(field(fields, "id")).trim().to_string();
    if id.is_empty() {
        generate_id(prefix)
    } else {
        id
    }
}

/// The type must be spelled out; there is no default at this layer
fn explicit_entry_type(fields: &Map<String, Value>) -> Result<EntryType, Rejection> {
    field(fields, "type")
        .as_str()
        .and_then(EntryType::from_wire)
        .ok_or(Rejection::InvalidType)
}

fn required_category(
    fields: &Map<String, Value>,
    entry_type: EntryType,
) -> Result<String, Rejection> {
    let category = normalize_category_name(entry_type, &text_of(field(fields, "category")));
    if category.is_empty() {
        return Err(Rejection::EmptyCategory);
    }
    Ok(category)
}

/// Validates an income/expense record.
///
/// Rejects a missing or unknown type, an empty category and any amount
/// [`parse_amount`] refuses. An unparsable `createdAt` becomes now, a missing
/// id is generated. An object-valued `meta` is carried through untouched.
/// Feeding the result back in yields the same entry.
pub fn sanitize_entry(raw: &Value) -> Result<Entry, Rejection> {
    let fields = raw.as_object().ok_or(Rejection::NotAnObject)?;
    let entry_type = explicit_entry_type(fields)?;
    let category = required_category(fields, entry_type)?;
    let amount = parse_amount(field(fields, "amount"))?;

    Ok(Entry {
        id: id_or_generate(fields, ENTRY_ID_PREFIX),
        entry_type,
        category,
        amount,
        note: text_of(field(fields, "note")),
        created_at: normalize_date_time(field(fields, "createdAt")).unwrap_or_else(Utc::now),
        meta: field(fields, "meta").as_object().cloned(),
    })
}

/// Validates a recurring rule. Same type/category/amount contract as entries;
/// frequency and due date fall back instead of rejecting, and a rule stays
/// active unless `active` is literally `false`.
pub fn sanitize_recurring_rule(raw: &Value) -> Result<RecurringRule, Rejection> {
    let fields = raw.as_object().ok_or(Rejection::NotAnObject)?;
    let entry_type = explicit_entry_type(fields)?;
    let category = required_category(fields, entry_type)?;
    let amount = parse_amount(field(fields, "amount"))?;

    Ok(RecurringRule {
        id: id_or_generate(fields, RULE_ID_PREFIX),
        entry_type,
        category,
        amount,
        note: text_of(field(fields, "note")),
        frequency: normalize_frequency(field(fields, "frequency")),
        next_due: normalize_date(field(fields, "nextDue"))
            .unwrap_or_else(|| Utc::now().date_naive()),
        active: !matches!(field(fields, "active"), Value::Bool(false)),
    })
}

/// Never rejects; each field falls back to its default on its own
pub fn sanitize_settings(raw: &Value) -> Settings {
    let Some(fields) = raw.as_object() else {
        return Settings::default();
    };

    let default_type = match field(fields, "defaultType").as_str() {
        Some("income") => EntryType::Income,
        _ => EntryType::Expense,
    };
    let data_scope = match field(fields, "dataScope").as_str() {
        Some("all") => DataScope::All,
        _ => DataScope::Month,
    };
    let sort_order = field(fields, "sortOrder")
        .as_str()
        .and_then(SortOrder::from_wire)
        .unwrap_or_default();

    Settings {
        default_type,
        data_scope,
        month_start_day: clamp_month_start_day(field(fields, "monthStartDay")),
        sort_order,
    }
}

/// Palette color picked from the name, so a name always gets the same color
pub fn fallback_color(entry_type: EntryType, seed: &str) -> &'static str {
    let seed = if seed.is_empty() { "x" } else { seed };
    let total: u64 = seed.chars().map(|ch| u64::from(u32::from(ch))).sum();
    let palette = palette_for(entry_type);
    palette[(total % palette.len() as u64) as usize]
}

fn sort_categories(categories: &mut [Category]) {
    categories.sort_by_cached_key(|category| category.name.to_lowercase());
}

/// Adds `name` to the catalog unless a case-insensitive match exists.
///
/// New categories get a generated id and `preferred_color` (normalized) or the
/// name-derived fallback color; the list is then re-sorted by name. Returns
/// whether anything was added.
pub fn ensure_category_exists(
    catalog: &mut CategoryCatalog,
    entry_type: EntryType,
    name: &str,
    preferred_color: Option<&str>,
) -> bool {
    let name = name.trim();
    if name.is_empty() || catalog.find(entry_type, name).is_some() {
        return false;
    }

    let color = match preferred_color.map(str::trim).filter(|c| !c.is_empty()) {
        Some(color) => normalize_color_text(color),
        None => fallback_color(entry_type, name).to_string(),
    };

    let categories = catalog.of_type_mut(entry_type);
    categories.push(Category {
        id: generate_category_id(entry_type),
        name: name.to_string(),
        color,
    });
    sort_categories(categories);
    true
}

/// Lenient catalog cleanup. Drops blank names and case-insensitive duplicates
/// (first one wins), renames legacy expense names, fills ids and colors.
/// Order is kept as given. Anything that is not an object yields the default
/// catalog.
pub fn sanitize_category_catalog(raw: &Value) -> CategoryCatalog {
    let Some(fields) = raw.as_object() else {
        return CategoryCatalog::default();
    };

    let mut catalog = CategoryCatalog::empty();
    for entry_type in [EntryType::Expense, EntryType::Income] {
        let items = field(fields, entry_type.as_str())
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default();
        let categories = catalog.of_type_mut(entry_type);
        let mut names = HashSet::new();
        let mut ids = HashSet::new();

        for item in items.iter().filter_map(Value::as_object) {
            let name = normalize_category_name(entry_type, &text_of(field(item, "name")));
            if name.is_empty() || !names.insert(name.to_lowercase()) {
                continue;
            }

            let mut id = text_of(field(item, "id")).trim().to_string();
            if id.is_empty() || ids.contains(&id) {
                id = generate_category_id(entry_type);
            }
            ids.insert(id.clone());

            let color = text_of(field(item, "color"));
            let color = if color.trim().is_empty() {
                fallback_color(entry_type, &name).to_string()
            } else {
                normalize_color_text(&color)
            };

            categories.push(Category { id, name, color });
        }
    }
    catalog
}

fn entry_id(entry: &mut Entry) -> &mut String {
    &mut entry.id
}

fn rule_id(rule: &mut RecurringRule) -> &mut String {
    &mut rule.id
}

/// Keeps every record that sanitizes, logs the rest, and reissues clashing ids
fn collect_lenient<T>(
    raw: &Value,
    kind: &'static str,
    sanitize: fn(&Value) -> Result<T, Rejection>,
    id_of: fn(&mut T) -> &mut String,
    prefix: &str,
) -> Vec<T> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match sanitize(item) {
            Ok(mut record) => {
                let id = id_of(&mut record);
                if !seen.insert(id.clone()) {
                    *id = generate_id(prefix);
                    seen.insert(id.clone());
                }
                records.push(record);
            }
            Err(rejection) => {
                tracing::warn!(kind, index, reason = %rejection, "dropping invalid stored record");
            }
        }
    }
    records
}

/// Rebuilds a state document that may have been damaged at rest.
///
/// Never fails: the budget falls back to zero, bad records are dropped, and
/// settings and catalog heal field by field.
pub fn sanitize_state(raw: &Value) -> FinancialState {
    let Some(fields) = raw.as_object() else {
        tracing::warn!("stored state is not an object, starting from defaults");
        return FinancialState::default();
    };

    FinancialState {
        budget: coerce_non_negative(field(fields, "budget"), 0.0),
        entries: collect_lenient(
            field(fields, "entries"),
            "entry",
            sanitize_entry,
            entry_id,
            ENTRY_ID_PREFIX,
        ),
        recurring_rules: collect_lenient(
            field(fields, "recurringRules"),
            "recurring_rule",
            sanitize_recurring_rule,
            rule_id,
            RULE_ID_PREFIX,
        ),
        settings: sanitize_settings(field(fields, "settings")),
        category_catalog: sanitize_category_catalog(field(fields, "categoryCatalog")),
    }
}
