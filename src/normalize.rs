//! Coercion of untrusted JSON into well-formed domain values.
//!
//! Every function here is total: it either returns a usable value, a
//! documented fallback, or a [`Rejection`]. Nothing performs I/O.
//!
//! Two policies live side by side. Data the user typed (amounts, categories,
//! entry types) must come through exactly or be refused, see
//! [`parse_amount`] and [`sanitize_entry`]. Preferences and presentation data
//! (settings, colors, frequencies) fall back field by field instead.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::models::entry::EntryType;
use crate::models::recurring::Frequency;

pub mod records;

pub use records::{
    ensure_category_exists, fallback_color, sanitize_category_catalog, sanitize_entry,
    sanitize_recurring_rule, sanitize_settings, sanitize_state,
};

/// Color used when a supplied color is not `#rrggbb`
pub const DEFAULT_CATEGORY_COLOR: &str = "#2f7db5";

/// Bump together with [`LEGACY_EXPENSE_CATEGORY_RENAMES`] whenever a rename is added
pub const LEGACY_RENAMES_VERSION: u32 = 1;

/// Old expense category names and what they are called now.
/// Keys are lowercase; lookups lowercase the trimmed input first.
pub const LEGACY_EXPENSE_CATEGORY_RENAMES: &[(&str, &str)] = &[
    ("rent", "Mortgage/Rent"),
    ("utilities", "Electric"),
    ("insurance", "Car Insurance"),
    ("debt payment", "Loans"),
    ("phone/internet", "Internet"),
];

const NAIVE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

pub(crate) static NULL: Value = Value::Null;

/// Why an untrusted record was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("expected a JSON object")]
    NotAnObject,

    #[error("expected a JSON array")]
    NotAList,

    #[error("type must be \"income\" or \"expense\"")]
    InvalidType,

    #[error("category must not be empty")]
    EmptyCategory,

    #[error("name must not be empty")]
    EmptyName,

    #[error("amount must be a finite, non-negative number")]
    InvalidAmount,
}

impl Rejection {
    /// Name of the offending field, `None` when the whole value is wrong
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Rejection::NotAnObject | Rejection::NotAList => None,
            Rejection::InvalidType => Some("type"),
            Rejection::EmptyCategory => Some("category"),
            Rejection::EmptyName => Some("name"),
            Rejection::InvalidAmount => Some("amount"),
        }
    }
}

/// Field of a JSON object, `Null` when absent
pub(crate) fn field<'a>(fields: &'a serde_json::Map<String, Value>, key: &str) -> &'a Value {
    fields.get(key).unwrap_or(&NULL)
}

/// Text form of a scalar. Strings as-is, numbers printed, everything else empty.
pub(crate) fn text_of(raw: &Value) -> String {
    match raw {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    }
}

/// Strict amount parsing for values the user typed.
///
/// Accepts JSON numbers and numeric strings. Negative, non-finite and
/// non-numeric input is rejected.
pub fn parse_amount(raw: &Value) -> Result<f64, Rejection> {
    let amount = match raw {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or(Rejection::InvalidAmount)?;

    if !amount.is_finite() || amount < 0.0 {
        return Err(Rejection::InvalidAmount);
    }
    // Folds -0.0 into 0.0
    Ok(if amount == 0.0 { 0.0 } else { amount })
}

/// Lenient amount parsing: anything [`parse_amount`] refuses becomes `default`
pub fn coerce_non_negative(raw: &Value, default: f64) -> f64 {
    parse_amount(raw).unwrap_or(default)
}

/// Trims the name and, for expenses, maps legacy names onto current ones.
///
/// Unknown names pass through. Empty input gives an empty string which the
/// caller has to reject.
pub fn normalize_category_name(entry_type: EntryType, raw: &str) -> String {
    let name = raw.trim();
    if name.is_empty() {
        return String::new();
    }
    if entry_type == EntryType::Expense {
        let key = name.to_lowercase();
        if let Some((_, renamed)) = LEGACY_EXPENSE_CATEGORY_RENAMES
            .iter()
            .find(|(legacy, _)| *legacy == key)
        {
            return renamed.to_string();
        }
    }
    name.to_string()
}

/// `#rrggbb` in lowercase, or [`DEFAULT_CATEGORY_COLOR`]
pub fn normalize_color(raw: &Value) -> String {
    normalize_color_text(&text_of(raw))
}

pub(crate) fn normalize_color_text(raw: &str) -> String {
    let text = raw.trim().to_lowercase();
    let is_hex = text.len() == 7
        && text.starts_with('#')
        && text[1..].chars().all(|ch| ch.is_ascii_hexdigit());
    if is_hex {
        text
    } else {
        DEFAULT_CATEGORY_COLOR.to_string()
    }
}

/// Day of month a budget period starts on, always within 1..=28
pub fn clamp_month_start_day(raw: &Value) -> u8 {
    let parsed = match raw {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|value| value.is_finite())
                .map(|value| value.trunc() as i64)
        }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(day) => day.clamp(1, 28) as u8,
        None => 1,
    }
}

/// Known frequency, case-insensitive; anything else is monthly
pub fn normalize_frequency(raw: &Value) -> Frequency {
    let text = text_of(raw).trim().to_lowercase();
    Frequency::ALL
        .into_iter()
        .find(|frequency| frequency.as_str() == text)
        .unwrap_or_default()
}

/// ISO-8601 timestamp in UTC. Naive timestamps and bare dates are read as UTC.
pub fn normalize_date_time(raw: &Value) -> Option<DateTime<Utc>> {
    let Value::String(text) = raw else {
        return None;
    };
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Calendar date; a full timestamp is cut down to its UTC date
pub fn normalize_date(raw: &Value) -> Option<NaiveDate> {
    if let Value::String(text) = raw {
        if let Ok(date) = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
            return Some(date);
        }
    }
    normalize_date_time(raw).map(|timestamp| timestamp.date_naive())
}
