use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::entry::EntryType;

/// Expense categories every new user starts with
pub const DEFAULT_EXPENSE_CATEGORIES: &[&str] = &[
    "Groceries",
    "Mortgage/Rent",
    "Water",
    "Gas",
    "Electric",
    "Transportation",
    "Dining",
    "Entertainment",
    "Healthcare",
    "Car Insurance",
    "Credit Cards",
    "Loans",
    "Student Loans",
    "Childcare",
    "Education",
    "Internet",
    "Cellphone",
    "Shopping",
    "Personal Care",
    "Travel",
    "Gifts",
    "Taxes",
    "Other",
];

/// Income categories every new user starts with
pub const DEFAULT_INCOME_CATEGORIES: &[&str] = &[
    "Salary",
    "Freelance",
    "Business",
    "Interest",
    "Dividends",
    "Rental Income",
    "Refund",
    "Gift",
    "Other Income",
];

pub const EXPENSE_CATEGORY_COLORS: &[&str] = &[
    "#246aaf", "#ad4e3b", "#2e8f6b", "#7557a8", "#b07723", "#1f7e91", "#5b5d90", "#97754e",
];

pub const INCOME_CATEGORY_COLORS: &[&str] = &[
    "#2a8f6d", "#4f7fc2", "#7b64bf", "#3f9c96", "#a67d2a", "#6a8d3b",
];

/// Palette used for categories of the given type
pub fn palette_for(entry_type: EntryType) -> &'static [&'static str] {
    match entry_type {
        EntryType::Income => INCOME_CATEGORY_COLORS,
        EntryType::Expense => EXPENSE_CATEGORY_COLORS,
    }
}

/// A named, colored bucket entries can be tagged with
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[schema(example = "#246aaf")]
    pub color: String,
}

/// Categories per entry type. Names are unique per type, ignoring case.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CategoryCatalog {
    pub expense: Vec<Category>,
    pub income: Vec<Category>,
}

impl CategoryCatalog {
    pub fn empty() -> Self {
        Self {
            expense: Vec::new(),
            income: Vec::new(),
        }
    }

    pub fn of_type(&self, entry_type: EntryType) -> &[Category] {
        match entry_type {
            EntryType::Income => &self.income,
            EntryType::Expense => &self.expense,
        }
    }

    pub fn of_type_mut(&mut self, entry_type: EntryType) -> &mut Vec<Category> {
        match entry_type {
            EntryType::Income => &mut self.income,
            EntryType::Expense => &mut self.expense,
        }
    }

    /// Case-insensitive lookup by name
    pub fn find(&self, entry_type: EntryType, name: &str) -> Option<&Category> {
        let wanted = name.trim().to_lowercase();
        self.of_type(entry_type)
            .iter()
            .find(|c| c.name.trim().to_lowercase() == wanted)
    }
}

impl Default for CategoryCatalog {
    fn default() -> Self {
        fn build(entry_type: EntryType, names: &[&str]) -> Vec<Category> {
            let palette = palette_for(entry_type);
            names
                .iter()
                .enumerate()
                .map(|(index, name)| Category {
                    id: format!("{}_{}", entry_type.as_str(), index + 1),
                    name: name.to_string(),
                    color: palette[index % palette.len()].to_string(),
                })
                .collect()
        }

        Self {
            expense: build(EntryType::Expense, DEFAULT_EXPENSE_CATEGORIES),
            income: build(EntryType::Income, DEFAULT_INCOME_CATEGORIES),
        }
    }
}

/// Request payload for adding a single category
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "type": "expense",
    "name": "Coffee",
    "color": "#97754e"
}))]
pub struct CategoryPayload {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub name: String,
    pub color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_matches_builtin_lists() {
        let catalog = CategoryCatalog::default();
        assert_eq!(catalog.expense.len(), DEFAULT_EXPENSE_CATEGORIES.len());
        assert_eq!(catalog.income.len(), DEFAULT_INCOME_CATEGORIES.len());
        assert_eq!(catalog.expense[0].id, "expense_1");
        assert_eq!(catalog.expense[0].color, "#246aaf");
        // Palette wraps around after eight expense colors
        assert_eq!(catalog.expense[8].color, catalog.expense[0].color);
        assert_eq!(catalog.income[6].color, catalog.income[0].color);
    }

    #[test]
    fn test_find_ignores_case_and_whitespace() {
        let catalog = CategoryCatalog::default();
        let found = catalog.find(EntryType::Expense, "  mortgage/RENT ");
        assert_eq!(found.map(|c| c.name.as_str()), Some("Mortgage/Rent"));
        assert!(catalog.find(EntryType::Income, "Groceries").is_none());
    }
}
