pub mod auth;
pub mod category;
pub mod entry;
pub mod recurring;
pub mod settings;
pub mod state;
pub mod summary;
pub mod user;

pub use auth::{Session, SessionResponse, SessionToken};
pub use category::{Category, CategoryCatalog, CategoryPayload};
pub use entry::{Entry, EntryPayload, EntryType};
pub use recurring::{Frequency, RecurringRule, RecurringRulePayload};
pub use settings::{DataScope, Settings, SortOrder};
pub use state::{FinancialState, StateView};
pub use summary::BudgetSummary;
pub use user::{CredentialsRequest, User};
