// Expense Tracker - Core Library
// Query, aggregation and budget alert engine shared by the CLI and API server

pub mod alerts;
pub mod config;
pub mod criteria;
pub mod db;
pub mod error;
pub mod expense;
pub mod expenses;
pub mod import;
pub mod money;
pub mod pagination;
pub mod summary;

use std::sync::Once;

// Re-export commonly used types
pub use alerts::{evaluate, BudgetAlert, Budgets};
pub use config::Config;
pub use criteria::Criteria;
pub use db::{
    setup_database, CategoryAverage, CategoryTotal, ExpenseStore, SqliteExpenseStore,
};
pub use error::{Error, Result, ValidationErrors};
pub use expense::{Expense, ExpenseChanges, ExpenseInput, NewExpense};
pub use expenses::{ExpenseListing, ExpenseService};
pub use money::{Money, MoneyError};
pub use pagination::{Page, PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use summary::{Dashboard, SummaryService};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

static INIT_TRACING: Once = Once::new();

/// Install the global tracing subscriber (`RUST_LOG` overrides the default level)
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("expense_tracker=info"));

        fmt().with_env_filter(filter).init();
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_tracing_is_idempotent() {
        super::init_tracing();
        super::init_tracing();
    }
}
