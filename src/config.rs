// Process configuration, resolved once at startup by the binaries
// Library code receives these values as plain arguments

use crate::alerts::Budgets;
use crate::error::{Error, Result};
use crate::pagination::DEFAULT_PAGE_SIZE;
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_DATABASE_PATH: &str = "expenses.db";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    /// Allowed categories, in display order
    pub categories: Vec<String>,
    pub budgets: Budgets,
    pub page_size: i64,
}

impl Config {
    /// Read from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Variables:
    /// - `EXPENSE_DB` database file (default `expenses.db`)
    /// - `EXPENSE_CATEGORIES` comma separated allow-list (required)
    /// - `BUDGETS` JSON object of lowercase category -> amount (optional)
    /// - `PAGE_SIZE` listing page size (optional)
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let categories: Vec<String> = lookup("EXPENSE_CATEGORIES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|category| !category.is_empty())
            .map(str::to_string)
            .collect();

        if categories.is_empty() {
            return Err(Error::Config(
                "EXPENSE_CATEGORIES must list at least one category".to_string(),
            ));
        }

        let budgets = match lookup("BUDGETS") {
            Some(json) => Budgets::from_json(&json),
            None => Budgets::new(),
        };

        let page_size = match lookup("PAGE_SIZE") {
            Some(raw) => raw.trim().parse::<i64>().unwrap_or_else(|_| {
                warn!(value = %raw, "PAGE_SIZE is not a number, using default");
                DEFAULT_PAGE_SIZE as i64
            }),
            None => DEFAULT_PAGE_SIZE as i64,
        };

        Ok(Config {
            database_path: lookup("EXPENSE_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            categories,
            budgets,
            page_size,
        })
    }
}
