// Expense records, drafts, partial updates and input validation

use crate::error::{Error, Result, ValidationErrors};
use crate::money::Money;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Storage format for the `date` column
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A persisted expense (identity assigned by the store)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub category: String,
    pub amount: Money,
    pub description: String,
}

/// An expense that has not been saved yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExpense {
    pub user_id: i64,
    pub date: NaiveDate,
    pub category: String,
    pub amount: Money,
    pub description: String,
}

/// Fields to write on update. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseChanges {
    pub date: Option<NaiveDate>,
    pub category: Option<String>,
    pub amount: Option<Money>,
    pub description: Option<String>,
}

impl ExpenseChanges {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.category.is_none()
            && self.amount.is_none()
            && self.description.is_none()
    }
}

/// Raw, unvalidated values as they arrive from a form or a CSV row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseInput {
    pub date: String,
    pub amount: String,
    pub description: String,
    pub category: String,
}

impl Expense {
    /// Only the fields of `draft` that differ from this record
    pub fn changes_to(&self, draft: &NewExpense) -> ExpenseChanges {
        ExpenseChanges {
            date: (self.date != draft.date).then_some(draft.date),
            category: (self.category != draft.category).then(|| draft.category.clone()),
            amount: (self.amount != draft.amount).then_some(draft.amount),
            description: (self.description != draft.description)
                .then(|| draft.description.clone()),
        }
    }
}

impl NewExpense {
    /// Validate raw input against the domain rules and the category allow-list.
    /// All failing fields are reported together.
    pub fn from_input(user_id: i64, input: &ExpenseInput, categories: &[String]) -> Result<Self> {
        let mut errors = ValidationErrors::new();

        let description = input.description.trim();
        if description.is_empty() {
            errors.add("description", "Description is required.");
        }

        let date = parse_date(&input.date);
        if date.is_none() {
            errors.add("date", "Invalid date.");
        }

        let amount = Money::parse_major(&input.amount)
            .ok()
            .filter(Money::is_positive);
        if amount.is_none() {
            errors.add("amount", "Must be a positive number.");
        }

        let category = match_category(&input.category, categories);
        if category.is_none() {
            errors.add("category", "Invalid category.");
        }

        match (date, amount, category) {
            (Some(date), Some(amount), Some(category)) if errors.is_empty() => Ok(NewExpense {
                user_id,
                date,
                category,
                amount,
                description: description.to_string(),
            }),
            _ => Err(Error::Validation(errors)),
        }
    }
}

/// Accepts `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` (time of day is dropped)
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Case-insensitive lookup; returns the allow-list spelling
pub fn match_category(input: &str, categories: &[String]) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    categories
        .iter()
        .find(|category| category.trim().eq_ignore_ascii_case(input))
        .map(|category| category.trim().to_string())
}
