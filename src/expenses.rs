// Expense service - listing, validated writes and transactional CSV import
// Validation always runs before the store is touched

use crate::criteria::Criteria;
use crate::db::ExpenseStore;
use crate::error::{Error, Result};
use crate::expense::{Expense, ExpenseInput, NewExpense};
use crate::pagination::{Page, PageRequest};
use serde::Serialize;
use tracing::info;

/// The expenses page: year selector plus one page of matching expenses
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseListing {
    pub years: Vec<i32>,
    pub page: Page<Expense>,
}

pub struct ExpenseService<'s, S: ExpenseStore> {
    store: &'s S,
    categories: &'s [String],
}

impl<'s, S: ExpenseStore> ExpenseService<'s, S> {
    /// `categories` is the allow-list every write is validated against
    pub fn new(store: &'s S, categories: &'s [String]) -> Self {
        Self { store, categories }
    }

    /// Page totals are scoped to the same criteria as the page itself
    pub fn list(&self, criteria: &Criteria, request: PageRequest) -> Result<ExpenseListing> {
        let items = self
            .store
            .find_by(criteria, request.offset(), request.limit())?;
        let total = self.store.count_by(criteria)?;

        Ok(ExpenseListing {
            years: self.store.list_expenditure_years(criteria.user_id())?,
            page: Page::new(items, request, total),
        })
    }

    /// All expenses of the user regardless of period
    pub fn count(&self, user_id: i64) -> Result<u64> {
        self.store.count_for_user(user_id)
    }

    /// `Ok(None)` if missing, `Forbidden` if owned by someone else
    pub fn find_owned(&self, user_id: i64, id: i64) -> Result<Option<Expense>> {
        match self.store.find(id)? {
            Some(expense) if expense.user_id != user_id => Err(Error::Forbidden { id, user_id }),
            other => Ok(other),
        }
    }

    pub fn create(&self, user_id: i64, input: &ExpenseInput) -> Result<Expense> {
        let draft = NewExpense::from_input(user_id, input, self.categories)?;
        self.store.save(&draft)
    }

    /// Writes only the fields that changed. `Ok(false)` when nothing changed
    /// or the expense does not exist.
    pub fn update(&self, user_id: i64, id: i64, input: &ExpenseInput) -> Result<bool> {
        let Some(existing) = self.find_owned(user_id, id)? else {
            return Ok(false);
        };

        let draft = NewExpense::from_input(user_id, input, self.categories)?;
        let changes = existing.changes_to(&draft);
        if changes.is_empty() {
            return Ok(false);
        }

        self.store.update(id, &changes)
    }

    /// Missing ids are ignored
    pub fn delete(&self, user_id: i64, id: i64) -> Result<()> {
        if self.find_owned(user_id, id)?.is_some() {
            self.store.delete(id)?;
            info!(id, user_id, "expense deleted");
        }
        Ok(())
    }

    /// Validate every row, then insert them all in one transaction.
    /// Returns the imported count only when every row made it in.
    pub fn import_rows(&self, user_id: i64, rows: &[ExpenseInput]) -> Result<usize> {
        let drafts = rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                NewExpense::from_input(user_id, row, self.categories).map_err(|e| Error::Import {
                    row: index + 1,
                    source: Box::new(e),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let imported = self.store.save_all(&drafts)?;
        info!(user_id, imported, "csv import finished");
        Ok(imported)
    }
}
