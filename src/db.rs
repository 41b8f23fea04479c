// Expense Store - SQLite schema and the persistence interface behind every query
// Filters are always bound as parameters, never spliced into SQL

use crate::criteria::Criteria;
use crate::error::{Error, Result};
use crate::expense::{Expense, ExpenseChanges, NewExpense, DATE_FORMAT};
use crate::money::Money;
use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const EXPENSE_COLUMNS: &str = "id, user_id, date, category, amount_cents, description";

/// Per-category sum of matching expenses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Money,
}

/// Per-category mean of matching expenses.
/// Average of minor units, so not necessarily a whole number of cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAverage {
    pub category: String,
    pub average_cents: f64,
}

impl CategoryAverage {
    pub fn average_major(&self) -> f64 {
        self.average_cents / 100.0
    }
}

/// Persistence interface consumed by the aggregation engine and services.
/// Aggregates over zero matching rows are zero/empty, never errors.
pub trait ExpenseStore {
    /// `Ok(None)` when no expense has this id
    fn find(&self, id: i64) -> Result<Option<Expense>>;

    /// Matching expenses, newest date first (ties by id ascending).
    /// `limit` must be at least 1.
    fn find_by(&self, criteria: &Criteria, offset: u64, limit: u64) -> Result<Vec<Expense>>;

    /// Number of expenses matching the full criteria (year/month included)
    fn count_by(&self, criteria: &Criteria) -> Result<u64>;

    /// Number of expenses owned by the user, ignoring year/month
    fn count_for_user(&self, user_id: i64) -> Result<u64>;

    /// Distinct years with at least one expense, descending
    fn list_expenditure_years(&self, user_id: i64) -> Result<Vec<i32>>;

    fn sum_amounts(&self, criteria: &Criteria) -> Result<Money>;

    fn sum_amounts_by_category(&self, criteria: &Criteria) -> Result<Vec<CategoryTotal>>;

    fn average_amounts_by_category(&self, criteria: &Criteria) -> Result<Vec<CategoryAverage>>;

    fn save(&self, expense: &NewExpense) -> Result<Expense>;

    /// Insert all or nothing; returns the number inserted
    fn save_all(&self, expenses: &[NewExpense]) -> Result<usize>;

    /// Write only the given fields. `Ok(false)` when there is nothing to write
    /// or the id does not exist.
    fn update(&self, id: i64, changes: &ExpenseChanges) -> Result<bool>;

    /// Deleting a missing id is not an error
    fn delete(&self, id: i64) -> Result<()>;
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            category TEXT NOT NULL,
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            description TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expenses_user_date ON expenses(user_id, date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expenses_user_category ON expenses(user_id, category)",
        [],
    )?;

    Ok(())
}

/// SQLite-backed store over a borrowed connection
pub struct SqliteExpenseStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteExpenseStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

fn map_expense(row: &Row<'_>) -> rusqlite::Result<Expense> {
    let date_str: String = row.get(2)?;
    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(Expense {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date,
        category: row.get(3)?,
        amount: Money::from_cents(row.get(4)?),
        description: row.get(5)?,
    })
}

fn insert_expense(conn: &Connection, expense: &NewExpense) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO expenses (user_id, date, category, amount_cents, description)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            expense.user_id,
            expense.date.format(DATE_FORMAT).to_string(),
            expense.category,
            expense.amount.cents(),
            expense.description,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn to_sql_int(value: u64) -> Value {
    Value::Integer(i64::try_from(value).unwrap_or(i64::MAX))
}

impl ExpenseStore for SqliteExpenseStore<'_> {
    fn find(&self, id: i64) -> Result<Option<Expense>> {
        let sql = format!("SELECT {} FROM expenses WHERE id = ?1", EXPENSE_COLUMNS);
        let expense = self
            .conn
            .query_row(&sql, [id], map_expense)
            .optional()?;
        Ok(expense)
    }

    fn find_by(&self, criteria: &Criteria, offset: u64, limit: u64) -> Result<Vec<Expense>> {
        if limit == 0 {
            return Err(Error::validation("limit", "Limit must be at least 1."));
        }

        let predicate = criteria.predicate();
        let sql = format!(
            "SELECT {} FROM expenses {} ORDER BY date DESC, id ASC LIMIT ? OFFSET ?",
            EXPENSE_COLUMNS,
            predicate.where_clause()
        );
        debug!(%sql, params = predicate.params().len() + 2, "find_by");

        let mut stmt = self.conn.prepare(&sql)?;
        let expenses = stmt
            .query_map(
                params_from_iter(predicate.params_with([to_sql_int(limit), to_sql_int(offset)])),
                map_expense,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(expenses)
    }

    fn count_by(&self, criteria: &Criteria) -> Result<u64> {
        let predicate = criteria.predicate();
        let sql = format!("SELECT COUNT(*) FROM expenses {}", predicate.where_clause());
        debug!(%sql, "count_by");

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(predicate.params()), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_for_user(&self, user_id: i64) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM expenses WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn list_expenditure_years(&self, user_id: i64) -> Result<Vec<i32>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT CAST(strftime('%Y', date) AS INTEGER) AS year
             FROM expenses
             WHERE user_id = ?1
             ORDER BY year DESC",
        )?;

        let years = stmt
            .query_map([user_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i32>>>()?;

        Ok(years)
    }

    fn sum_amounts(&self, criteria: &Criteria) -> Result<Money> {
        let predicate = criteria.predicate();
        let sql = format!(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM expenses {}",
            predicate.where_clause()
        );
        debug!(%sql, "sum_amounts");

        let cents: i64 = self
            .conn
            .query_row(&sql, params_from_iter(predicate.params()), |row| row.get(0))?;
        Ok(Money::from_cents(cents))
    }

    fn sum_amounts_by_category(&self, criteria: &Criteria) -> Result<Vec<CategoryTotal>> {
        let predicate = criteria.predicate();
        let sql = format!(
            "SELECT category, SUM(amount_cents) AS total
             FROM expenses {}
             GROUP BY category
             ORDER BY category",
            predicate.where_clause()
        );
        debug!(%sql, "sum_amounts_by_category");

        let mut stmt = self.conn.prepare(&sql)?;
        let totals = stmt
            .query_map(params_from_iter(predicate.params()), |row| {
                Ok(CategoryTotal {
                    category: row.get(0)?,
                    total: Money::from_cents(row.get(1)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(totals)
    }

    fn average_amounts_by_category(&self, criteria: &Criteria) -> Result<Vec<CategoryAverage>> {
        let predicate = criteria.predicate();
        let sql = format!(
            "SELECT category, AVG(amount_cents) AS average
             FROM expenses {}
             GROUP BY category
             ORDER BY category",
            predicate.where_clause()
        );
        debug!(%sql, "average_amounts_by_category");

        let mut stmt = self.conn.prepare(&sql)?;
        let averages = stmt
            .query_map(params_from_iter(predicate.params()), |row| {
                Ok(CategoryAverage {
                    category: row.get(0)?,
                    average_cents: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(averages)
    }

    fn save(&self, expense: &NewExpense) -> Result<Expense> {
        let id = insert_expense(self.conn, expense)?;
        info!(id, user_id = expense.user_id, "expense saved");

        Ok(Expense {
            id,
            user_id: expense.user_id,
            date: expense.date,
            category: expense.category.clone(),
            amount: expense.amount,
            description: expense.description.clone(),
        })
    }

    fn save_all(&self, expenses: &[NewExpense]) -> Result<usize> {
        // Dropping the transaction without commit rolls everything back
        let tx = self.conn.unchecked_transaction()?;

        for (index, expense) in expenses.iter().enumerate() {
            insert_expense(&tx, expense).map_err(|e| Error::Import {
                row: index + 1,
                source: Box::new(Error::Store(e)),
            })?;
        }

        tx.commit()?;
        info!(count = expenses.len(), "expenses saved in one transaction");
        Ok(expenses.len())
    }

    fn update(&self, id: i64, changes: &ExpenseChanges) -> Result<bool> {
        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(date) = changes.date {
            assignments.push("date = ?");
            values.push(Value::Text(date.format(DATE_FORMAT).to_string()));
        }
        if let Some(category) = &changes.category {
            assignments.push("category = ?");
            values.push(Value::Text(category.clone()));
        }
        if let Some(amount) = changes.amount {
            assignments.push("amount_cents = ?");
            values.push(Value::Integer(amount.cents()));
        }
        if let Some(description) = &changes.description {
            assignments.push("description = ?");
            values.push(Value::Text(description.clone()));
        }

        if assignments.is_empty() {
            return Ok(false);
        }

        let sql = format!("UPDATE expenses SET {} WHERE id = ?", assignments.join(", "));
        values.push(Value::Integer(id));
        debug!(%sql, "update");

        let updated = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(updated > 0)
    }

    fn delete(&self, id: i64) -> Result<()> {
        let deleted = self.conn.execute("DELETE FROM expenses WHERE id = ?1", [id])?;
        debug!(id, deleted, "delete");
        Ok(())
    }
}
