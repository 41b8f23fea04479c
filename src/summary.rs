// Aggregation engine - monthly/yearly statistics over a user's expenses
// One store query per statistic; nothing is cached between calls

use crate::alerts::{evaluate, BudgetAlert, Budgets};
use crate::criteria::Criteria;
use crate::db::{CategoryAverage, CategoryTotal, ExpenseStore};
use crate::error::Result;
use crate::money::Money;
use serde::Serialize;
use tracing::debug;

/// Everything the dashboard shows for one (user, year, month)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub criteria: Criteria,
    pub total: Money,
    pub category_totals: Vec<CategoryTotal>,
    pub category_averages: Vec<CategoryAverage>,
    pub years: Vec<i32>,
    pub alerts: Vec<BudgetAlert>,
}

pub struct SummaryService<'s, S: ExpenseStore> {
    store: &'s S,
}

impl<'s, S: ExpenseStore> SummaryService<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn total_expenditure(&self, criteria: &Criteria) -> Result<Money> {
        self.store.sum_amounts(criteria)
    }

    pub fn category_totals(&self, criteria: &Criteria) -> Result<Vec<CategoryTotal>> {
        self.store.sum_amounts_by_category(criteria)
    }

    pub fn category_averages(&self, criteria: &Criteria) -> Result<Vec<CategoryAverage>> {
        self.store.average_amounts_by_category(criteria)
    }

    pub fn years(&self, user_id: i64) -> Result<Vec<i32>> {
        self.store.list_expenditure_years(user_id)
    }

    /// Budget overruns for the period
    pub fn alerts(&self, criteria: &Criteria, budgets: &Budgets) -> Result<Vec<BudgetAlert>> {
        if budgets.is_empty() {
            debug!("no budgets configured, skipping alerts");
            return Ok(Vec::new());
        }
        let totals = self.category_totals(criteria)?;
        Ok(evaluate(&totals, budgets))
    }

    /// Alerts are evaluated from the same per-category totals that are returned
    pub fn dashboard(&self, criteria: &Criteria, budgets: &Budgets) -> Result<Dashboard> {
        let category_totals = self.category_totals(criteria)?;
        let alerts = evaluate(&category_totals, budgets);
        debug!(
            user_id = criteria.user_id(),
            categories = category_totals.len(),
            alerts = alerts.len(),
            "dashboard computed"
        );

        Ok(Dashboard {
            criteria: *criteria,
            total: self.total_expenditure(criteria)?,
            category_totals,
            category_averages: self.category_averages(criteria)?,
            years: self.years(criteria.user_id())?,
            alerts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{setup_database, SqliteExpenseStore};
    use crate::expense::{Expense, ExpenseChanges, NewExpense};
    use chrono::NaiveDate;
    use rusqlite::Connection;
    use std::cell::Cell;

    /// Delegates to SQLite and counts grouped-sum queries
    struct CountingStore<'c> {
        inner: SqliteExpenseStore<'c>,
        category_sums: Cell<usize>,
    }

    impl ExpenseStore for CountingStore<'_> {
        fn find(&self, id: i64) -> Result<Option<Expense>> {
            self.inner.find(id)
        }
        fn find_by(&self, criteria: &Criteria, offset: u64, limit: u64) -> Result<Vec<Expense>> {
            self.inner.find_by(criteria, offset, limit)
        }
        fn count_by(&self, criteria: &Criteria) -> Result<u64> {
            self.inner.count_by(criteria)
        }
        fn count_for_user(&self, user_id: i64) -> Result<u64> {
            self.inner.count_for_user(user_id)
        }
        fn list_expenditure_years(&self, user_id: i64) -> Result<Vec<i32>> {
            self.inner.list_expenditure_years(user_id)
        }
        fn sum_amounts(&self, criteria: &Criteria) -> Result<Money> {
            self.inner.sum_amounts(criteria)
        }
        fn sum_amounts_by_category(&self, criteria: &Criteria) -> Result<Vec<CategoryTotal>> {
            self.category_sums.set(self.category_sums.get() + 1);
            self.inner.sum_amounts_by_category(criteria)
        }
        fn average_amounts_by_category(&self, criteria: &Criteria) -> Result<Vec<CategoryAverage>> {
            self.inner.average_amounts_by_category(criteria)
        }
        fn save(&self, expense: &NewExpense) -> Result<Expense> {
            self.inner.save(expense)
        }
        fn save_all(&self, expenses: &[NewExpense]) -> Result<usize> {
            self.inner.save_all(expenses)
        }
        fn update(&self, id: i64, changes: &ExpenseChanges) -> Result<bool> {
            self.inner.update(id, changes)
        }
        fn delete(&self, id: i64) -> Result<()> {
            self.inner.delete(id)
        }
    }

    fn seed(store: &SqliteExpenseStore<'_>) {
        let rows = [
            (1, (2023, 6, 2), "Food", 4000),
            (1, (2024, 6, 1), "Food", 6000),
            (1, (2024, 6, 15), "Food", 8000),
            (1, (2024, 6, 20), "Transport", 1500),
            (1, (2024, 7, 1), "Rent", 90000),
            (2, (2024, 6, 3), "Food", 100000),
        ];
        for (user_id, (y, m, d), category, cents) in rows {
            store
                .save(&NewExpense {
                    user_id,
                    date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
                    category: category.to_string(),
                    amount: Money::from_cents(cents),
                    description: format!("{} {}", category, cents),
                })
                .unwrap();
        }
    }

    #[test]
    fn test_total_unfiltered_is_everything_owned() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let store = SqliteExpenseStore::new(&conn);
        seed(&store);

        let service = SummaryService::new(&store);
        let total = service
            .total_expenditure(&Criteria::for_user(1).unwrap())
            .unwrap();

        assert_eq!(total.cents(), 4000 + 6000 + 8000 + 1500 + 90000);
    }

    #[test]
    fn test_month_only_total_spans_years() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let store = SqliteExpenseStore::new(&conn);
        seed(&store);

        let service = SummaryService::new(&store);
        let june = Criteria::new(1, 0, 6).unwrap();

        assert_eq!(service.total_expenditure(&june).unwrap().cents(), 19500);
    }

    #[test]
    fn test_dashboard_for_month() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let store = SqliteExpenseStore::new(&conn);
        seed(&store);

        let service = SummaryService::new(&store);
        let budgets = Budgets::from_pairs([("food", 100.0), ("rent", 1000.0)]);
        let dashboard = service
            .dashboard(&Criteria::new(1, 2024, 6).unwrap(), &budgets)
            .unwrap();

        assert_eq!(dashboard.total.cents(), 15500);
        assert_eq!(dashboard.years, vec![2024, 2023]);
        assert_eq!(dashboard.category_totals.len(), 2);
        assert_eq!(
            dashboard.category_totals.iter().map(|t| t.total).sum::<Money>(),
            dashboard.total
        );

        let food_avg = dashboard
            .category_averages
            .iter()
            .find(|a| a.category == "Food")
            .unwrap();
        assert_eq!(food_avg.average_cents, 7000.0);

        assert_eq!(dashboard.alerts.len(), 1);
        assert_eq!(dashboard.alerts[0].category, "Food");
        assert_eq!(dashboard.alerts[0].spent, 140.0);
        assert_eq!(dashboard.alerts[0].over, 40.0);
    }

    #[test]
    fn test_empty_period_is_zero_not_error() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let store = SqliteExpenseStore::new(&conn);

        let service = SummaryService::new(&store);
        let dashboard = service
            .dashboard(&Criteria::new(9, 2030, 1).unwrap(), &Budgets::from_pairs([("food", 1.0)]))
            .unwrap();

        assert_eq!(dashboard.total, Money::zero());
        assert!(dashboard.category_totals.is_empty());
        assert!(dashboard.category_averages.is_empty());
        assert!(dashboard.years.is_empty());
        assert!(dashboard.alerts.is_empty());
    }

    #[test]
    fn test_dashboard_queries_category_totals_once() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let store = CountingStore {
            inner: SqliteExpenseStore::new(&conn),
            category_sums: Cell::new(0),
        };
        seed(&store.inner);

        let budgets = Budgets::from_pairs([("food", 1.0)]);
        let dashboard = SummaryService::new(&store)
            .dashboard(&Criteria::new(1, 2024, 6).unwrap(), &budgets)
            .unwrap();

        assert_eq!(store.category_sums.get(), 1);
        assert_eq!(dashboard.alerts.len(), 1);
        assert_eq!(dashboard.alerts[0].spent, 140.0);
    }

    #[test]
    fn test_alerts_for_period() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let store = SqliteExpenseStore::new(&conn);
        seed(&store);

        let service = SummaryService::new(&store);
        let budgets = Budgets::from_pairs([("food", 100.0), ("rent", 1000.0)]);

        let june = service.alerts(&Criteria::new(1, 2024, 6).unwrap(), &budgets).unwrap();
        assert_eq!(june.len(), 1);
        assert_eq!(june[0].category, "Food");
        assert_eq!(june[0].over, 40.0);

        let july = service.alerts(&Criteria::new(1, 2024, 7).unwrap(), &budgets).unwrap();
        assert!(july.is_empty());

        assert!(service
            .alerts(&Criteria::new(1, 2024, 6).unwrap(), &Budgets::new())
            .unwrap()
            .is_empty());
    }
}
