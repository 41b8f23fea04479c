// Criteria - typed filter (user, year, month) and its translation to SQL
// Year and month are independent predicates: month alone matches that month in every year

use crate::error::{Error, Result};
use rusqlite::types::Value;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Criteria {
    user_id: i64,
    year: i32,
    month: u32,
}

impl Criteria {
    /// `year == 0` and `month == 0` mean "unfiltered"
    pub fn new(user_id: i64, year: i32, month: u32) -> Result<Self> {
        if user_id == 0 {
            return Err(Error::validation("user_id", "User is required."));
        }
        if year < 0 {
            return Err(Error::validation("year", "Invalid year."));
        }
        if month > 12 {
            return Err(Error::validation("month", "Month must be between 1 and 12."));
        }
        Ok(Self {
            user_id,
            year,
            month,
        })
    }

    /// Every expense of the user
    pub fn for_user(user_id: i64) -> Result<Self> {
        Self::new(user_id, 0, 0)
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn year(&self) -> Option<i32> {
        (self.year != 0).then_some(self.year)
    }

    pub fn month(&self) -> Option<u32> {
        (self.month != 0).then_some(self.month)
    }

    pub fn predicate(&self) -> Predicate {
        Predicate::from_criteria(self)
    }
}

/// A parameterized WHERE fragment plus the values bound to it, in order
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    clauses: Vec<&'static str>,
    params: Vec<Value>,
}

impl Predicate {
    pub fn from_criteria(criteria: &Criteria) -> Self {
        let mut predicate = Predicate {
            clauses: Vec::new(),
            params: Vec::new(),
        };

        predicate.push("user_id = ?", Value::Integer(criteria.user_id));

        if let Some(year) = criteria.year() {
            predicate.push("strftime('%Y', date) = ?", Value::Text(format!("{:04}", year)));
        }

        if let Some(month) = criteria.month() {
            predicate.push("strftime('%m', date) = ?", Value::Text(format!("{:02}", month)));
        }

        predicate
    }

    fn push(&mut self, clause: &'static str, value: Value) {
        self.clauses.push(clause);
        self.params.push(value);
    }

    /// `WHERE a = ? AND b = ?`
    pub fn where_clause(&self) -> String {
        format!("WHERE {}", self.clauses.join(" AND "))
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Bound values followed by `extra` (e.g. LIMIT/OFFSET)
    pub fn params_with(&self, extra: impl IntoIterator<Item = Value>) -> Vec<Value> {
        self.params.iter().cloned().chain(extra).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_criteria() {
        assert!(Criteria::new(0, 2024, 1).is_err());
        assert!(Criteria::new(1, 2024, 13).is_err());
        assert!(Criteria::new(1, -1, 0).is_err());

        let err = Criteria::new(1, 2024, 13).unwrap_err();
        assert!(err.validation_errors().unwrap().contains("month"));
    }

    #[test]
    fn test_unfiltered_predicate() {
        let predicate = Criteria::for_user(5).unwrap().predicate();

        assert_eq!(predicate.where_clause(), "WHERE user_id = ?");
        assert_eq!(predicate.params(), &[Value::Integer(5)]);
    }

    #[test]
    fn test_year_and_month_are_separate_predicates() {
        let predicate = Criteria::new(5, 2024, 3).unwrap().predicate();

        assert_eq!(
            predicate.where_clause(),
            "WHERE user_id = ? AND strftime('%Y', date) = ? AND strftime('%m', date) = ?"
        );
        assert_eq!(
            predicate.params(),
            &[
                Value::Integer(5),
                Value::Text("2024".to_string()),
                Value::Text("03".to_string()),
            ]
        );
    }

    #[test]
    fn test_month_without_year() {
        let criteria = Criteria::new(5, 0, 11).unwrap();
        let predicate = criteria.predicate();

        assert_eq!(criteria.year(), None);
        assert_eq!(criteria.month(), Some(11));
        assert_eq!(
            predicate.where_clause(),
            "WHERE user_id = ? AND strftime('%m', date) = ?"
        );
        assert_eq!(
            predicate.params_with([Value::Integer(20), Value::Integer(0)]).len(),
            4
        );
    }
}
