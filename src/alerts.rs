// Budget alerts - per-category spend compared against configured budgets
// Missing or malformed budget configuration means "no budgets", never an error

use crate::db::CategoryTotal;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

// ============================================================================
// BUDGETS
// ============================================================================

/// Lowercase category name -> threshold in major units
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Budgets(HashMap<String, f64>);

impl Budgets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        Budgets(
            pairs
                .into_iter()
                .map(|(category, budget)| (category.as_ref().trim().to_lowercase(), budget))
                .collect(),
        )
    }

    /// Parse a flat JSON object such as `{"food": 100, "transport": 50.5}`.
    /// Anything unparsable degrades to an empty map; non-numeric entries are skipped.
    pub fn from_json(json: &str) -> Self {
        let object = match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(object)) => object,
            Ok(other) => {
                warn!(kind = %json_kind(&other), "budget configuration is not an object, ignoring it");
                return Self::new();
            }
            Err(e) => {
                warn!(error = %e, "budget configuration is not valid JSON, ignoring it");
                return Self::new();
            }
        };

        let mut pairs = Vec::with_capacity(object.len());
        for (category, value) in &object {
            match value.as_f64() {
                Some(budget) => pairs.push((category.as_str(), budget)),
                None => warn!(%category, "budget is not a number, skipping"),
            }
        }

        Self::from_pairs(pairs)
    }

    /// Case-insensitive lookup
    pub fn get(&self, category: &str) -> Option<f64> {
        self.0.get(&category.trim().to_lowercase()).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// ALERTS
// ============================================================================

/// Spend over budget for one category, all amounts in major units
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetAlert {
    pub category: String,
    pub spent: f64,
    pub budget: f64,
    pub over: f64,
}

impl fmt::Display for BudgetAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Budget exceeded in category {}: {:.2} € spent out of {:.2} € allocated. You went over by {:.2} €.",
            self.category, self.spent, self.budget, self.over
        )
    }
}

/// Alerts for every category whose total exceeds its budget.
/// Output follows the order of `totals`.
pub fn evaluate(totals: &[CategoryTotal], budgets: &Budgets) -> Vec<BudgetAlert> {
    totals
        .iter()
        .filter_map(|total| {
            let budget = budgets.get(&total.category)?;
            let spent = total.total.to_major();

            (spent > budget).then(|| BudgetAlert {
                category: total.category.clone(),
                spent,
                budget,
                over: spent - budget,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    fn total(category: &str, cents: i64) -> CategoryTotal {
        CategoryTotal {
            category: category.to_string(),
            total: Money::from_cents(cents),
        }
    }

    #[test]
    fn test_single_overrun() {
        let totals = vec![total("Food", 12000), total("Transport", 3000)];
        let budgets = Budgets::from_json(r#"{"food": 100.0, "transport": 50.0}"#);

        let alerts = evaluate(&totals, &budgets);

        assert_eq!(
            alerts,
            vec![BudgetAlert {
                category: "Food".to_string(),
                spent: 120.0,
                budget: 100.0,
                over: 20.0,
            }]
        );
        assert_eq!(
            alerts[0].to_string(),
            "Budget exceeded in category Food: 120.00 € spent out of 100.00 € allocated. You went over by 20.00 €."
        );
    }

    #[test]
    fn test_spend_equal_to_budget_is_fine() {
        let budgets = Budgets::from_pairs([("food", 100.0)]);
        assert!(evaluate(&[total("Food", 10000)], &budgets).is_empty());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let budgets = Budgets::from_json(r#"{"Groceries": 10}"#);

        assert_eq!(budgets.get("GROCERIES"), Some(10.0));
        assert_eq!(evaluate(&[total("groceries", 1001)], &budgets).len(), 1);
    }

    #[test]
    fn test_category_without_budget_never_alerts() {
        let budgets = Budgets::from_pairs([("food", 1.0)]);
        assert!(evaluate(&[total("Rent", 500_000)], &budgets).is_empty());
    }

    #[test]
    fn test_malformed_configuration_degrades_to_empty() {
        assert!(Budgets::from_json("").is_empty());
        assert!(Budgets::from_json("not json").is_empty());
        assert!(Budgets::from_json("[1, 2]").is_empty());

        let partial = Budgets::from_json(r#"{"food": "lots", "rent": 900}"#);
        assert_eq!(partial.len(), 1);
        assert_eq!(partial.get("rent"), Some(900.0));
    }
}
