//! Domain models for fincast
//!
//! Everything here is a plain value object supplied by the caller (the
//! persistence/HTTP layer). The core never queries storage itself: it is
//! handed monthly aggregates, raw expense records, an optional approved plan
//! snapshot, and — for reconciliation — a bank transaction with a pre-filtered
//! candidate pool.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated spend for one calendar month, produced by the caller from raw
/// transaction history. Lists are expected chronologically ordered and may
/// have gaps for months with no activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyStatistic {
    pub year: i32,
    pub month: u32,
    /// Number of expense records in the month
    pub count: usize,
    /// Total spend for the month
    pub total: f64,
    /// Mean expense amount for the month
    pub average: f64,
}

/// A raw historical expense record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub id: i64,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub amount: f64,
    pub request_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub counterparty: Option<String>,
}

/// Snapshot of an approved budget plan for the forecast period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSnapshot {
    /// Version number of the approved plan
    pub version: i32,
    pub approved_at: Option<DateTime<Utc>>,
    pub categories: Vec<PlanCategory>,
}

/// One category line of an approved plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCategory {
    pub category_id: Option<i64>,
    pub category_name: String,
    pub planned_amount: f64,
    /// Expense type label carried from the planning tool (opex, capex, ...)
    pub expense_type: Option<String>,
    /// Free-form justification entered by the planner
    pub justification: Option<String>,
    /// Calculation driver; `manual` is the default and carries no signal
    pub calculation_method: Option<String>,
}

impl PlanCategory {
    /// Find this category's planned amount lookup key
    pub fn name_key(&self) -> String {
        self.category_name.trim().to_lowercase()
    }
}

impl PlanSnapshot {
    /// Look up a plan line by lower-cased category name
    pub fn category_by_name(&self, name: &str) -> Option<&PlanCategory> {
        let key = name.trim().to_lowercase();
        self.categories.iter().find(|c| c.name_key() == key)
    }
}

/// An incoming bank statement line to reconcile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransaction {
    pub amount: f64,
    pub transaction_date: NaiveDate,
    pub counterparty_name: String,
    /// Taxpayer identification number of the counterparty, when the bank
    /// statement carries one
    pub counterparty_inn: Option<String>,
    pub category_id: Option<i64>,
    pub department_id: i64,
}

/// An expense request that may correspond to a bank transaction.
///
/// The caller pre-filters the pool: same department, amount within ±5%,
/// request date within ±30 days, active status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateExpense {
    pub id: i64,
    /// Human-readable request number
    pub number: String,
    pub amount: f64,
    pub request_date: NaiveDate,
    pub category_id: Option<i64>,
    pub contractor_name: Option<String>,
    pub contractor_inn: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_lookup_is_case_insensitive() {
        let plan = PlanSnapshot {
            version: 1,
            approved_at: None,
            categories: vec![PlanCategory {
                category_id: Some(3),
                category_name: "Аренда офиса".to_string(),
                planned_amount: 250_000.0,
                expense_type: None,
                justification: None,
                calculation_method: None,
            }],
        };

        assert!(plan.category_by_name("аренда офиса").is_some());
        assert!(plan.category_by_name("  АРЕНДА ОФИСА ").is_some());
        assert!(plan.category_by_name("закупка").is_none());
    }
}
