//! Transaction-to-expense matcher
//!
//! Scores a pre-filtered pool of candidate expense requests against one bank
//! transaction. Scoring is additive over independent dimensions (amount,
//! date, counterparty, category); the weights live in [`MatchConfig`] and a
//! perfect match sums to 100. Pure and synchronous: candidate retrieval and
//! the decision to auto-link both stay with the caller.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MatchConfig;
use crate::models::{BankTransaction, CandidateExpense};

/// One ranked match candidate with the reasons behind its score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSuggestion {
    pub expense_id: i64,
    pub expense_number: String,
    pub expense_amount: f64,
    pub expense_date: NaiveDate,
    pub expense_category_id: Option<i64>,
    pub expense_contractor_name: Option<String>,
    /// Additive score, 100 at most with default weights
    pub matching_score: u32,
    /// Human-readable reasons, one per scored dimension
    pub match_reasons: Vec<String>,
}

/// Scores bank transactions against candidate expense requests
#[derive(Debug, Clone, Default)]
pub struct MatchingEngine {
    config: MatchConfig,
}

impl MatchingEngine {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Rank `candidates` against `transaction`, best first.
    ///
    /// Zero-score candidates are dropped. The sort is stable, so candidates
    /// with equal scores keep their pool order. `limit` is clamped to
    /// `1..=max_limit`; `None` uses the configured default.
    pub fn suggest(
        &self,
        transaction: &BankTransaction,
        candidates: &[CandidateExpense],
        limit: Option<usize>,
    ) -> Vec<MatchSuggestion> {
        let limit = limit
            .unwrap_or(self.config.default_limit)
            .clamp(1, self.config.max_limit);

        let mut suggestions: Vec<MatchSuggestion> = candidates
            .iter()
            .filter_map(|candidate| self.score(transaction, candidate))
            .collect();

        suggestions.sort_by(|a, b| b.matching_score.cmp(&a.matching_score));
        suggestions.truncate(limit);

        debug!(
            candidates = candidates.len(),
            suggestions = suggestions.len(),
            "matched bank transaction against expense pool"
        );
        suggestions
    }

    fn score(
        &self,
        transaction: &BankTransaction,
        candidate: &CandidateExpense,
    ) -> Option<MatchSuggestion> {
        let mut score = 0;
        let mut reasons = Vec::new();

        if let Some((points, reason)) = self.score_amount(transaction.amount, candidate.amount) {
            score += points;
            reasons.push(reason);
        }
        if let Some((points, reason)) =
            self.score_date(transaction.transaction_date, candidate.request_date)
        {
            score += points;
            reasons.push(reason);
        }
        if let Some((points, reason)) = self.score_counterparty(transaction, candidate) {
            score += points;
            reasons.push(reason);
        }
        if let Some((points, reason)) = self.score_category(transaction, candidate) {
            score += points;
            reasons.push(reason);
        }

        if score == 0 {
            return None;
        }

        Some(MatchSuggestion {
            expense_id: candidate.id,
            expense_number: candidate.number.clone(),
            expense_amount: candidate.amount,
            expense_date: candidate.request_date,
            expense_category_id: candidate.category_id,
            expense_contractor_name: candidate.contractor_name.clone(),
            matching_score: score,
            match_reasons: reasons,
        })
    }

    fn score_amount(&self, transaction: f64, candidate: f64) -> Option<(u32, String)> {
        if transaction <= 0.0 || candidate <= 0.0 {
            return None;
        }
        let relative = (transaction - candidate).abs() / transaction;
        if relative < self.config.amount_exact_tolerance {
            Some((
                self.config.amount_exact_score,
                "Точное совпадение суммы".to_string(),
            ))
        } else if relative < self.config.amount_close_tolerance {
            Some((
                self.config.amount_close_score,
                format!("Сумма близка (расхождение {:.1}%)", relative * 100.0),
            ))
        } else {
            None
        }
    }

    fn score_date(&self, transaction: NaiveDate, candidate: NaiveDate) -> Option<(u32, String)> {
        let days = (transaction - candidate).num_days().abs();
        if days <= self.config.date_week_days {
            Some((
                self.config.date_week_score,
                format!("Дата заявки в пределах недели ({} дн.)", days),
            ))
        } else if days <= self.config.date_month_days {
            Some((
                self.config.date_month_score,
                format!("Дата заявки в пределах месяца ({} дн.)", days),
            ))
        } else {
            None
        }
    }

    fn score_counterparty(
        &self,
        transaction: &BankTransaction,
        candidate: &CandidateExpense,
    ) -> Option<(u32, String)> {
        if let (Some(tx_inn), Some(cd_inn)) = (
            normalize_inn(transaction.counterparty_inn.as_deref()),
            normalize_inn(candidate.contractor_inn.as_deref()),
        ) {
            if tx_inn == cd_inn {
                return Some((
                    self.config.inn_score,
                    format!("Совпадение ИНН {}", tx_inn),
                ));
            }
        }

        let tx_name = transaction.counterparty_name.trim().to_lowercase();
        let cd_name = candidate
            .contractor_name
            .as_deref()
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())?;
        if tx_name.is_empty() {
            return None;
        }

        if tx_name.contains(&cd_name) || cd_name.contains(&tx_name) {
            Some((
                self.config.name_score,
                "Совпадение наименования контрагента".to_string(),
            ))
        } else {
            None
        }
    }

    fn score_category(
        &self,
        transaction: &BankTransaction,
        candidate: &CandidateExpense,
    ) -> Option<(u32, String)> {
        match (transaction.category_id, candidate.category_id) {
            (Some(tx), Some(cd)) if tx == cd => Some((
                self.config.category_score,
                "Совпадение статьи расходов".to_string(),
            )),
            _ => None,
        }
    }
}

/// INN digits only; empty or non-digit values do not participate in scoring
fn normalize_inn(inn: Option<&str>) -> Option<String> {
    let digits: String = inn?.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}
