//! Per-category history aggregation
//!
//! Builds the per-request lookup the guardrail and the augmentation fallback
//! both consume: how much a category has historically cost, how often it
//! occurs, and what its recent amounts looked like. Indexed by lower-cased
//! name and by numeric id.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::ExpenseRecord;

/// How many recent amounts to retain per category
const RECENT_AMOUNTS: usize = 5;
/// How many recent request dates to retain per category
const LAST_DATES: usize = 3;

/// Aggregated spend history for one expense category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryHistoryStats {
    pub category_id: Option<i64>,
    pub category_name: String,
    pub total: f64,
    pub count: usize,
    pub average: f64,
    /// Up to 5 most recent amounts, sorted ascending
    pub recent_amounts: Vec<f64>,
    /// Up to 3 most recent request dates, newest first
    pub last_dates: Vec<NaiveDate>,
    pub max_amount: f64,
}

impl CategoryHistoryStats {
    /// Largest recently observed amount (0 when no recents kept)
    pub fn recent_max(&self) -> f64 {
        self.recent_amounts.iter().copied().fold(0.0, f64::max)
    }
}

/// Per-request index over category history, keyed by lower-cased name and by
/// numeric id
#[derive(Debug, Clone, Default)]
pub struct CategoryHistoryIndex {
    entries: Vec<CategoryHistoryStats>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<i64, usize>,
}

impl CategoryHistoryIndex {
    /// Aggregate raw expense records into per-category statistics.
    ///
    /// Records without a category name are grouped under their id rendered as
    /// a name; records with neither are skipped.
    pub fn build(records: &[ExpenseRecord]) -> Self {
        struct Accum {
            category_id: Option<i64>,
            category_name: String,
            total: f64,
            count: usize,
            max_amount: f64,
            dated_amounts: Vec<(NaiveDate, f64)>,
        }

        let mut groups: HashMap<String, Accum> = HashMap::new();

        for record in records {
            let name = match (&record.category_name, record.category_id) {
                (Some(name), _) if !name.trim().is_empty() => name.trim().to_string(),
                (_, Some(id)) => format!("#{}", id),
                _ => continue,
            };
            let key = name.to_lowercase();

            let entry = groups.entry(key).or_insert_with(|| Accum {
                category_id: record.category_id,
                category_name: name,
                total: 0.0,
                count: 0,
                max_amount: 0.0,
                dated_amounts: Vec::new(),
            });
            if entry.category_id.is_none() {
                entry.category_id = record.category_id;
            }
            entry.total += record.amount;
            entry.count += 1;
            entry.max_amount = entry.max_amount.max(record.amount);
            entry.dated_amounts.push((record.request_date, record.amount));
        }

        let mut entries = Vec::with_capacity(groups.len());
        for (_, mut group) in groups {
            group.dated_amounts.sort_by_key(|(date, _)| *date);

            let mut recent_amounts: Vec<f64> = group
                .dated_amounts
                .iter()
                .rev()
                .take(RECENT_AMOUNTS)
                .map(|(_, amount)| *amount)
                .collect();
            recent_amounts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

            let last_dates: Vec<NaiveDate> = group
                .dated_amounts
                .iter()
                .rev()
                .take(LAST_DATES)
                .map(|(date, _)| *date)
                .collect();

            entries.push(CategoryHistoryStats {
                category_id: group.category_id,
                category_name: group.category_name,
                total: group.total,
                count: group.count,
                average: if group.count > 0 {
                    group.total / group.count as f64
                } else {
                    0.0
                },
                recent_amounts,
                last_dates,
                max_amount: group.max_amount,
            });
        }

        // Deterministic order for prompt rendering and backfill
        entries.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            by_name.insert(entry.category_name.to_lowercase(), idx);
            if let Some(id) = entry.category_id {
                by_id.entry(id).or_insert(idx);
            }
        }

        Self {
            entries,
            by_name,
            by_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Look up by lower-cased category name
    pub fn by_name(&self, name: &str) -> Option<&CategoryHistoryStats> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|&idx| &self.entries[idx])
    }

    /// Look up by numeric category id
    pub fn by_id(&self, id: i64) -> Option<&CategoryHistoryStats> {
        self.by_id.get(&id).map(|&idx| &self.entries[idx])
    }

    /// Categories ranked by total historical spend, descending
    pub fn top_by_total(&self, n: usize) -> &[CategoryHistoryStats] {
        &self.entries[..self.entries.len().min(n)]
    }

    /// All categories, ranked by total descending
    pub fn ranked(&self) -> &[CategoryHistoryStats] {
        &self.entries
    }
}
