//! Forecast result model
//!
//! These are the caller-facing types: created once per request, re-serialized
//! by the HTTP layer as-is, never mutated after return.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::baseline::{AnomalySummary, BaselineMetrics};
use crate::plan::PlanEvent;

/// Where a forecast item's amount ultimately comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSource {
    /// Backed by an approved plan entry
    Plan,
    /// Derived from historical spend
    History,
    /// Anything the model made up that fits neither
    Other,
}

impl ItemSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::History => "history",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ItemSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ItemSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plan" => Ok(Self::Plan),
            "history" => Ok(Self::History),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown item source: {}", s)),
        }
    }
}

/// One forecast line item, already normalized by the guardrail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastItem {
    pub description: String,
    pub amount: f64,
    pub range_min: f64,
    pub range_max: f64,
    pub reasoning: String,
    pub source: ItemSource,
    /// Confidence in this item, 0..=100
    pub confidence: u8,
    /// Linked category id, when the description maps to known history
    pub category_hint: Option<i64>,
}

/// One named, weighted projection inside a forecast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastScenario {
    /// Lower-cased scenario key; `base` is canonical
    pub name: String,
    pub label: String,
    /// Probability weight, 0..=100
    pub probability: u8,
    pub total: f64,
    pub range_min: f64,
    pub range_max: f64,
    pub description: String,
}

/// A driver/impact relationship the model observed in the history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correlation {
    pub driver: String,
    pub impact: String,
    pub confidence: u8,
}

/// A savings recommendation attached to the forecast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub potential_saving: Option<f64>,
    pub confidence: u8,
}

/// How the completion provider fared for this request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Provider answered and the reply was usable
    Ok,
    /// Provider failed or answered garbage; baselines filled in
    Degraded,
    /// Cold start: pipeline never reached the provider
    Skipped,
}

/// Request-level metadata attached to every result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastMetadata {
    pub model: String,
    pub generated_at: DateTime<Utc>,
    /// Months of history the forecast was computed from
    pub history_months: usize,
    pub provider_status: ProviderStatus,
}

/// The complete forecast returned to the caller.
///
/// `success: false` is a normal return value carrying a best-effort baseline
/// estimate, not an error; the surrounding API is expected to serve it with a
/// 200-style status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResult {
    pub success: bool,
    /// Always equals the canonical scenario's total
    pub forecast_total: f64,
    pub confidence: u8,
    pub items: Vec<ForecastItem>,
    /// Never empty: a `base` scenario is synthesized when needed
    pub scenarios: Vec<ForecastScenario>,
    pub correlations: Vec<Correlation>,
    pub recommendations: Vec<Recommendation>,
    pub summary: String,
    pub quality_notes: Vec<String>,
    pub baseline_metrics: BaselineMetrics,
    pub anomaly_summary: AnomalySummary,
    pub plan_context: Vec<PlanEvent>,
    pub metadata: ForecastMetadata,
    /// Diagnostic text for degraded results (parse errors and the like)
    pub error: Option<String>,
}

impl ForecastResult {
    /// Index of the canonical scenario: the first one named `base` or
    /// `baseline`, else the first scenario.
    pub fn canonical_scenario(&self) -> Option<&ForecastScenario> {
        canonical_index(&self.scenarios).map(|idx| &self.scenarios[idx])
    }
}

/// First scenario named `base`/`baseline`, else the first one
pub(crate) fn canonical_index(scenarios: &[ForecastScenario]) -> Option<usize> {
    if scenarios.is_empty() {
        return None;
    }
    scenarios
        .iter()
        .position(|s| s.name == "base" || s.name == "baseline")
        .or(Some(0))
}
