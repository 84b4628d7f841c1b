//! Raw completion-provider response shapes
//!
//! The provider's JSON is untrusted: numbers arrive as numbers, strings, or
//! not at all. These shapes accept anything and leave coercion to the
//! guardrail, which is the only place allowed to decide defaults.

use serde::Deserialize;
use serde_json::Value;

/// Top-level forecast object as the model returned it
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawForecast {
    #[serde(default)]
    pub forecast_total: Value,
    #[serde(default)]
    pub confidence: Value,
    #[serde(default)]
    pub items: Vec<RawItem>,
    #[serde(default)]
    pub scenarios: Vec<RawScenario>,
    #[serde(default)]
    pub correlations: Vec<RawCorrelation>,
    #[serde(default)]
    pub recommendations: Vec<RawRecommendation>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Value,
    #[serde(default)]
    pub range_min: Value,
    #[serde(default)]
    pub range_max: Value,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub confidence: Value,
    #[serde(default)]
    pub category_hint: Value,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawScenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub probability: Value,
    #[serde(default)]
    pub total: Value,
    #[serde(default)]
    pub range_min: Value,
    #[serde(default)]
    pub range_max: Value,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawCorrelation {
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub impact: Option<String>,
    #[serde(default)]
    pub confidence: Value,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawRecommendation {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub potential_saving: Value,
    #[serde(default)]
    pub confidence: Value,
}

/// Coerce a raw value to f64, accepting numbers and numeric strings
pub(crate) fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace([' ', '_'], "").parse().ok(),
        _ => None,
    }
}

/// Coerce a raw value to i64, accepting numbers and numeric strings
pub(crate) fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let cleaned = s.trim().replace([' ', '_'], "");
            cleaned
                .parse::<i64>()
                .ok()
                .or_else(|| cleaned.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}
