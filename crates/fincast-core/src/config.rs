//! Engine configuration
//!
//! Every tuned constant in the core lives here instead of being buried as a
//! module-level literal. The defaults carry the values the scoring and
//! guardrail heuristics were shipped with; callers that need different
//! thresholds construct the config explicitly.

use std::time::Duration;

/// Completion gateway settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Model identifier sent to the provider
    pub model: String,
    /// Sampling temperature for every forecast request
    pub temperature: f32,
    /// Token budget for the provider reply
    pub max_tokens: u32,
    /// Hard deadline for the single network call per request
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 1500,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Forecast pipeline settings (guardrail bounds, augmentation thresholds)
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    /// Minimum item count before the augmentation fallback kicks in
    pub min_items: usize,
    /// Relative half-width of a recomputed item range
    pub range_delta_percent: f64,
    /// Absolute floor for the range half-width
    pub range_delta_min: f64,
    /// Stddev multiplier for anomaly flagging
    pub anomaly_sigma: f64,
    /// Historical upper bound: category average times this factor
    pub history_bound_factor: f64,
    /// Plan upper bound: planned amount times this factor
    pub plan_bound_factor: f64,
    /// Confidence assigned when the provider gives none
    pub default_confidence: u8,
    /// Backfill confidence for categories seen at least
    /// `frequent_count_threshold` times
    pub backfill_confidence_frequent: u8,
    /// Backfill confidence for sparsely observed categories
    pub backfill_confidence_sparse: u8,
    /// Occurrence count at which a category counts as regular
    pub frequent_count_threshold: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_items: 10,
            range_delta_percent: 0.15,
            range_delta_min: 100.0,
            anomaly_sigma: 1.5,
            history_bound_factor: 1.5,
            plan_bound_factor: 1.05,
            default_confidence: 50,
            backfill_confidence_frequent: 60,
            backfill_confidence_sparse: 45,
            frequent_count_threshold: 6,
        }
    }
}

/// Matching engine scoring weights and limits
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Score for a relative amount difference below `amount_exact_tolerance`
    pub amount_exact_score: u32,
    /// Score for a relative amount difference below `amount_close_tolerance`
    pub amount_close_score: u32,
    pub amount_exact_tolerance: f64,
    pub amount_close_tolerance: f64,
    /// Score when the request date is within `date_week_days`
    pub date_week_score: u32,
    /// Score when the request date is within `date_month_days`
    pub date_month_score: u32,
    pub date_week_days: i64,
    pub date_month_days: i64,
    /// Score for an exact INN match
    pub inn_score: u32,
    /// Score for a substring match between counterparty names
    pub name_score: u32,
    /// Score for a matching expense category
    pub category_score: u32,
    /// Suggestion count when the caller does not ask for one
    pub default_limit: usize,
    /// Upper bound on the caller-supplied suggestion count
    pub max_limit: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            amount_exact_score: 40,
            amount_close_score: 30,
            amount_exact_tolerance: 0.01,
            amount_close_tolerance: 0.05,
            date_week_score: 20,
            date_month_score: 10,
            date_week_days: 7,
            date_month_days: 30,
            inn_score: 30,
            name_score: 15,
            category_score: 10,
            default_limit: 10,
            max_limit: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_defaults() {
        let cfg = GatewayConfig::default();
        assert!((cfg.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.max_tokens, 1500);
    }

    #[test]
    fn test_match_defaults_sum_to_full_score() {
        let cfg = MatchConfig::default();
        assert_eq!(
            cfg.amount_exact_score + cfg.date_week_score + cfg.inn_score + cfg.category_score,
            100
        );
    }
}
