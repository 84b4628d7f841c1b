//! Forecast guardrail
//!
//! Normalizes the provider's raw forecast into the contract the caller gets:
//! rounded amounts, clamped confidences, inferred sources, re-linked
//! categories, history/plan upper bounds, and a scenario set whose canonical
//! total always equals `forecast_total`. Everything the model claims is
//! treated as a proposal; every number the caller sees passed through here.

use tracing::{debug, info};

use crate::ai::types::{
    as_f64, as_i64, RawCorrelation, RawForecast, RawItem, RawRecommendation, RawScenario,
};
use crate::config::ForecastConfig;
use crate::forecast::types::{
    canonical_index, Correlation, ForecastItem, ForecastScenario, ItemSource, Recommendation,
};
use crate::history::CategoryHistoryIndex;
use crate::models::PlanSnapshot;

/// Reasoning substrings that mark an item as plan-backed
const PLAN_KEYWORDS: [&str; 4] = ["план", "утвержд", "plan", "approved"];
/// Reasoning substrings that mark an item as history-derived
const HISTORY_KEYWORDS: [&str; 4] = ["истор", "средн", "history", "average"];

/// Marker appended exactly once when an amount is clamped to its upper bound
const CLAMP_NOTE_MARKER: &str = "скорректирована до верхней границы";

/// Round to the nearest hundred, halves away from zero. `None` rounds to 0.
pub(crate) fn round_to_hundreds(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => (v / 100.0).round() * 100.0,
        _ => 0.0,
    }
}

fn clamp_confidence(value: &serde_json::Value, default: u8) -> u8 {
    match as_i64(value) {
        Some(v) => v.clamp(0, 100) as u8,
        None => default,
    }
}

/// The guardrail's normalized output, ready for assembly into a result
#[derive(Debug, Clone)]
pub(crate) struct NormalizedForecast {
    pub forecast_total: f64,
    pub confidence: u8,
    pub items: Vec<ForecastItem>,
    pub scenarios: Vec<ForecastScenario>,
    pub correlations: Vec<Correlation>,
    pub recommendations: Vec<Recommendation>,
    pub summary: String,
}

/// Applies every normalization rule to a raw provider forecast
pub(crate) struct Guardrail<'a> {
    history: &'a CategoryHistoryIndex,
    plan: Option<&'a PlanSnapshot>,
    config: &'a ForecastConfig,
}

impl<'a> Guardrail<'a> {
    pub fn new(
        history: &'a CategoryHistoryIndex,
        plan: Option<&'a PlanSnapshot>,
        config: &'a ForecastConfig,
    ) -> Self {
        Self {
            history,
            plan,
            config,
        }
    }

    pub fn normalize(&self, raw: RawForecast) -> NormalizedForecast {
        let items: Vec<ForecastItem> = raw
            .items
            .into_iter()
            .filter_map(|item| self.normalize_item(item))
            .collect();

        let provisional_total = {
            let declared = round_to_hundreds(as_f64(&raw.forecast_total));
            if declared > 0.0 {
                declared
            } else {
                round_to_hundreds(Some(items.iter().map(|i| i.amount).sum()))
            }
        };

        let scenarios = self.normalize_scenarios(raw.scenarios, provisional_total);

        // Hard invariant: the headline total is the canonical scenario's total
        let forecast_total = canonical_index(&scenarios)
            .map(|idx| scenarios[idx].total)
            .unwrap_or(provisional_total);

        NormalizedForecast {
            forecast_total,
            confidence: clamp_confidence(&raw.confidence, self.config.default_confidence),
            items,
            scenarios,
            correlations: normalize_correlations(raw.correlations),
            recommendations: normalize_recommendations(raw.recommendations),
            summary: raw.summary.map(|s| s.trim().to_string()).unwrap_or_default(),
        }
    }

    fn normalize_item(&self, raw: RawItem) -> Option<ForecastItem> {
        let description = raw
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())?;

        let amount = round_to_hundreds(as_f64(&raw.amount));
        let mut reasoning = raw
            .reasoning
            .map(|r| r.trim().to_string())
            .unwrap_or_default();

        let mut source = raw
            .source
            .as_deref()
            .and_then(|s| s.parse::<ItemSource>().ok())
            .unwrap_or_else(|| infer_source(&reasoning));

        let stats = self
            .history
            .by_name(&description)
            .or_else(|| as_i64(&raw.category_hint).and_then(|id| self.history.by_id(id)));
        // Re-link only when the provider gave no hint of its own
        let category_hint =
            as_i64(&raw.category_hint).or_else(|| stats.and_then(|s| s.category_id));

        let plan_entry = self
            .plan
            .and_then(|plan| plan.category_by_name(&description));

        // A plan-claimed item with no matching plan line is really history
        if source == ItemSource::Plan && plan_entry.is_none() {
            source = ItemSource::History;
            reasoning = reasoning.replace("по утвержденному плану", "по историческим данным");
        }

        let mut item = ForecastItem {
            description,
            amount,
            range_min: round_to_hundreds(as_f64(&raw.range_min)),
            range_max: round_to_hundreds(as_f64(&raw.range_max)),
            reasoning,
            source,
            confidence: clamp_confidence(&raw.confidence, self.config.default_confidence),
            category_hint,
        };

        if item.range_min <= 0.0 || item.range_max < item.amount {
            self.recompute_range(&mut item);
        }

        self.clamp_to_bounds(&mut item, stats, plan_entry.map(|p| p.planned_amount));
        Some(item)
    }

    fn recompute_range(&self, item: &mut ForecastItem) {
        let delta = (item.amount * self.config.range_delta_percent)
            .max(self.config.range_delta_min);
        item.range_min = round_to_hundreds(Some((item.amount - delta).max(0.0)));
        item.range_max = round_to_hundreds(Some(item.amount + delta));
    }

    /// Cap an item's amount at the tighter of the history and plan bounds.
    ///
    /// Idempotent: a clamped amount sits exactly at the bound, so a second
    /// pass leaves it untouched, and the adjustment note is appended only
    /// when its marker is absent from the reasoning.
    fn clamp_to_bounds(
        &self,
        item: &mut ForecastItem,
        stats: Option<&crate::history::CategoryHistoryStats>,
        planned_amount: Option<f64>,
    ) {
        let history_bound = stats.map(|s| {
            round_to_hundreds(Some(
                (s.average * self.config.history_bound_factor)
                    .max(s.recent_max())
                    .max(s.max_amount),
            ))
        });
        let plan_bound =
            planned_amount.map(|p| round_to_hundreds(Some(p * self.config.plan_bound_factor)));

        // Which bound fired matters for the log and the user-facing note
        let (bound, bound_kind) = match (history_bound, plan_bound) {
            (Some(h), Some(p)) if p < h => (p, "plan"),
            (Some(h), Some(_)) => (h, "history"),
            (Some(h), None) => (h, "history"),
            (None, Some(p)) => (p, "plan"),
            (None, None) => return,
        };

        if bound <= 0.0 || item.amount <= bound {
            return;
        }

        info!(
            description = %item.description,
            original = item.amount,
            bound,
            bound_kind,
            "forecast item clamped to upper bound"
        );

        item.amount = bound;
        self.recompute_range(item);

        if !item.reasoning.contains(CLAMP_NOTE_MARKER) {
            let basis = if bound_kind == "plan" {
                "по утвержденному плану"
            } else {
                "по историческим данным"
            };
            if !item.reasoning.is_empty() {
                item.reasoning.push(' ');
            }
            item.reasoning.push_str(&format!(
                "Сумма {} {:.0} {}.",
                CLAMP_NOTE_MARKER, bound, basis
            ));
        }
    }

    fn normalize_scenarios(
        &self,
        raw: Vec<RawScenario>,
        provisional_total: f64,
    ) -> Vec<ForecastScenario> {
        let mut scenarios: Vec<ForecastScenario> = raw
            .into_iter()
            .map(|s| {
                let name = s
                    .name
                    .map(|n| n.trim().to_lowercase())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| "base".to_string());

                let total = {
                    let t = round_to_hundreds(as_f64(&s.total));
                    if t > 0.0 {
                        t
                    } else {
                        provisional_total
                    }
                };

                let delta =
                    (total * self.config.range_delta_percent).max(self.config.range_delta_min);
                let range_min = {
                    let v = round_to_hundreds(as_f64(&s.range_min));
                    if v > 0.0 && v <= total {
                        v
                    } else {
                        round_to_hundreds(Some((total - delta).max(0.0)))
                    }
                };
                let range_max = {
                    let v = round_to_hundreds(as_f64(&s.range_max));
                    if v >= total {
                        v
                    } else {
                        round_to_hundreds(Some(total + delta))
                    }
                };

                ForecastScenario {
                    label: s
                        .label
                        .map(|l| l.trim().to_string())
                        .filter(|l| !l.is_empty())
                        .unwrap_or_else(|| name.clone()),
                    name,
                    probability: clamp_confidence(&s.probability, 0),
                    total,
                    range_min,
                    range_max,
                    description: s
                        .description
                        .map(|d| d.trim().to_string())
                        .unwrap_or_default(),
                }
            })
            .collect();

        if scenarios.is_empty() {
            debug!("provider returned no scenarios, synthesizing base");
            let delta = (provisional_total * self.config.range_delta_percent)
                .max(self.config.range_delta_min);
            scenarios.push(ForecastScenario {
                name: "base".to_string(),
                label: "Базовый".to_string(),
                probability: 100,
                total: provisional_total,
                range_min: round_to_hundreds(Some((provisional_total - delta).max(0.0))),
                range_max: round_to_hundreds(Some(provisional_total + delta)),
                description: "Сценарий на основе итоговой суммы прогноза".to_string(),
            });
        }

        scenarios
    }
}

/// Keyword-based source inference for items where the model gave none.
/// Matches on the reasoning text only: a description like "План закупок"
/// says nothing about where the amount came from.
fn infer_source(reasoning: &str) -> ItemSource {
    let haystack = reasoning.to_lowercase();
    if PLAN_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        ItemSource::Plan
    } else if HISTORY_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        ItemSource::History
    } else {
        ItemSource::History
    }
}

fn normalize_correlations(raw: Vec<RawCorrelation>) -> Vec<Correlation> {
    raw.into_iter()
        .filter_map(|c| {
            let driver = c.driver.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())?;
            let impact = c.impact.map(|i| i.trim().to_string()).filter(|i| !i.is_empty())?;
            Some(Correlation {
                driver,
                impact,
                confidence: clamp_confidence(&c.confidence, 0),
            })
        })
        .collect()
}

fn normalize_recommendations(raw: Vec<RawRecommendation>) -> Vec<Recommendation> {
    raw.into_iter()
        .filter_map(|r| {
            let title = r.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
            Some(Recommendation {
                title,
                description: r
                    .description
                    .map(|d| d.trim().to_string())
                    .unwrap_or_default(),
                potential_saving: as_f64(&r.potential_saving)
                    .filter(|v| *v > 0.0)
                    .map(|v| round_to_hundreds(Some(v))),
                confidence: clamp_confidence(&r.confidence, 0),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExpenseRecord, PlanCategory};
    use serde_json::json;

    fn history_with(category: &str, amounts: &[f64]) -> CategoryHistoryIndex {
        let records: Vec<_> = amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| ExpenseRecord {
                id: i as i64 + 1,
                category_id: Some(7),
                category_name: Some(category.to_string()),
                amount: *amount,
                request_date: format!("2025-{:02}-10", i % 12 + 1).parse().unwrap(),
                payment_date: None,
                status: None,
                counterparty: None,
            })
            .collect();
        CategoryHistoryIndex::build(&records)
    }

    fn plan_with(category: &str, amount: f64) -> PlanSnapshot {
        PlanSnapshot {
            version: 1,
            approved_at: None,
            categories: vec![PlanCategory {
                category_id: Some(7),
                category_name: category.to_string(),
                planned_amount: amount,
                expense_type: None,
                justification: None,
                calculation_method: None,
            }],
        }
    }

    fn raw_item(description: &str, amount: f64) -> RawItem {
        RawItem {
            description: Some(description.to_string()),
            amount: json!(amount),
            ..Default::default()
        }
    }

    #[test]
    fn test_round_to_hundreds_half_up() {
        assert_eq!(round_to_hundreds(Some(150.0)), 200.0);
        assert_eq!(round_to_hundreds(Some(149.9)), 100.0);
        assert_eq!(round_to_hundreds(Some(1_234_567.0)), 1_234_600.0);
        assert_eq!(round_to_hundreds(None), 0.0);
    }

    #[test]
    fn test_source_inference_keywords() {
        assert_eq!(infer_source("по утвержденному плану"), ItemSource::Plan);
        assert_eq!(infer_source("среднее за 12 месяцев"), ItemSource::History);
        assert_eq!(infer_source("прочие соображения"), ItemSource::History);
    }

    #[test]
    fn test_plan_like_description_does_not_force_plan_source() {
        let history = history_with("План закупок", &[50_000.0; 6]);
        let config = ForecastConfig::default();
        let guardrail = Guardrail::new(&history, None, &config);

        let mut raw = raw_item("План закупок", 50_000.0);
        raw.reasoning = Some("среднее по истории расходов".to_string());
        let item = guardrail.normalize_item(raw).unwrap();
        assert_eq!(item.source, ItemSource::History);
        assert!(item.reasoning.contains("среднее по истории"));
    }

    #[test]
    fn test_plan_claim_without_plan_entry_downgrades_to_history() {
        let history = history_with("Аренда", &[100_000.0; 6]);
        let config = ForecastConfig::default();
        let guardrail = Guardrail::new(&history, None, &config);

        let mut raw = raw_item("Аренда", 100_000.0);
        raw.source = Some("plan".to_string());
        let item = guardrail.normalize_item(raw).unwrap();
        assert_eq!(item.source, ItemSource::History);
    }

    #[test]
    fn test_category_relinked_from_history() {
        let history = history_with("Аренда офиса", &[100_000.0; 3]);
        let config = ForecastConfig::default();
        let guardrail = Guardrail::new(&history, None, &config);

        let item = guardrail
            .normalize_item(raw_item("аренда офиса", 100_000.0))
            .unwrap();
        assert_eq!(item.category_hint, Some(7));
    }

    #[test]
    fn test_provider_category_hint_is_kept() {
        let history = history_with("Аренда офиса", &[100_000.0; 3]);
        let config = ForecastConfig::default();
        let guardrail = Guardrail::new(&history, None, &config);

        let mut raw = raw_item("Аренда офиса", 100_000.0);
        raw.category_hint = json!(42);
        let item = guardrail.normalize_item(raw).unwrap();
        assert_eq!(item.category_hint, Some(42));
    }

    #[test]
    fn test_amount_clamped_to_history_bound_with_note() {
        let history = history_with("Связь", &[10_000.0; 8]);
        let config = ForecastConfig::default();
        let guardrail = Guardrail::new(&history, None, &config);

        // Bound: max(10000 * 1.5, 10000, 10000) = 15000
        let item = guardrail
            .normalize_item(raw_item("Связь", 400_000.0))
            .unwrap();
        assert_eq!(item.amount, 15_000.0);
        assert!(item.range_max >= item.amount);
        assert!(item.reasoning.contains(CLAMP_NOTE_MARKER));
        // Only the history bound existed, and the note says so
        assert!(item.reasoning.contains("по историческим данным"));
        assert!(!item.reasoning.contains("по утвержденному плану"));
    }

    #[test]
    fn test_clamp_is_idempotent() {
        let history = history_with("Связь", &[10_000.0; 8]);
        let config = ForecastConfig::default();
        let guardrail = Guardrail::new(&history, None, &config);

        let first = guardrail
            .normalize_item(raw_item("Связь", 400_000.0))
            .unwrap();

        let mut again = RawItem {
            description: Some(first.description.clone()),
            amount: json!(first.amount),
            reasoning: Some(first.reasoning.clone()),
            source: Some(first.source.as_str().to_string()),
            ..Default::default()
        };
        again.confidence = json!(first.confidence);
        let second = guardrail.normalize_item(again).unwrap();

        assert_eq!(second.amount, first.amount);
        assert_eq!(
            second.reasoning.matches(CLAMP_NOTE_MARKER).count(),
            1,
            "note must not stack on re-normalization"
        );
    }

    #[test]
    fn test_plan_bound_caps_tighter_than_history() {
        let history = history_with("Аренда", &[200_000.0; 6]);
        let plan = plan_with("Аренда", 100_000.0);
        let config = ForecastConfig::default();
        let guardrail = Guardrail::new(&history, Some(&plan), &config);

        // history bound 300000, plan bound 105000; plan wins
        let item = guardrail
            .normalize_item(raw_item("Аренда", 500_000.0))
            .unwrap();
        assert_eq!(item.amount, 105_000.0);
        assert!(item.reasoning.contains("по утвержденному плану"));
    }

    #[test]
    fn test_forecast_total_equals_canonical_scenario_total() {
        let history = CategoryHistoryIndex::build(&[]);
        let config = ForecastConfig::default();
        let guardrail = Guardrail::new(&history, None, &config);

        let raw: RawForecast = serde_json::from_value(json!({
            "forecast_total": 999999,
            "items": [{"description": "Разное", "amount": 100000}],
            "scenarios": [
                {"name": "optimistic", "total": 800000, "probability": 20},
                {"name": "base", "total": 1000000, "probability": 60}
            ]
        }))
        .unwrap();

        let normalized = guardrail.normalize(raw);
        assert_eq!(normalized.forecast_total, 1_000_000.0);
        let canonical = canonical_index(&normalized.scenarios).unwrap();
        assert_eq!(normalized.scenarios[canonical].total, normalized.forecast_total);
    }

    #[test]
    fn test_missing_scenarios_synthesized_from_items() {
        let history = CategoryHistoryIndex::build(&[]);
        let config = ForecastConfig::default();
        let guardrail = Guardrail::new(&history, None, &config);

        let raw: RawForecast = serde_json::from_value(json!({
            "items": [
                {"description": "Аренда", "amount": 250000},
                {"description": "Связь", "amount": "50_000"}
            ]
        }))
        .unwrap();

        let normalized = guardrail.normalize(raw);
        assert_eq!(normalized.scenarios.len(), 1);
        assert_eq!(normalized.scenarios[0].name, "base");
        assert_eq!(normalized.forecast_total, 300_000.0);
    }

    #[test]
    fn test_confidence_clamped_and_defaulted() {
        let history = CategoryHistoryIndex::build(&[]);
        let config = ForecastConfig::default();
        let guardrail = Guardrail::new(&history, None, &config);

        let mut raw = raw_item("Разное", 1_000.0);
        raw.confidence = json!(250);
        assert_eq!(guardrail.normalize_item(raw).unwrap().confidence, 100);

        let raw = raw_item("Разное", 1_000.0);
        assert_eq!(guardrail.normalize_item(raw).unwrap().confidence, 50);
    }

    #[test]
    fn test_empty_correlations_and_recommendations_dropped() {
        let correlations = normalize_correlations(vec![
            RawCorrelation {
                driver: Some("Рост штата".to_string()),
                impact: Some("Рост расходов".to_string()),
                confidence: json!(70),
            },
            RawCorrelation::default(),
        ]);
        assert_eq!(correlations.len(), 1);

        let recommendations = normalize_recommendations(vec![RawRecommendation {
            title: Some("  ".to_string()),
            ..Default::default()
        }]);
        assert!(recommendations.is_empty());
    }
}
