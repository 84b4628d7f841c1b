//! Forecast pipeline
//!
//! Orchestrates one forecast request end to end: baseline statistics,
//! anomaly detection, plan-event extraction, prompt assembly, the single
//! provider call, guardrail normalization, and history backfill. Provider
//! trouble never surfaces as an error; it degrades the result to a
//! baseline-backed estimate with a lowered confidence.

mod augment;
mod guardrail;
pub mod types;

pub use types::{
    Correlation, ForecastItem, ForecastMetadata, ForecastResult, ForecastScenario, ItemSource,
    ProviderStatus, Recommendation,
};

use chrono::Utc;
use tracing::{info, warn};

use crate::ai::parsing::parse_forecast_response;
use crate::ai::{CompletionBackend, CompletionClient};
use crate::baseline::{AnomalySummary, BaselineMetrics};
use crate::config::ForecastConfig;
use crate::context::{PromptBuilder, SYSTEM_INSTRUCTION};
use crate::error::Error;
use crate::forecast::guardrail::{round_to_hundreds, Guardrail, NormalizedForecast};
use crate::history::CategoryHistoryIndex;
use crate::models::{ExpenseRecord, MonthlyStatistic, PlanSnapshot};
use crate::plan::extract_plan_events;

/// Confidence of a cold-start result (no history, no plan)
const COLD_START_CONFIDENCE: u8 = 30;
/// Confidence when the provider answered but the reply was unusable
const DEGRADED_PROVIDER_CONFIDENCE: u8 = 50;
/// Confidence when the provider could not be reached at all
const DEGRADED_TRANSPORT_CONFIDENCE: u8 = 45;
/// History length below which a quality note is attached
const SHORT_HISTORY_MONTHS: usize = 6;

/// Everything one forecast call needs, gathered by the caller
#[derive(Debug, Clone)]
pub struct ForecastRequest {
    /// Target period
    pub year: i32,
    pub month: u32,
    pub department_name: Option<String>,
    /// Chronologically ordered monthly aggregates
    pub monthly_statistics: Vec<MonthlyStatistic>,
    /// Raw expense records backing the per-category index
    pub history: Vec<ExpenseRecord>,
    /// Approved plan for the target period, when one exists
    pub plan: Option<PlanSnapshot>,
}

/// The spend-forecast engine: one provider client, one config, no state
/// between requests.
#[derive(Clone)]
pub struct ForecastEngine {
    client: CompletionClient,
    config: ForecastConfig,
}

impl ForecastEngine {
    pub fn new(client: CompletionClient, config: ForecastConfig) -> Self {
        Self { client, config }
    }

    /// Engine with default thresholds and a client built from the
    /// environment, falling back to the mock backend when no provider host
    /// is configured.
    pub fn from_env() -> Self {
        let client = CompletionClient::from_env().unwrap_or_else(|| {
            warn!("no completion provider configured, using mock backend");
            CompletionClient::mock()
        });
        Self::new(client, ForecastConfig::default())
    }

    /// Produce a forecast. Infallible by contract: provider failures and
    /// unusable replies degrade the result instead of erroring.
    pub async fn generate(&self, request: &ForecastRequest) -> ForecastResult {
        let baseline =
            BaselineMetrics::compute(&request.monthly_statistics, request.year, request.month);
        let anomalies =
            AnomalySummary::detect(&request.monthly_statistics, self.config.anomaly_sigma);
        let history = CategoryHistoryIndex::build(&request.history);
        let plan_events = extract_plan_events(request.plan.as_ref());

        let plan_is_empty = request
            .plan
            .as_ref()
            .map(|p| p.categories.is_empty())
            .unwrap_or(true);
        if request.monthly_statistics.is_empty() && history.is_empty() && plan_is_empty {
            info!(
                year = request.year,
                month = request.month,
                "cold start, skipping provider"
            );
            return self.cold_start_result(request, baseline, anomalies);
        }

        let prompt = PromptBuilder::new(
            request.year,
            request.month,
            request.department_name.as_deref(),
            &request.monthly_statistics,
            &baseline,
            &anomalies,
            &plan_events,
            &history,
            request.plan.as_ref(),
        )
        .build();

        let raw = match self.client.complete(SYSTEM_INSTRUCTION, &prompt).await {
            Ok(text) => match parse_forecast_response(&text) {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(error = %err, "provider reply unparseable, degrading");
                    return self.degraded_result(request, baseline, anomalies, plan_events, err);
                }
            },
            Err(err) => {
                warn!(error = %err, host = self.client.host(), "provider call failed, degrading");
                return self.degraded_result(request, baseline, anomalies, plan_events, err);
            }
        };

        let guardrail = Guardrail::new(&history, request.plan.as_ref(), &self.config);
        let mut normalized = guardrail.normalize(raw);
        let backfilled = augment::backfill_items(
            &mut normalized.items,
            &history,
            request.plan.as_ref(),
            &self.config,
        );

        let quality_notes = self.quality_notes(request, &anomalies, backfilled);

        info!(
            total = normalized.forecast_total,
            items = normalized.items.len(),
            backfilled,
            "forecast generated"
        );

        self.assemble(
            request,
            baseline,
            anomalies,
            plan_events,
            normalized,
            quality_notes,
            ProviderStatus::Ok,
            true,
            None,
        )
    }

    fn cold_start_result(
        &self,
        request: &ForecastRequest,
        baseline: BaselineMetrics,
        anomalies: AnomalySummary,
    ) -> ForecastResult {
        let total = round_to_hundreds(Some(baseline.fallback_total()));
        let normalized = NormalizedForecast {
            forecast_total: total,
            confidence: COLD_START_CONFIDENCE,
            items: Vec::new(),
            scenarios: vec![self.baseline_scenario(total)],
            correlations: Vec::new(),
            recommendations: Vec::new(),
            summary: "Недостаточно данных для прогноза: нет истории расходов и утвержденного плана"
                .to_string(),
        };
        self.assemble(
            request,
            baseline,
            anomalies,
            Vec::new(),
            normalized,
            vec!["Прогноз построен без истории и плана".to_string()],
            ProviderStatus::Skipped,
            false,
            None,
        )
    }

    fn degraded_result(
        &self,
        request: &ForecastRequest,
        baseline: BaselineMetrics,
        anomalies: AnomalySummary,
        plan_events: Vec<crate::plan::PlanEvent>,
        err: Error,
    ) -> ForecastResult {
        let confidence = if err.is_transport() {
            DEGRADED_TRANSPORT_CONFIDENCE
        } else {
            DEGRADED_PROVIDER_CONFIDENCE
        };

        let total = round_to_hundreds(Some(baseline.fallback_total()));
        let mut quality_notes = self.quality_notes(request, &anomalies, 0);
        quality_notes.push("Прогноз построен по базовым метрикам без ответа модели".to_string());

        let normalized = NormalizedForecast {
            forecast_total: total,
            confidence,
            items: Vec::new(),
            scenarios: vec![self.baseline_scenario(total)],
            correlations: Vec::new(),
            recommendations: Vec::new(),
            summary: "Оценка по историческим средним: сервис прогнозирования недоступен"
                .to_string(),
        };
        self.assemble(
            request,
            baseline,
            anomalies,
            plan_events,
            normalized,
            quality_notes,
            ProviderStatus::Degraded,
            false,
            Some(err.to_string()),
        )
    }

    fn baseline_scenario(&self, total: f64) -> ForecastScenario {
        let delta = (total * self.config.range_delta_percent).max(self.config.range_delta_min);
        ForecastScenario {
            name: "base".to_string(),
            label: "Базовый".to_string(),
            probability: 100,
            total,
            range_min: round_to_hundreds(Some((total - delta).max(0.0))),
            range_max: round_to_hundreds(Some(total + delta)),
            description: "Оценка по базовым метрикам истории".to_string(),
        }
    }

    fn quality_notes(
        &self,
        request: &ForecastRequest,
        anomalies: &AnomalySummary,
        backfilled: usize,
    ) -> Vec<String> {
        let mut notes = Vec::new();
        if request.monthly_statistics.len() < SHORT_HISTORY_MONTHS {
            notes.push(format!(
                "История короче {} месяцев, надежность прогноза снижена",
                SHORT_HISTORY_MONTHS
            ));
        }
        if !anomalies.is_empty() {
            notes.push(format!(
                "Обнаружено аномальных месяцев: {}",
                anomalies.items.len()
            ));
        }
        if backfilled > 0 {
            notes.push(format!(
                "Добавлено позиций из исторических данных: {}",
                backfilled
            ));
        }
        notes
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        request: &ForecastRequest,
        baseline: BaselineMetrics,
        anomalies: AnomalySummary,
        plan_events: Vec<crate::plan::PlanEvent>,
        normalized: NormalizedForecast,
        quality_notes: Vec<String>,
        provider_status: ProviderStatus,
        success: bool,
        error: Option<String>,
    ) -> ForecastResult {
        ForecastResult {
            success,
            forecast_total: normalized.forecast_total,
            confidence: normalized.confidence,
            items: normalized.items,
            scenarios: normalized.scenarios,
            correlations: normalized.correlations,
            recommendations: normalized.recommendations,
            summary: normalized.summary,
            quality_notes,
            baseline_metrics: baseline,
            anomaly_summary: anomalies,
            plan_context: plan_events,
            metadata: ForecastMetadata {
                model: self.client.model().to_string(),
                generated_at: Utc::now(),
                history_months: request.monthly_statistics.len(),
                provider_status,
            },
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use crate::models::{PlanCategory, PlanSnapshot};

    fn month(year: i32, month_no: u32, total: f64) -> MonthlyStatistic {
        MonthlyStatistic {
            year,
            month: month_no,
            count: 4,
            total,
            average: total / 4.0,
        }
    }

    fn record(id: i64, category: &str, amount: f64) -> ExpenseRecord {
        ExpenseRecord {
            id,
            category_id: Some(id),
            category_name: Some(category.to_string()),
            amount,
            request_date: "2025-03-10".parse().unwrap(),
            payment_date: None,
            status: None,
            counterparty: None,
        }
    }

    fn empty_request() -> ForecastRequest {
        ForecastRequest {
            year: 2025,
            month: 7,
            department_name: None,
            monthly_statistics: Vec::new(),
            history: Vec::new(),
            plan: None,
        }
    }

    #[tokio::test]
    async fn test_cold_start_skips_provider() {
        let engine = ForecastEngine::new(
            CompletionClient::Mock(MockBackend::failing(500)),
            ForecastConfig::default(),
        );
        // A failing backend proves the provider is never consulted
        let result = engine.generate(&empty_request()).await;

        assert!(!result.success);
        assert_eq!(result.confidence, 30);
        assert_eq!(result.metadata.provider_status, ProviderStatus::Skipped);
        assert_eq!(result.scenarios.len(), 1);
        assert_eq!(result.scenarios[0].name, "base");
        assert_eq!(result.forecast_total, 0.0);
    }

    #[tokio::test]
    async fn test_provider_error_degrades_with_baseline_total() {
        let engine = ForecastEngine::new(
            CompletionClient::Mock(MockBackend::failing(503)),
            ForecastConfig::default(),
        );
        let request = ForecastRequest {
            monthly_statistics: vec![
                month(2025, 4, 100_000.0),
                month(2025, 5, 100_000.0),
                month(2025, 6, 100_000.0),
            ],
            ..empty_request()
        };

        let result = engine.generate(&request).await;
        assert!(!result.success);
        assert_eq!(result.confidence, 50);
        assert_eq!(result.metadata.provider_status, ProviderStatus::Degraded);
        assert_eq!(result.forecast_total, 100_000.0);
        assert!(result.error.is_some());
        // Invariant holds in degraded results too
        assert_eq!(result.canonical_scenario().unwrap().total, result.forecast_total);
    }

    #[tokio::test]
    async fn test_unparseable_reply_degrades() {
        let engine = ForecastEngine::new(
            CompletionClient::Mock(MockBackend::with_response("нет никакого JSON")),
            ForecastConfig::default(),
        );
        let request = ForecastRequest {
            monthly_statistics: vec![month(2025, 6, 80_000.0)],
            ..empty_request()
        };

        let result = engine.generate(&request).await;
        assert!(!result.success);
        assert_eq!(result.metadata.provider_status, ProviderStatus::Degraded);
        assert_eq!(result.confidence, 50);
    }

    #[tokio::test]
    async fn test_successful_forecast_backfills_and_holds_invariant() {
        let reply = r#"{
            "forecast_total": 300000,
            "confidence": 80,
            "items": [{"description": "Аренда", "amount": 250000, "reasoning": "по утвержденному плану", "source": "plan"}],
            "scenarios": [{"name": "base", "label": "Базовый", "probability": 70, "total": 300000}],
            "summary": "ok"
        }"#;
        let engine = ForecastEngine::new(
            CompletionClient::Mock(MockBackend::with_response(reply)),
            ForecastConfig::default(),
        );
        let request = ForecastRequest {
            monthly_statistics: vec![month(2025, 5, 280_000.0), month(2025, 6, 300_000.0)],
            history: vec![
                record(1, "Аренда", 250_000.0),
                record(2, "Связь", 20_000.0),
                record(3, "Канцтовары", 3_000.0),
            ],
            plan: Some(PlanSnapshot {
                version: 1,
                approved_at: None,
                categories: vec![PlanCategory {
                    category_id: Some(1),
                    category_name: "Аренда".to_string(),
                    planned_amount: 250_000.0,
                    expense_type: None,
                    justification: None,
                    calculation_method: None,
                }],
            }),
            ..empty_request()
        };

        let result = engine.generate(&request).await;
        assert!(result.success);
        assert_eq!(result.metadata.provider_status, ProviderStatus::Ok);
        assert_eq!(result.confidence, 80);
        assert_eq!(result.forecast_total, 300_000.0);
        assert_eq!(result.canonical_scenario().unwrap().total, result.forecast_total);
        // Two history categories backfilled alongside the provider's item
        assert!(result.items.len() >= 3);
        assert!(result
            .quality_notes
            .iter()
            .any(|n| n.contains("исторических данных")));
    }
}
