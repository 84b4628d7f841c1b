//! Prompt Assembler
//!
//! Serializes everything the completion provider needs — monthly history,
//! baseline metrics, anomalies, plan events, category totals, the approved
//! plan breakdown — into one deterministic text block, followed by strict
//! output-format instructions with a worked example. Prompt text is Russian:
//! the provider is instructed to answer in the deployment's user language,
//! and the guardrail keyword tables key off those phrases.
//!
//! This module never touches the network; it only builds a `String`.

use std::fmt::Write;

use crate::baseline::{AnomalySummary, BaselineMetrics};
use crate::history::CategoryHistoryIndex;
use crate::models::{MonthlyStatistic, PlanSnapshot};
use crate::plan::PlanEvent;

/// Anomaly lines rendered in the prompt (chronological source order)
const MAX_ANOMALY_LINES: usize = 5;
/// Plan-event lines rendered in the prompt
const MAX_PLAN_EVENT_LINES: usize = 10;
/// Categories rendered in the top-spend section
const MAX_TOP_CATEGORIES: usize = 10;

/// System instruction sent with every forecast request
pub const SYSTEM_INSTRUCTION: &str = "Ты — финансовый аналитик. Ты строишь прогноз расходов \
подразделения на следующий месяц по историческим данным и утвержденному плану. \
Отвечай строго в формате JSON без пояснений вне JSON.";

/// Fully worked example of the expected reply shape
const OUTPUT_EXAMPLE: &str = r#"{
  "forecast_total": 1250000,
  "confidence": 75,
  "items": [
    {
      "description": "Аренда офиса",
      "amount": 250000,
      "range_min": 240000,
      "range_max": 260000,
      "reasoning": "Стабильный ежемесячный платеж по утвержденному плану",
      "source": "plan",
      "confidence": 90,
      "category_hint": 12
    }
  ],
  "scenarios": [
    {
      "name": "base",
      "label": "Базовый",
      "probability": 60,
      "total": 1250000,
      "range_min": 1150000,
      "range_max": 1350000,
      "description": "Расходы в рамках исторического тренда"
    }
  ],
  "correlations": [
    {"driver": "Рост штата", "impact": "Рост расходов на связь", "confidence": 60}
  ],
  "recommendations": [
    {"title": "Пересмотреть подписки", "description": "Часть лицензий не используется", "potential_saving": 40000, "confidence": 55}
  ],
  "summary": "Прогноз основан на 12 месяцах истории и утвержденном плане"
}"#;

const MONTH_NAMES: [&str; 12] = [
    "январь",
    "февраль",
    "март",
    "апрель",
    "май",
    "июнь",
    "июль",
    "август",
    "сентябрь",
    "октябрь",
    "ноябрь",
    "декабрь",
];

fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get((month.saturating_sub(1)) as usize % 12)
        .copied()
        .unwrap_or("январь")
}

/// Assembles the forecast prompt from per-request inputs
pub struct PromptBuilder<'a> {
    year: i32,
    month: u32,
    department_name: Option<&'a str>,
    monthly: &'a [MonthlyStatistic],
    baseline: &'a BaselineMetrics,
    anomalies: &'a AnomalySummary,
    plan_events: &'a [PlanEvent],
    history: &'a CategoryHistoryIndex,
    plan: Option<&'a PlanSnapshot>,
}

impl<'a> PromptBuilder<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        year: i32,
        month: u32,
        department_name: Option<&'a str>,
        monthly: &'a [MonthlyStatistic],
        baseline: &'a BaselineMetrics,
        anomalies: &'a AnomalySummary,
        plan_events: &'a [PlanEvent],
        history: &'a CategoryHistoryIndex,
        plan: Option<&'a PlanSnapshot>,
    ) -> Self {
        Self {
            year,
            month,
            department_name,
            monthly,
            baseline,
            anomalies,
            plan_events,
            history,
            plan,
        }
    }

    /// Render the full prompt. Deterministic: same inputs, same string.
    pub fn build(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "Построй прогноз расходов на {} {} г.{}",
            month_name(self.month),
            self.year,
            self.department_name
                .map(|d| format!(" для подразделения «{}»", d))
                .unwrap_or_default()
        );

        self.write_monthly_section(&mut out);
        self.write_baseline_section(&mut out);
        self.write_anomaly_section(&mut out);
        self.write_plan_event_section(&mut out);
        self.write_top_categories_section(&mut out);
        self.write_plan_breakdown_section(&mut out);
        self.write_format_section(&mut out);

        out
    }

    fn write_monthly_section(&self, out: &mut String) {
        let _ = writeln!(out, "\n## История расходов по месяцам");
        for stat in self.monthly {
            let _ = writeln!(
                out,
                "{}-{:02}: {} заявок, итого {:.0}, в среднем {:.0}",
                stat.year, stat.month, stat.count, stat.total, stat.average
            );
        }
    }

    fn write_baseline_section(&self, out: &mut String) {
        let _ = writeln!(out, "\n## Базовые метрики");
        let _ = writeln!(
            out,
            "Средний расход за месяц: {:.0}",
            self.baseline.simple_average
        );
        if let Some(moving) = self.baseline.moving_average {
            let _ = writeln!(out, "Скользящее среднее за 3 месяца: {:.0}", moving);
        }
        if let Some(seasonal) = self.baseline.seasonal_reference {
            let _ = writeln!(out, "Этот же месяц год назад: {:.0}", seasonal);
        }
        let _ = writeln!(
            out,
            "Сумма за последние 12 месяцев: {:.0}",
            self.baseline.last_12_months_total
        );
    }

    fn write_anomaly_section(&self, out: &mut String) {
        let _ = writeln!(out, "\n## Аномальные месяцы");
        if self.anomalies.is_empty() {
            let _ = writeln!(out, "Аномалий не обнаружено");
            return;
        }
        for anomaly in self.anomalies.items.iter().take(MAX_ANOMALY_LINES) {
            let _ = writeln!(
                out,
                "{}-{:02}: {:.0} (отклонение {:+.1}% от среднего)",
                anomaly.year, anomaly.month, anomaly.total, anomaly.deviation_percent
            );
        }
    }

    fn write_plan_event_section(&self, out: &mut String) {
        let _ = writeln!(out, "\n## События утвержденного плана");
        if self.plan_events.is_empty() {
            let _ = writeln!(out, "Существенных событий в плане нет");
            return;
        }
        for event in self.plan_events.iter().take(MAX_PLAN_EVENT_LINES) {
            let mut line = format!("{}: {:.0}", event.category_name, event.planned_amount);
            if let Some(ref justification) = event.justification {
                let _ = write!(line, " — {}", justification);
            }
            if let Some(ref method) = event.calculation_method {
                let _ = write!(line, " (метод: {})", method);
            }
            let _ = writeln!(out, "{}", line);
        }
    }

    fn write_top_categories_section(&self, out: &mut String) {
        let _ = writeln!(out, "\n## Крупнейшие статьи расходов за период");
        for stats in self.history.top_by_total(MAX_TOP_CATEGORIES) {
            let _ = writeln!(
                out,
                "{}: итого {:.0}, {} заявок, в среднем {:.0}, максимум {:.0}",
                stats.category_name, stats.total, stats.count, stats.average, stats.max_amount
            );
        }
    }

    fn write_plan_breakdown_section(&self, out: &mut String) {
        let Some(plan) = self.plan else {
            return;
        };
        let _ = writeln!(
            out,
            "\n## Утвержденный план (версия {})",
            plan.version
        );
        for category in &plan.categories {
            let _ = writeln!(
                out,
                "{}: {:.0}{}",
                category.category_name,
                category.planned_amount,
                category
                    .expense_type
                    .as_deref()
                    .map(|t| format!(" [{}]", t))
                    .unwrap_or_default()
            );
        }
    }

    fn write_format_section(&self, out: &mut String) {
        let _ = writeln!(out, "\n## Формат ответа");
        let _ = writeln!(out, "Правила:");
        let _ = writeln!(out, "- округляй каждую сумму до сотен;");
        let _ = writeln!(
            out,
            "- числа без подчеркиваний и пробелов (1200000, а не 1_200_000);"
        );
        let _ = writeln!(
            out,
            "- поле source каждой позиции: plan, history или other;"
        );
        let _ = writeln!(out, "- обязателен сценарий с name = \"base\";");
        let _ = writeln!(out, "- отвечай только JSON, без текста вокруг.");
        let _ = writeln!(out, "Пример ответа:");
        let _ = writeln!(out, "{}", OUTPUT_EXAMPLE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlanCategory, PlanSnapshot};

    fn month(year: i32, month_no: u32, total: f64) -> MonthlyStatistic {
        MonthlyStatistic {
            year,
            month: month_no,
            count: 5,
            total,
            average: total / 5.0,
        }
    }

    fn build_prompt(plan: Option<&PlanSnapshot>) -> String {
        let monthly = vec![month(2025, 1, 100_000.0), month(2025, 2, 120_000.0)];
        let baseline = BaselineMetrics::compute(&monthly, 2025, 3);
        let anomalies = AnomalySummary::empty();
        let history = CategoryHistoryIndex::build(&[]);
        PromptBuilder::new(
            2025,
            3,
            Some("Отдел закупок"),
            &monthly,
            &baseline,
            &anomalies,
            &[],
            &history,
            plan,
        )
        .build()
    }

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(build_prompt(None), build_prompt(None));
    }

    #[test]
    fn test_prompt_contains_fixed_sections() {
        let prompt = build_prompt(None);
        assert!(prompt.contains("март 2025"));
        assert!(prompt.contains("## История расходов по месяцам"));
        assert!(prompt.contains("2025-01: 5 заявок"));
        assert!(prompt.contains("Аномалий не обнаружено"));
        assert!(prompt.contains("Существенных событий в плане нет"));
        assert!(prompt.contains("округляй каждую сумму до сотен"));
        assert!(prompt.contains("\"name\": \"base\""));
    }

    #[test]
    fn test_null_metrics_are_omitted_not_rendered() {
        let monthly = vec![month(2025, 1, 100_000.0)];
        let baseline = BaselineMetrics::compute(&monthly, 2025, 2);
        let anomalies = AnomalySummary::empty();
        let history = CategoryHistoryIndex::build(&[]);
        let prompt = PromptBuilder::new(
            2025, 2, None, &monthly, &baseline, &anomalies, &[], &history, None,
        )
        .build();

        // Fewer than 3 months: no moving average line at all
        assert!(!prompt.contains("Скользящее среднее"));
        assert!(!prompt.contains("год назад"));
    }

    #[test]
    fn test_plan_breakdown_rendered_when_present() {
        let plan = PlanSnapshot {
            version: 4,
            approved_at: None,
            categories: vec![PlanCategory {
                category_id: Some(1),
                category_name: "Аренда".to_string(),
                planned_amount: 250_000.0,
                expense_type: Some("opex".to_string()),
                justification: None,
                calculation_method: None,
            }],
        };
        let prompt = build_prompt(Some(&plan));
        assert!(prompt.contains("Утвержденный план (версия 4)"));
        assert!(prompt.contains("Аренда: 250000 [opex]"));
    }
}
