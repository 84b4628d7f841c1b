//! Fincast Core Library
//!
//! Spend forecasting and bank-statement reconciliation for a corporate
//! expense system:
//! - Baseline statistics and anomaly detection over monthly history
//! - Plan-event extraction from approved budget snapshots
//! - Deterministic prompt assembly for a completion provider
//! - Pluggable OpenAI-compatible completion gateway
//! - Guardrail normalization of model output (rounding, bounds, scenarios)
//! - History-backed augmentation of thin forecasts
//! - Transaction-to-expense matching with additive scoring

pub mod ai;
pub mod baseline;
pub mod config;
pub mod context;
pub mod error;
pub mod forecast;
pub mod history;
pub mod matching;
pub mod models;
pub mod plan;

/// Test utilities including a mock OpenAI-compatible server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{CompletionBackend, CompletionClient, MockBackend, OpenAICompatibleBackend};
pub use baseline::{AnomalyMonth, AnomalySummary, BaselineMetrics};
pub use config::{ForecastConfig, GatewayConfig, MatchConfig};
pub use context::PromptBuilder;
pub use error::{Error, Result};
pub use forecast::{
    Correlation, ForecastEngine, ForecastItem, ForecastMetadata, ForecastRequest, ForecastResult,
    ForecastScenario, ItemSource, ProviderStatus, Recommendation,
};
pub use history::{CategoryHistoryIndex, CategoryHistoryStats};
pub use matching::{MatchSuggestion, MatchingEngine};
pub use models::{
    BankTransaction, CandidateExpense, ExpenseRecord, MonthlyStatistic, PlanCategory, PlanSnapshot,
};
pub use plan::{extract_plan_events, PlanEvent};
