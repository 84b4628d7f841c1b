//! Forecast augmentation
//!
//! When the provider returns fewer line items than the configured minimum,
//! the biggest unrepresented historical categories are backfilled from their
//! own averages. Backfilled items are plainly labeled as history-derived so
//! the caller can tell model output from statistical filler.

use std::collections::HashSet;

use tracing::debug;

use crate::config::ForecastConfig;
use crate::forecast::guardrail::round_to_hundreds;
use crate::forecast::types::{ForecastItem, ItemSource};
use crate::history::CategoryHistoryIndex;
use crate::models::PlanSnapshot;

/// Top up `items` to `config.min_items` from category history.
///
/// Categories already represented (case-insensitive description match) are
/// skipped, as are categories whose rounded average is not positive. Returns
/// the number of items added.
pub(crate) fn backfill_items(
    items: &mut Vec<ForecastItem>,
    history: &CategoryHistoryIndex,
    plan: Option<&PlanSnapshot>,
    config: &ForecastConfig,
) -> usize {
    if items.len() >= config.min_items {
        return 0;
    }

    let mut represented: HashSet<String> = items
        .iter()
        .map(|i| i.description.trim().to_lowercase())
        .collect();

    let mut added = 0;
    for stats in history.ranked() {
        if items.len() >= config.min_items {
            break;
        }
        let key = stats.category_name.to_lowercase();
        if represented.contains(&key) {
            continue;
        }

        let amount = round_to_hundreds(Some(stats.average));
        if amount <= 0.0 {
            continue;
        }

        let confidence = if stats.count >= config.frequent_count_threshold {
            config.backfill_confidence_frequent
        } else {
            config.backfill_confidence_sparse
        };

        let delta = (amount * config.range_delta_percent).max(config.range_delta_min);
        let planned = plan
            .and_then(|p| p.category_by_name(&stats.category_name))
            .map(|c| c.planned_amount);

        let mut reasoning = format!(
            "Среднее по {} операциям в истории",
            stats.count
        );
        if !stats.last_dates.is_empty() {
            let dates: Vec<String> = stats
                .last_dates
                .iter()
                .map(|d| d.format("%d.%m.%Y").to_string())
                .collect();
            reasoning.push_str(&format!(", последние даты: {}", dates.join(", ")));
        }
        if let Some(planned) = planned {
            reasoning.push_str(&format!(", в плане {:.0}", planned));
        }
        reasoning.push('.');

        items.push(ForecastItem {
            description: stats.category_name.clone(),
            amount,
            range_min: round_to_hundreds(Some((amount - delta).max(0.0))),
            range_max: round_to_hundreds(Some(amount + delta)),
            reasoning,
            source: ItemSource::History,
            confidence,
            category_hint: stats.category_id,
        });
        represented.insert(key);
        added += 1;
    }

    if added > 0 {
        debug!(added, total = items.len(), "backfilled forecast items from history");
    }
    added
}
