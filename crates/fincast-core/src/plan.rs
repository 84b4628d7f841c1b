//! Plan/Event Extractor
//!
//! Pulls the signal out of an approved plan snapshot: justification text and
//! non-default calculation drivers are worth telling the completion provider
//! about; plain manually entered amounts are not.

use serde::{Deserialize, Serialize};

use crate::models::PlanSnapshot;

/// Calculation method value that carries no planning signal
const DEFAULT_CALCULATION_METHOD: &str = "manual";

/// One noteworthy entry of an approved plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEvent {
    pub category_name: String,
    pub planned_amount: f64,
    pub justification: Option<String>,
    pub calculation_method: Option<String>,
}

/// Extract noteworthy events from an approved plan snapshot.
///
/// A category yields an event when it has a non-empty justification or a
/// calculation method other than the manual default. Categories with neither
/// are silently dropped; an absent plan yields an empty list.
pub fn extract_plan_events(plan: Option<&PlanSnapshot>) -> Vec<PlanEvent> {
    let Some(plan) = plan else {
        return Vec::new();
    };

    plan.categories
        .iter()
        .filter_map(|category| {
            let justification = category
                .justification
                .as_deref()
                .map(str::trim)
                .filter(|j| !j.is_empty())
                .map(str::to_string);

            let calculation_method = category
                .calculation_method
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty() && !m.eq_ignore_ascii_case(DEFAULT_CALCULATION_METHOD))
                .map(str::to_string);

            if justification.is_none() && calculation_method.is_none() {
                return None;
            }

            Some(PlanEvent {
                category_name: category.category_name.clone(),
                planned_amount: category.planned_amount,
                justification,
                calculation_method,
            })
        })
        .collect()
}
