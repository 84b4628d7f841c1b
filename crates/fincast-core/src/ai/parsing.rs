//! Tolerant parsing of completion-provider output
//!
//! Model replies come back wrapped in prose, markdown fences, or with
//! underscore-grouped digits (`1_200_000`) that serde will not accept. All of
//! that cleanup lives behind one sanitize function so the parsing path itself
//! stays a plain brace-bounded JSON extraction.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, Result};

use super::types::RawForecast;

/// Clean provider text up to the point where it can be handed to serde:
/// strips a surrounding fenced code block and collapses digit groups joined
/// by underscores into plain digit runs.
pub fn sanitize_provider_text(text: &str) -> String {
    let mut text = text.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string ("json") together with the opening fence
        let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
        text = rest.trim_end().trim_end_matches("```").trim();
    }

    static DIGIT_GROUPS: OnceLock<Regex> = OnceLock::new();
    let re = DIGIT_GROUPS.get_or_init(|| Regex::new(r"(\d)_(\d)").unwrap());

    let mut sanitized = text.to_string();
    loop {
        let collapsed = re.replace_all(&sanitized, "${1}${2}").into_owned();
        if collapsed == sanitized {
            break;
        }
        sanitized = collapsed;
    }
    sanitized
}

/// Byte budget for raw provider text quoted in error diagnostics
const DIAGNOSTIC_BYTES: usize = 200;

/// Truncate text for an error message without splitting a multi-byte char.
/// Provider replies are routinely Cyrillic, so a fixed byte offset is not a
/// valid slice point.
fn truncate_for_diagnostics(text: &str) -> String {
    if text.len() <= DIAGNOSTIC_BYTES {
        return text.to_string();
    }
    let mut end = DIAGNOSTIC_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Parse sanitized provider text into the raw forecast shape.
///
/// Extracts the first brace-bounded object from the text, so prose before or
/// after the JSON payload is tolerated.
pub fn parse_forecast_response(text: &str) -> Result<RawForecast> {
    let sanitized = sanitize_provider_text(text);

    let start = sanitized.find('{');
    let end = sanitized.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &sanitized[s..=e];
            serde_json::from_str(json_str).map_err(|err| {
                Error::InvalidData(format!(
                    "Invalid forecast JSON from provider: {} | Raw: {}",
                    err,
                    truncate_for_diagnostics(json_str)
                ))
            })
        }
        _ => Err(Error::InvalidData(format!(
            "No JSON found in provider response | Raw: {}",
            truncate_for_diagnostics(&sanitized)
        ))),
    }
}
