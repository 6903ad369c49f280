//! Habit planner adapter: decomposes a free-text goal into a validated
//! list of `{description, frequency}` habits via an external
//! text-generation call.
//!
//! The response post-processing here is pure (no I/O): fence stripping,
//! JSON parsing, and frequency validation live in this module so they can
//! be unit tested without a live endpoint. The HTTP client lives in
//! [`openai`].

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use stride_db::models::Frequency;

pub use openai::{OpenAiPlanner, PlannerConfig};

/// One habit suggested by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedHabit {
    pub description: String,
    pub frequency: Frequency,
}

/// Errors from the planner boundary.
///
/// Failure is explicit rather than collapsed into an empty list, so
/// callers can distinguish "the call failed" from "zero habits".
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("planner request failed: {0}")]
    Request(String),

    #[error("planner returned malformed content: {0}")]
    Malformed(String),
}

/// The external planning capability.
///
/// Each call is a fresh, independent request: no caching, no retry.
#[async_trait]
pub trait HabitPlanner: Send + Sync {
    async fn plan(&self, goal_description: &str) -> Result<Vec<PlannedHabit>, PlannerError>;
}

/// Wire shape of one planner entry, before frequency validation.
#[derive(Debug, Deserialize)]
struct WireHabit {
    description: String,
    frequency: String,
}

/// Strip a leading/trailing Markdown code fence from planner output.
///
/// Handles an optional language tag immediately after the opening fence
/// (e.g. ```` ```json ````). Content without a fence passes through
/// trimmed.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag: everything up to the first newline.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse raw planner output into validated habits.
///
/// Entries whose frequency is anything other than `daily` or `weekly` are
/// filtered out (logged, not fatal). Content that is not a JSON array of
/// the two-field shape is an error.
pub fn parse_planner_response(raw: &str) -> Result<Vec<PlannedHabit>, PlannerError> {
    let content = strip_code_fence(raw);

    let wire: Vec<WireHabit> = serde_json::from_str(content)
        .map_err(|e| PlannerError::Malformed(format!("expected a JSON habit array: {e}")))?;

    let mut habits = Vec::with_capacity(wire.len());
    for entry in wire {
        match entry.frequency.parse::<Frequency>() {
            Ok(frequency) => habits.push(PlannedHabit {
                description: entry.description,
                frequency,
            }),
            Err(_) => {
                tracing::warn!(
                    frequency = %entry.frequency,
                    description = %entry.description,
                    "dropping planned habit with unsupported frequency"
                );
            }
        }
    }

    Ok(habits)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
