//! Progress and category statistics.

use std::collections::HashMap;

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use stride_db::models::Category;
use stride_db::queries::{goals as goal_queries, todos as todo_queries};

/// Lifetime completion percentage for a goal, in `[0.0, 100.0]`.
///
/// Computed over every todo ever materialized for the goal's current
/// habits, past days included; never time-windowed. A goal with no todos
/// is 0.0 (no division by zero).
pub async fn progress_for_goal(pool: &PgPool, goal_id: Uuid) -> Result<f64> {
    let counts = todo_queries::completion_counts_for_goal(pool, goal_id).await?;
    Ok(percentage(counts.completed, counts.total))
}

/// Count a user's goals per category.
///
/// Every goal has a category (the column defaults to `other`), so the
/// returned map partitions the user's goals. Categories with zero goals
/// are absent. No implied ordering.
pub async fn stats_by_category(pool: &PgPool, user_id: Uuid) -> Result<HashMap<Category, i64>> {
    let rows = goal_queries::count_goals_by_category(pool, user_id).await?;
    Ok(rows.into_iter().collect())
}

fn percentage(completed: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_zero_total_is_zero() {
        assert_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn percentage_full_completion() {
        assert_eq!(percentage(4, 4), 100.0);
    }

    #[test]
    fn percentage_partial() {
        assert_eq!(percentage(1, 4), 25.0);
    }

    #[test]
    fn percentage_stays_in_range() {
        for (completed, total) in [(0, 1), (1, 3), (7, 7), (0, 0)] {
            let p = percentage(completed, total);
            assert!((0.0..=100.0).contains(&p), "{p} out of range");
        }
    }
}
