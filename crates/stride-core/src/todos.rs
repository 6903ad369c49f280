//! Daily todo materialization.
//!
//! Materialization is demand-driven: it runs when today's todos are
//! listed, or once at goal creation. The day boundary is UTC everywhere;
//! `due_date` is always midnight UTC, which is what makes the
//! `(habit_id, due_date)` uniqueness key equivalent to
//! at-most-one-todo-per-habit-per-day.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use stride_db::models::Todo;
use stride_db::queries::{habits as habit_queries, todos as todo_queries};

use crate::error::OpError;

/// Midnight UTC of the current day.
pub fn today_start_utc() -> DateTime<Utc> {
    day_start_utc(Utc::now())
}

/// Midnight UTC of the day containing `at`.
pub fn day_start_utc(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_else(|| unreachable!("midnight exists for every date"))
        .and_utc()
}

/// Materialize and return today's todos for a user.
///
/// For each daily habit across the user's goals, the day's todo is
/// created if absent and returned either way. The description is copied
/// from the habit at creation time and never re-synced. Safe to call any
/// number of times per day: the storage-level uniqueness constraint
/// suppresses duplicates, including under concurrent calls.
///
/// Weekly habits never materialize todos.
pub async fn ensure_today_todos(pool: &PgPool, user_id: Uuid) -> Result<Vec<Todo>, OpError> {
    let due_date = today_start_utc();
    let daily_habits = habit_queries::list_daily_habits_for_user(pool, user_id)
        .await
        .map_err(OpError::Storage)?;

    let mut todos = Vec::with_capacity(daily_habits.len());
    for habit in &daily_habits {
        let todo =
            todo_queries::ensure_todo(pool, user_id, habit.id, &habit.description, due_date)
                .await
                .map_err(OpError::Storage)?;
        todos.push(todo);
    }

    tracing::debug!(
        user_id = %user_id,
        count = todos.len(),
        "today's todos materialized"
    );
    Ok(todos)
}

/// Set the completed flag on an owned todo. The flag is the only mutable
/// field; everything else is fixed at materialization time.
pub async fn set_todo_completed(
    pool: &PgPool,
    user_id: Uuid,
    todo_id: Uuid,
    completed: bool,
) -> Result<Todo, OpError> {
    todo_queries::set_todo_completed(pool, todo_id, user_id, completed)
        .await
        .map_err(OpError::Storage)?
        .ok_or(OpError::NotFound("todo"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn day_start_truncates_to_midnight() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        let start = day_start_utc(at);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap());
    }

    #[test]
    fn midnight_is_its_own_day_start() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap();
        assert_eq!(day_start_utc(at), at);
    }
}
