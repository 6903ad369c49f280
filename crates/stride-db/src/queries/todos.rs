//! Database query functions for the `todos` table.
//!
//! The materializer's idempotence rests on the partial unique index over
//! `(habit_id, due_date)`: inserts use `ON CONFLICT DO NOTHING` and fall
//! back to fetching the surviving row, so concurrent materialization for
//! the same habit and day converges on a single todo.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Todo;

/// Create the todo for `(habit_id, due_date)` if absent, and return the
/// row that exists afterwards (freshly inserted or pre-existing).
///
/// `due_date` must already be normalized to midnight UTC; the uniqueness
/// key is exact equality on the column.
pub async fn ensure_todo(
    pool: &PgPool,
    user_id: Uuid,
    habit_id: Uuid,
    description: &str,
    due_date: DateTime<Utc>,
) -> Result<Todo> {
    let inserted = sqlx::query_as::<_, Todo>(
        "INSERT INTO todos (user_id, habit_id, description, due_date) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (habit_id, due_date) WHERE habit_id IS NOT NULL DO NOTHING \
         RETURNING *",
    )
    .bind(user_id)
    .bind(habit_id)
    .bind(description)
    .bind(due_date)
    .fetch_optional(pool)
    .await
    .context("failed to insert todo")?;

    if let Some(todo) = inserted {
        return Ok(todo);
    }

    // Conflict: another call already materialized this day. Fetch it.
    let existing = sqlx::query_as::<_, Todo>(
        "SELECT * FROM todos WHERE habit_id = $1 AND due_date = $2",
    )
    .bind(habit_id)
    .bind(due_date)
    .fetch_optional(pool)
    .await
    .context("failed to fetch existing todo after conflict")?;

    existing.context("todo vanished between conflicting insert and fetch")
}

/// Fetch a single todo owned by the given user.
pub async fn get_todo_for_user(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<Option<Todo>> {
    let todo = sqlx::query_as::<_, Todo>("SELECT * FROM todos WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch todo")?;

    Ok(todo)
}

/// Set the completed flag on a todo owned by the given user.
///
/// Returns the updated todo, or `None` when no owned todo matches. The
/// completed flag is the only mutable field post-creation.
pub async fn set_todo_completed(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    completed: bool,
) -> Result<Option<Todo>> {
    let todo = sqlx::query_as::<_, Todo>(
        "UPDATE todos SET completed = $1 WHERE id = $2 AND user_id = $3 RETURNING *",
    )
    .bind(completed)
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to update todo completed flag")?;

    Ok(todo)
}

/// Completion counts across all todos derived from a goal's current habits.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionCounts {
    pub total: i64,
    pub completed: i64,
}

/// Count total and completed todos for a goal, joined through its habits.
///
/// Todos whose habit reference was nulled by a habit replacement do not
/// count: progress is computed over the goal's current habit set.
pub async fn completion_counts_for_goal(pool: &PgPool, goal_id: Uuid) -> Result<CompletionCounts> {
    let row: (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE t.completed) \
         FROM todos t \
         JOIN habits h ON h.id = t.habit_id \
         WHERE h.goal_id = $1",
    )
    .bind(goal_id)
    .fetch_one(pool)
    .await
    .context("failed to count todo completion for goal")?;

    Ok(CompletionCounts {
        total: row.0,
        completed: row.1,
    })
}
