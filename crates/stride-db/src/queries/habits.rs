//! Database query functions for the `habits` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Frequency, Habit};

/// Insert a single habit row for a goal.
pub async fn insert_habit(
    pool: &PgPool,
    goal_id: Uuid,
    description: &str,
    frequency: Frequency,
) -> Result<Habit> {
    let habit = sqlx::query_as::<_, Habit>(
        "INSERT INTO habits (goal_id, description, frequency) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(goal_id)
    .bind(description)
    .bind(frequency)
    .fetch_one(pool)
    .await
    .context("failed to insert habit")?;

    Ok(habit)
}

/// List all habits belonging to a goal.
///
/// The habit set of a goal is unordered; creation order is used only to
/// make results deterministic.
pub async fn list_habits_for_goal(pool: &PgPool, goal_id: Uuid) -> Result<Vec<Habit>> {
    let habits = sqlx::query_as::<_, Habit>(
        "SELECT * FROM habits WHERE goal_id = $1 ORDER BY created_at ASC",
    )
    .bind(goal_id)
    .fetch_all(pool)
    .await
    .context("failed to list habits for goal")?;

    Ok(habits)
}

/// List all daily habits across every goal owned by a user.
///
/// This is the materializer's input set: weekly habits never produce todos.
pub async fn list_daily_habits_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Habit>> {
    let habits = sqlx::query_as::<_, Habit>(
        "SELECT h.* FROM habits h \
         JOIN goals g ON g.id = h.goal_id \
         WHERE g.user_id = $1 AND h.frequency = $2 \
         ORDER BY h.created_at ASC",
    )
    .bind(user_id)
    .bind(Frequency::Daily)
    .fetch_all(pool)
    .await
    .context("failed to list daily habits")?;

    Ok(habits)
}

/// Delete every habit belonging to a goal. Returns the number deleted.
pub async fn delete_habits_for_goal(pool: &PgPool, goal_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM habits WHERE goal_id = $1")
        .bind(goal_id)
        .execute(pool)
        .await
        .context("failed to delete habits for goal")?;

    Ok(result.rows_affected())
}

/// Count habits referencing a goal.
pub async fn count_habits_for_goal(pool: &PgPool, goal_id: Uuid) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM habits WHERE goal_id = $1")
        .bind(goal_id)
        .fetch_one(pool)
        .await
        .context("failed to count habits for goal")?;

    Ok(row.0)
}
