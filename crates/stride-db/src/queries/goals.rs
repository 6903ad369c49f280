//! Database query functions for the `goals` table.
//!
//! Every lookup keyed by goal id also filters by the owning user; a goal
//! fetched without the owner filter would be an authorization hole.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Category, Goal, GoalStatus};

/// Insert a new goal row. Returns the inserted goal with server-generated
/// defaults (id, status, created_at).
pub async fn insert_goal(
    pool: &PgPool,
    user_id: Uuid,
    description: &str,
    category: Category,
    target_date: Option<chrono::NaiveDate>,
) -> Result<Goal> {
    let goal = sqlx::query_as::<_, Goal>(
        "INSERT INTO goals (user_id, description, category, target_date) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(user_id)
    .bind(description)
    .bind(category)
    .bind(target_date)
    .fetch_one(pool)
    .await
    .context("failed to insert goal")?;

    Ok(goal)
}

/// Fetch a single goal owned by the given user.
pub async fn get_goal_for_user(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<Option<Goal>> {
    let goal = sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch goal")?;

    Ok(goal)
}

/// List all goals owned by a user, newest first.
pub async fn list_goals_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Goal>> {
    let goals = sqlx::query_as::<_, Goal>(
        "SELECT * FROM goals WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list goals")?;

    Ok(goals)
}

/// Overwrite the status of a goal owned by the given user.
///
/// Returns the updated goal, or `None` when no owned goal matches.
pub async fn update_goal_status(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    status: GoalStatus,
) -> Result<Option<Goal>> {
    let goal = sqlx::query_as::<_, Goal>(
        "UPDATE goals SET status = $1 WHERE id = $2 AND user_id = $3 RETURNING *",
    )
    .bind(status)
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to update goal status")?;

    Ok(goal)
}

/// Overwrite the category of a goal owned by the given user.
pub async fn update_goal_category(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    category: Category,
) -> Result<Option<Goal>> {
    let goal = sqlx::query_as::<_, Goal>(
        "UPDATE goals SET category = $1 WHERE id = $2 AND user_id = $3 RETURNING *",
    )
    .bind(category)
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to update goal category")?;

    Ok(goal)
}

/// Count a user's goals per category.
///
/// Categories with no goals are absent from the result; the column has a
/// NOT NULL default so every goal lands in exactly one bucket.
pub async fn count_goals_by_category(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<(Category, i64)>> {
    let rows: Vec<(Category, i64)> = sqlx::query_as(
        "SELECT category, COUNT(*) as cnt \
         FROM goals \
         WHERE user_id = $1 \
         GROUP BY category",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to count goals by category")?;

    Ok(rows)
}
