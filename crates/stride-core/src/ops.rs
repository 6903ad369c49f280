//! Goal/habit store operations.
//!
//! Every multi-row mutation runs inside a single database transaction, so
//! a goal can never be observed without its habit set and a failed
//! operation leaves nothing behind. Planning always happens before the
//! first write: a planner failure aborts the operation with no partial
//! state.

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use stride_db::models::{Category, Frequency, Goal, GoalStatus, Habit};
use stride_db::queries::{goals as goal_queries, habits as habit_queries};

use crate::error::OpError;
use crate::planner::{HabitPlanner, PlannedHabit};
use crate::progress;
use crate::todos::today_start_utc;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Input for goal creation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewGoal {
    pub description: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
}

/// One caller-supplied habit for explicit replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitSpec {
    pub description: String,
    pub frequency: Frequency,
}

/// Input for a goal content update.
///
/// The driving change is the description XOR the explicit habit list;
/// category may accompany a description change or stand alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoalUpdate {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub habits: Option<Vec<HabitSpec>>,
}

/// A goal with its habit set attached.
#[derive(Debug, Clone, Serialize)]
pub struct GoalWithHabits {
    #[serde(flatten)]
    pub goal: Goal,
    pub habits: Vec<Habit>,
}

/// A goal with habits and lifetime completion progress.
#[derive(Debug, Clone, Serialize)]
pub struct GoalDetail {
    #[serde(flatten)]
    pub goal: Goal,
    pub habits: Vec<Habit>,
    pub progress: f64,
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Plan habits for a new goal, then persist the goal, its habits, and
/// today's todos for the daily ones, all in one transaction.
///
/// A planner error or a plan with zero valid habits fails the whole
/// operation with [`OpError::PlanningFailed`]; nothing is written.
pub async fn create_goal(
    pool: &PgPool,
    planner: &dyn HabitPlanner,
    user_id: Uuid,
    new_goal: NewGoal,
) -> Result<GoalWithHabits, OpError> {
    let description = new_goal.description.trim();
    if description.is_empty() {
        return Err(OpError::Validation("goal description is empty".to_owned()));
    }

    let planned = run_planner(planner, description).await?;

    let mut tx = pool
        .begin()
        .await
        .context("failed to begin transaction")
        .map_err(OpError::Storage)?;

    let goal = sqlx::query_as::<_, Goal>(
        "INSERT INTO goals (user_id, description, category, target_date) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(user_id)
    .bind(description)
    .bind(new_goal.category.unwrap_or_default())
    .bind(new_goal.target_date)
    .fetch_one(&mut *tx)
    .await
    .context("failed to insert goal")
    .map_err(OpError::Storage)?;

    let habits = insert_habit_rows(&mut tx, goal.id, &planned).await?;
    seed_daily_todos(&mut tx, user_id, &habits).await?;

    tx.commit()
        .await
        .context("failed to commit goal creation")
        .map_err(OpError::Storage)?;

    tracing::info!(
        goal_id = %goal.id,
        habit_count = habits.len(),
        "goal created"
    );

    Ok(GoalWithHabits { goal, habits })
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Apply a content update to an owned goal.
///
/// - Description present: replan from the new description **before** any
///   write, then update the description (and category, if given) and
///   replace the habit set, in one transaction.
/// - Explicit habit list present: replace the habit set verbatim without
///   invoking the planner; an empty list is allowed and leaves the goal
///   with zero habits.
/// - Category alone: plain field update.
pub async fn update_goal(
    pool: &PgPool,
    planner: &dyn HabitPlanner,
    user_id: Uuid,
    goal_id: Uuid,
    update: GoalUpdate,
) -> Result<GoalWithHabits, OpError> {
    if update.description.is_some() && update.habits.is_some() {
        return Err(OpError::Validation(
            "an update carries either a new description or an explicit habit list, not both"
                .to_owned(),
        ));
    }
    if update.description.is_none() && update.habits.is_none() && update.category.is_none() {
        return Err(OpError::Validation("update carries no change".to_owned()));
    }

    let goal = goal_queries::get_goal_for_user(pool, goal_id, user_id)
        .await
        .map_err(OpError::Storage)?
        .ok_or(OpError::NotFound("goal"))?;

    if let Some(raw_description) = update.description {
        let description = raw_description.trim().to_owned();
        if description.is_empty() {
            return Err(OpError::Validation("goal description is empty".to_owned()));
        }

        // Replan before touching storage: a planning failure must not
        // leave the goal with a new description and stale habits.
        let planned = run_planner(planner, &description).await?;

        let mut tx = pool
            .begin()
            .await
            .context("failed to begin transaction")
            .map_err(OpError::Storage)?;

        let goal = sqlx::query_as::<_, Goal>(
            "UPDATE goals \
             SET description = $1, category = COALESCE($2, category) \
             WHERE id = $3 AND user_id = $4 \
             RETURNING *",
        )
        .bind(&description)
        .bind(update.category)
        .bind(goal_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .context("failed to update goal description")
        .map_err(OpError::Storage)?
        .ok_or(OpError::NotFound("goal"))?;

        delete_habit_rows(&mut tx, goal_id).await?;
        let habits = insert_habit_rows(&mut tx, goal_id, &planned).await?;

        tx.commit()
            .await
            .context("failed to commit goal update")
            .map_err(OpError::Storage)?;

        return Ok(GoalWithHabits { goal, habits });
    }

    if let Some(specs) = update.habits {
        let planned: Vec<PlannedHabit> = specs
            .into_iter()
            .map(|s| PlannedHabit {
                description: s.description,
                frequency: s.frequency,
            })
            .collect();

        let mut tx = pool
            .begin()
            .await
            .context("failed to begin transaction")
            .map_err(OpError::Storage)?;

        let goal = sqlx::query_as::<_, Goal>(
            "UPDATE goals \
             SET category = COALESCE($1, category) \
             WHERE id = $2 AND user_id = $3 \
             RETURNING *",
        )
        .bind(update.category)
        .bind(goal_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .context("failed to update goal")
        .map_err(OpError::Storage)?
        .ok_or(OpError::NotFound("goal"))?;

        delete_habit_rows(&mut tx, goal_id).await?;
        let habits = insert_habit_rows(&mut tx, goal_id, &planned).await?;

        tx.commit()
            .await
            .context("failed to commit habit replacement")
            .map_err(OpError::Storage)?;

        return Ok(GoalWithHabits { goal, habits });
    }

    // Category-only update.
    let category = update
        .category
        .unwrap_or(goal.category);
    let goal = goal_queries::update_goal_category(pool, goal_id, user_id, category)
        .await
        .map_err(OpError::Storage)?
        .ok_or(OpError::NotFound("goal"))?;

    let habits = habit_queries::list_habits_for_goal(pool, goal_id)
        .await
        .map_err(OpError::Storage)?;

    Ok(GoalWithHabits { goal, habits })
}

/// Overwrite the lifecycle status of an owned goal.
///
/// No legal-transition validation and no terminal-state lock; any variant
/// may follow any other.
pub async fn set_goal_status(
    pool: &PgPool,
    user_id: Uuid,
    goal_id: Uuid,
    status: GoalStatus,
) -> Result<Goal, OpError> {
    goal_queries::update_goal_status(pool, goal_id, user_id, status)
        .await
        .map_err(OpError::Storage)?
        .ok_or(OpError::NotFound("goal"))
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// Delete an owned goal, its habits, and the todos derived from them, as
/// one transaction.
pub async fn delete_goal(pool: &PgPool, user_id: Uuid, goal_id: Uuid) -> Result<(), OpError> {
    let _goal = goal_queries::get_goal_for_user(pool, goal_id, user_id)
        .await
        .map_err(OpError::Storage)?
        .ok_or(OpError::NotFound("goal"))?;

    let mut tx = pool
        .begin()
        .await
        .context("failed to begin transaction")
        .map_err(OpError::Storage)?;

    sqlx::query(
        "DELETE FROM todos t USING habits h \
         WHERE t.habit_id = h.id AND h.goal_id = $1",
    )
    .bind(goal_id)
    .execute(&mut *tx)
    .await
    .context("failed to delete todos for goal")
    .map_err(OpError::Storage)?;

    sqlx::query("DELETE FROM habits WHERE goal_id = $1")
        .bind(goal_id)
        .execute(&mut *tx)
        .await
        .context("failed to delete habits for goal")
        .map_err(OpError::Storage)?;

    sqlx::query("DELETE FROM goals WHERE id = $1 AND user_id = $2")
        .bind(goal_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("failed to delete goal")
        .map_err(OpError::Storage)?;

    tx.commit()
        .await
        .context("failed to commit goal deletion")
        .map_err(OpError::Storage)?;

    tracing::info!(goal_id = %goal_id, "goal deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// Fetch one owned goal with habits and progress.
pub async fn get_goal_detail(
    pool: &PgPool,
    user_id: Uuid,
    goal_id: Uuid,
) -> Result<GoalDetail, OpError> {
    let goal = goal_queries::get_goal_for_user(pool, goal_id, user_id)
        .await
        .map_err(OpError::Storage)?
        .ok_or(OpError::NotFound("goal"))?;

    let habits = habit_queries::list_habits_for_goal(pool, goal_id)
        .await
        .map_err(OpError::Storage)?;
    let progress = progress::progress_for_goal(pool, goal_id)
        .await
        .map_err(OpError::Storage)?;

    Ok(GoalDetail {
        goal,
        habits,
        progress,
    })
}

/// List all of a user's goals, each with habits and progress.
pub async fn list_goal_details(pool: &PgPool, user_id: Uuid) -> Result<Vec<GoalDetail>, OpError> {
    let goals = goal_queries::list_goals_for_user(pool, user_id)
        .await
        .map_err(OpError::Storage)?;

    let mut details = Vec::with_capacity(goals.len());
    for goal in goals {
        let habits = habit_queries::list_habits_for_goal(pool, goal.id)
            .await
            .map_err(OpError::Storage)?;
        let progress = progress::progress_for_goal(pool, goal.id)
            .await
            .map_err(OpError::Storage)?;
        details.push(GoalDetail {
            goal,
            habits,
            progress,
        });
    }

    Ok(details)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Invoke the planner, mapping both call failure and a zero-valid-habit
/// result to [`OpError::PlanningFailed`]. A goal cannot exist without
/// habits, so the two cases collapse deliberately.
async fn run_planner(
    planner: &dyn HabitPlanner,
    description: &str,
) -> Result<Vec<PlannedHabit>, OpError> {
    let planned = planner
        .plan(description)
        .await
        .map_err(|e| OpError::PlanningFailed(e.to_string()))?;

    if planned.is_empty() {
        return Err(OpError::PlanningFailed(
            "planner produced no usable habits".to_owned(),
        ));
    }
    Ok(planned)
}

async fn insert_habit_rows(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    goal_id: Uuid,
    planned: &[PlannedHabit],
) -> Result<Vec<Habit>, OpError> {
    let mut habits = Vec::with_capacity(planned.len());
    for entry in planned {
        let habit = sqlx::query_as::<_, Habit>(
            "INSERT INTO habits (goal_id, description, frequency) \
             VALUES ($1, $2, $3) \
             RETURNING *",
        )
        .bind(goal_id)
        .bind(&entry.description)
        .bind(entry.frequency)
        .fetch_one(&mut **tx)
        .await
        .with_context(|| format!("failed to insert habit {:?}", entry.description))
        .map_err(OpError::Storage)?;
        habits.push(habit);
    }
    Ok(habits)
}

async fn delete_habit_rows(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    goal_id: Uuid,
) -> Result<(), OpError> {
    sqlx::query("DELETE FROM habits WHERE goal_id = $1")
        .bind(goal_id)
        .execute(&mut **tx)
        .await
        .context("failed to delete existing habits")
        .map_err(OpError::Storage)?;
    Ok(())
}

/// Seed today's todo for each freshly created daily habit, inside the
/// creation transaction. Conflict suppression keeps this idempotent with
/// any concurrent materialization.
async fn seed_daily_todos(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    habits: &[Habit],
) -> Result<(), OpError> {
    let due_date = today_start_utc();
    for habit in habits.iter().filter(|h| h.frequency == Frequency::Daily) {
        sqlx::query(
            "INSERT INTO todos (user_id, habit_id, description, due_date) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (habit_id, due_date) WHERE habit_id IS NOT NULL DO NOTHING",
        )
        .bind(user_id)
        .bind(habit.id)
        .bind(&habit.description)
        .bind(due_date)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("failed to seed todo for habit {}", habit.id))
        .map_err(OpError::Storage)?;
    }
    Ok(())
}
