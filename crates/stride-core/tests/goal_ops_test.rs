//! Integration tests for the goal operations layer.
//!
//! Exercises create/update/delete/status against a real PostgreSQL
//! database, with stub planners in place of the external endpoint. Each
//! test creates an isolated temporary database.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use stride_core::ops::{self, GoalUpdate, HabitSpec, NewGoal};
use stride_core::planner::{HabitPlanner, PlannedHabit, PlannerError};
use stride_core::OpError;
use stride_db::models::{Category, Frequency, GoalStatus};
use stride_db::queries::{habits, users};
use stride_test_utils::{create_test_db, drop_test_db};

/// Planner that returns a fixed habit list.
struct StubPlanner(Vec<PlannedHabit>);

#[async_trait]
impl HabitPlanner for StubPlanner {
    async fn plan(&self, _goal_description: &str) -> Result<Vec<PlannedHabit>, PlannerError> {
        Ok(self.0.clone())
    }
}

/// Planner whose call always fails.
struct FailingPlanner;

#[async_trait]
impl HabitPlanner for FailingPlanner {
    async fn plan(&self, _goal_description: &str) -> Result<Vec<PlannedHabit>, PlannerError> {
        Err(PlannerError::Request("connection refused".to_owned()))
    }
}

/// Planner that must never be invoked.
struct PanickingPlanner;

#[async_trait]
impl HabitPlanner for PanickingPlanner {
    async fn plan(&self, _goal_description: &str) -> Result<Vec<PlannedHabit>, PlannerError> {
        panic!("planner must not be called on this code path");
    }
}

fn reading_plan() -> Vec<PlannedHabit> {
    vec![
        PlannedHabit {
            description: "Read for 15 minutes".to_owned(),
            frequency: Frequency::Daily,
        },
        PlannedHabit {
            description: "Visit the library".to_owned(),
            frequency: Frequency::Weekly,
        },
    ]
}

async fn create_user(pool: &PgPool, email: &str) -> Uuid {
    users::insert_user(pool, email, "$argon2id$stub")
        .await
        .expect("user insert should succeed")
        .id
}

#[tokio::test]
async fn create_goal_persists_goal_habits_and_todays_todos() {
    let (pool, db_name) = create_test_db().await;
    let user_id = create_user(&pool, "reader@example.com").await;
    let planner = StubPlanner(reading_plan());

    let created = ops::create_goal(
        &pool,
        &planner,
        user_id,
        NewGoal {
            description: "  Read more books  ".to_owned(),
            category: Some(Category::Wellness),
            target_date: None,
        },
    )
    .await
    .expect("creation should succeed");

    assert_eq!(created.goal.description, "Read more books");
    assert_eq!(created.goal.category, Category::Wellness);
    assert_eq!(created.goal.status, GoalStatus::InProgress);
    assert_eq!(created.habits.len(), 2);

    // Only the daily habit materialized a todo for today.
    let todos = stride_core::todos::ensure_today_todos(&pool, user_id)
        .await
        .expect("materialization should succeed");
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].description, "Read for 15 minutes");
    assert!(!todos[0].completed);

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn create_goal_defaults_category_to_other() {
    let (pool, db_name) = create_test_db().await;
    let user_id = create_user(&pool, "default@example.com").await;
    let planner = StubPlanner(reading_plan());

    let created = ops::create_goal(
        &pool,
        &planner,
        user_id,
        NewGoal {
            description: "Tidy the garage".to_owned(),
            category: None,
            target_date: None,
        },
    )
    .await
    .expect("creation should succeed");

    assert_eq!(created.goal.category, Category::Other);
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn create_goal_planner_failure_writes_nothing() {
    let (pool, db_name) = create_test_db().await;
    let user_id = create_user(&pool, "nothing@example.com").await;

    let result = ops::create_goal(
        &pool,
        &FailingPlanner,
        user_id,
        NewGoal {
            description: "Run a marathon".to_owned(),
            category: None,
            target_date: None,
        },
    )
    .await;
    assert!(matches!(result, Err(OpError::PlanningFailed(_))));

    let goals = ops::list_goal_details(&pool, user_id)
        .await
        .expect("listing should succeed");
    assert!(goals.is_empty(), "no partial goal may survive");

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn create_goal_empty_plan_is_planning_failure() {
    let (pool, db_name) = create_test_db().await;
    let user_id = create_user(&pool, "empty@example.com").await;
    let planner = StubPlanner(Vec::new());

    let result = ops::create_goal(
        &pool,
        &planner,
        user_id,
        NewGoal {
            description: "Learn the theremin".to_owned(),
            category: None,
            target_date: None,
        },
    )
    .await;
    assert!(matches!(result, Err(OpError::PlanningFailed(_))));

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn create_goal_rejects_blank_description() {
    let (pool, db_name) = create_test_db().await;
    let user_id = create_user(&pool, "blank@example.com").await;

    let result = ops::create_goal(
        &pool,
        &PanickingPlanner,
        user_id,
        NewGoal {
            description: "   ".to_owned(),
            category: None,
            target_date: None,
        },
    )
    .await;
    assert!(matches!(result, Err(OpError::Validation(_))));

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn update_description_replans_and_replaces_habits() {
    let (pool, db_name) = create_test_db().await;
    let user_id = create_user(&pool, "replan@example.com").await;

    let created = ops::create_goal(
        &pool,
        &StubPlanner(reading_plan()),
        user_id,
        NewGoal {
            description: "Read more books".to_owned(),
            category: None,
            target_date: None,
        },
    )
    .await
    .expect("creation should succeed");

    let new_plan = StubPlanner(vec![PlannedHabit {
        description: "Swim three laps".to_owned(),
        frequency: Frequency::Daily,
    }]);
    let updated = ops::update_goal(
        &pool,
        &new_plan,
        user_id,
        created.goal.id,
        GoalUpdate {
            description: Some("Get better at swimming".to_owned()),
            category: Some(Category::Health),
            habits: None,
        },
    )
    .await
    .expect("update should succeed");

    assert_eq!(updated.goal.description, "Get better at swimming");
    assert_eq!(updated.goal.category, Category::Health);
    assert_eq!(updated.habits.len(), 1);
    assert_eq!(updated.habits[0].description, "Swim three laps");

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn update_description_planner_failure_leaves_goal_untouched() {
    let (pool, db_name) = create_test_db().await;
    let user_id = create_user(&pool, "stale@example.com").await;

    let created = ops::create_goal(
        &pool,
        &StubPlanner(reading_plan()),
        user_id,
        NewGoal {
            description: "Read more books".to_owned(),
            category: None,
            target_date: None,
        },
    )
    .await
    .expect("creation should succeed");

    let result = ops::update_goal(
        &pool,
        &FailingPlanner,
        user_id,
        created.goal.id,
        GoalUpdate {
            description: Some("Something else entirely".to_owned()),
            category: None,
            habits: None,
        },
    )
    .await;
    assert!(matches!(result, Err(OpError::PlanningFailed(_))));

    // Neither the description nor the habit set changed.
    let detail = ops::get_goal_detail(&pool, user_id, created.goal.id)
        .await
        .expect("fetch should succeed");
    assert_eq!(detail.goal.description, "Read more books");
    assert_eq!(detail.habits.len(), 2);

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn explicit_habit_list_bypasses_planner() {
    let (pool, db_name) = create_test_db().await;
    let user_id = create_user(&pool, "explicit@example.com").await;

    let created = ops::create_goal(
        &pool,
        &StubPlanner(reading_plan()),
        user_id,
        NewGoal {
            description: "Read more books".to_owned(),
            category: None,
            target_date: None,
        },
    )
    .await
    .expect("creation should succeed");

    let updated = ops::update_goal(
        &pool,
        &PanickingPlanner,
        user_id,
        created.goal.id,
        GoalUpdate {
            description: None,
            category: None,
            habits: Some(vec![HabitSpec {
                description: "Read one chapter".to_owned(),
                frequency: Frequency::Daily,
            }]),
        },
    )
    .await
    .expect("explicit replacement should succeed without planning");

    assert_eq!(updated.habits.len(), 1);
    assert_eq!(updated.habits[0].description, "Read one chapter");

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn explicit_empty_habit_list_clears_habits() {
    let (pool, db_name) = create_test_db().await;
    let user_id = create_user(&pool, "clear@example.com").await;

    let created = ops::create_goal(
        &pool,
        &StubPlanner(reading_plan()),
        user_id,
        NewGoal {
            description: "Read more books".to_owned(),
            category: None,
            target_date: None,
        },
    )
    .await
    .expect("creation should succeed");

    let updated = ops::update_goal(
        &pool,
        &PanickingPlanner,
        user_id,
        created.goal.id,
        GoalUpdate {
            description: None,
            category: None,
            habits: Some(Vec::new()),
        },
    )
    .await
    .expect("empty replacement is allowed");

    assert!(updated.habits.is_empty());
    let remaining = habits::count_habits_for_goal(&pool, created.goal.id)
        .await
        .expect("count should succeed");
    assert_eq!(remaining, 0);

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn update_rejects_description_and_habits_together() {
    let (pool, db_name) = create_test_db().await;
    let user_id = create_user(&pool, "both@example.com").await;

    let created = ops::create_goal(
        &pool,
        &StubPlanner(reading_plan()),
        user_id,
        NewGoal {
            description: "Read more books".to_owned(),
            category: None,
            target_date: None,
        },
    )
    .await
    .expect("creation should succeed");

    let result = ops::update_goal(
        &pool,
        &PanickingPlanner,
        user_id,
        created.goal.id,
        GoalUpdate {
            description: Some("New description".to_owned()),
            category: None,
            habits: Some(Vec::new()),
        },
    )
    .await;
    assert!(matches!(result, Err(OpError::Validation(_))));

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn category_only_update_keeps_habits() {
    let (pool, db_name) = create_test_db().await;
    let user_id = create_user(&pool, "category@example.com").await;

    let created = ops::create_goal(
        &pool,
        &StubPlanner(reading_plan()),
        user_id,
        NewGoal {
            description: "Read more books".to_owned(),
            category: None,
            target_date: None,
        },
    )
    .await
    .expect("creation should succeed");

    let updated = ops::update_goal(
        &pool,
        &PanickingPlanner,
        user_id,
        created.goal.id,
        GoalUpdate {
            description: None,
            category: Some(Category::Wellness),
            habits: None,
        },
    )
    .await
    .expect("category update should succeed");

    assert_eq!(updated.goal.category, Category::Wellness);
    assert_eq!(updated.habits.len(), 2);

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn status_overwrites_in_any_order() {
    let (pool, db_name) = create_test_db().await;
    let user_id = create_user(&pool, "status@example.com").await;

    let created = ops::create_goal(
        &pool,
        &StubPlanner(reading_plan()),
        user_id,
        NewGoal {
            description: "Read more books".to_owned(),
            category: None,
            target_date: None,
        },
    )
    .await
    .expect("creation should succeed");

    // No transition rules: completed, then back to in_progress.
    let goal = ops::set_goal_status(&pool, user_id, created.goal.id, GoalStatus::Completed)
        .await
        .expect("status update should succeed");
    assert_eq!(goal.status, GoalStatus::Completed);

    let goal = ops::set_goal_status(&pool, user_id, created.goal.id, GoalStatus::InProgress)
        .await
        .expect("status update should succeed");
    assert_eq!(goal.status, GoalStatus::InProgress);

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn operations_on_another_users_goal_are_not_found() {
    let (pool, db_name) = create_test_db().await;
    let owner = create_user(&pool, "owner@example.com").await;
    let intruder = create_user(&pool, "intruder@example.com").await;

    let created = ops::create_goal(
        &pool,
        &StubPlanner(reading_plan()),
        owner,
        NewGoal {
            description: "Read more books".to_owned(),
            category: None,
            target_date: None,
        },
    )
    .await
    .expect("creation should succeed");
    let goal_id = created.goal.id;

    let fetch = ops::get_goal_detail(&pool, intruder, goal_id).await;
    assert!(matches!(fetch, Err(OpError::NotFound("goal"))));

    let status = ops::set_goal_status(&pool, intruder, goal_id, GoalStatus::Abandoned).await;
    assert!(matches!(status, Err(OpError::NotFound("goal"))));

    let delete = ops::delete_goal(&pool, intruder, goal_id).await;
    assert!(matches!(delete, Err(OpError::NotFound("goal"))));

    // The owner still sees the goal, untouched.
    let detail = ops::get_goal_detail(&pool, owner, goal_id)
        .await
        .expect("owner fetch should succeed");
    assert_eq!(detail.goal.status, GoalStatus::InProgress);

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn delete_goal_removes_habits_and_todos() {
    let (pool, db_name) = create_test_db().await;
    let user_id = create_user(&pool, "delete@example.com").await;

    let created = ops::create_goal(
        &pool,
        &StubPlanner(reading_plan()),
        user_id,
        NewGoal {
            description: "Read more books".to_owned(),
            category: None,
            target_date: None,
        },
    )
    .await
    .expect("creation should succeed");

    ops::delete_goal(&pool, user_id, created.goal.id)
        .await
        .expect("deletion should succeed");

    let goals = ops::list_goal_details(&pool, user_id)
        .await
        .expect("listing should succeed");
    assert!(goals.is_empty());

    let todos = stride_core::todos::ensure_today_todos(&pool, user_id)
        .await
        .expect("materialization should succeed");
    assert!(todos.is_empty(), "derived todos must be gone");

    let todo_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM todos WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .expect("count should succeed");
    assert_eq!(todo_rows, 0);

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn category_stats_count_goals_per_category() {
    let (pool, db_name) = create_test_db().await;
    let user_id = create_user(&pool, "stats@example.com").await;
    let planner = StubPlanner(reading_plan());

    for (description, category) in [
        ("Read more books", Category::Wellness),
        ("Learn Spanish", Category::Wellness),
        ("Run a 10k", Category::Health),
    ] {
        ops::create_goal(
            &pool,
            &planner,
            user_id,
            NewGoal {
                description: description.to_owned(),
                category: Some(category),
                target_date: None,
            },
        )
        .await
        .expect("creation should succeed");
    }

    let stats = stride_core::progress::stats_by_category(&pool, user_id)
        .await
        .expect("stats should succeed");
    assert_eq!(stats.get(&Category::Wellness), Some(&2));
    assert_eq!(stats.get(&Category::Health), Some(&1));
    assert_eq!(stats.get(&Category::Pets), None);

    drop_test_db(&db_name).await;
}
