//! Integration tests for user/goal/habit CRUD and the cascade behaviors.

use stride_db::models::{Category, Frequency, GoalStatus};
use stride_db::queries::{goals, habits, users};
use stride_test_utils::{create_test_db, drop_test_db};
use uuid::Uuid;

async fn seed_user(pool: &sqlx::PgPool) -> stride_db::models::User {
    users::insert_user(pool, "crud@example.com", "$argon2id$stub")
        .await
        .expect("insert_user should succeed")
}

#[tokio::test]
async fn insert_and_get_goal() {
    let (pool, db_name) = create_test_db().await;
    let user = seed_user(&pool).await;

    let goal = goals::insert_goal(&pool, user.id, "read more books", Category::Wellness, None)
        .await
        .expect("insert_goal should succeed");

    assert_eq!(goal.description, "read more books");
    assert_eq!(goal.category, Category::Wellness);
    assert_eq!(goal.status, GoalStatus::InProgress);
    assert!(goal.target_date.is_none());

    let fetched = goals::get_goal_for_user(&pool, goal.id, user.id)
        .await
        .expect("get_goal_for_user should succeed")
        .expect("goal should exist");
    assert_eq!(fetched.id, goal.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn goal_lookup_filters_by_owner() {
    let (pool, db_name) = create_test_db().await;
    let owner = seed_user(&pool).await;
    let stranger = users::insert_user(&pool, "stranger@example.com", "$argon2id$stub")
        .await
        .expect("insert_user should succeed");

    let goal = goals::insert_goal(&pool, owner.id, "run a marathon", Category::Health, None)
        .await
        .expect("insert_goal should succeed");

    let miss = goals::get_goal_for_user(&pool, goal.id, stranger.id)
        .await
        .expect("lookup should succeed");
    assert!(miss.is_none(), "non-owner must not see the goal");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn habit_batch_references_goal() {
    let (pool, db_name) = create_test_db().await;
    let user = seed_user(&pool).await;
    let goal = goals::insert_goal(&pool, user.id, "learn piano", Category::Other, None)
        .await
        .expect("insert_goal should succeed");

    habits::insert_habit(&pool, goal.id, "practice scales", Frequency::Daily)
        .await
        .expect("insert_habit should succeed");
    habits::insert_habit(&pool, goal.id, "attend a lesson", Frequency::Weekly)
        .await
        .expect("insert_habit should succeed");

    let listed = habits::list_habits_for_goal(&pool, goal.id)
        .await
        .expect("list should succeed");
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|h| h.goal_id == goal.id));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn deleting_goal_cascades_to_habits() {
    let (pool, db_name) = create_test_db().await;
    let user = seed_user(&pool).await;
    let goal = goals::insert_goal(&pool, user.id, "save money", Category::Financial, None)
        .await
        .expect("insert_goal should succeed");
    habits::insert_habit(&pool, goal.id, "log expenses", Frequency::Daily)
        .await
        .expect("insert_habit should succeed");

    // FK-level cascade: removing the goal row removes its habits.
    sqlx::query("DELETE FROM goals WHERE id = $1")
        .bind(goal.id)
        .execute(&pool)
        .await
        .expect("delete should succeed");

    let remaining = habits::count_habits_for_goal(&pool, goal.id)
        .await
        .expect("count should succeed");
    assert_eq!(remaining, 0);

    let gone = goals::get_goal_for_user(&pool, goal.id, user.id)
        .await
        .expect("lookup should succeed");
    assert!(gone.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn status_update_requires_ownership() {
    let (pool, db_name) = create_test_db().await;
    let user = seed_user(&pool).await;
    let goal = goals::insert_goal(&pool, user.id, "walk the dog", Category::Pets, None)
        .await
        .expect("insert_goal should succeed");

    let updated = goals::update_goal_status(&pool, goal.id, user.id, GoalStatus::Completed)
        .await
        .expect("update should succeed")
        .expect("owner update should match");
    assert_eq!(updated.status, GoalStatus::Completed);

    let denied = goals::update_goal_status(&pool, goal.id, Uuid::new_v4(), GoalStatus::Abandoned)
        .await
        .expect("update should succeed");
    assert!(denied.is_none(), "non-owner update must match zero rows");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn category_counts_group_correctly() {
    let (pool, db_name) = create_test_db().await;
    let user = seed_user(&pool).await;

    for desc in ["gym", "sleep earlier", "eat greens"] {
        goals::insert_goal(&pool, user.id, desc, Category::Health, None)
            .await
            .expect("insert_goal should succeed");
    }
    goals::insert_goal(&pool, user.id, "misc goal", Category::Other, None)
        .await
        .expect("insert_goal should succeed");

    let counts = goals::count_goals_by_category(&pool, user.id)
        .await
        .expect("count should succeed");

    let health = counts
        .iter()
        .find(|(c, _)| *c == Category::Health)
        .map(|(_, n)| *n);
    let other = counts
        .iter()
        .find(|(c, _)| *c == Category::Other)
        .map(|(_, n)| *n);
    assert_eq!(health, Some(3));
    assert_eq!(other, Some(1));
    assert_eq!(counts.len(), 2);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn duplicate_email_rejected() {
    let (pool, db_name) = create_test_db().await;
    users::insert_user(&pool, "dupe@example.com", "$argon2id$stub")
        .await
        .expect("first insert should succeed");

    let second = users::insert_user(&pool, "dupe@example.com", "$argon2id$stub").await;
    assert!(second.is_err(), "unique constraint should reject duplicate");

    assert!(
        users::email_exists(&pool, "dupe@example.com")
            .await
            .expect("email_exists should succeed")
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}
