//! Database query functions for the `users` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::User;

/// Insert a new user row. Returns the inserted user with server-generated
/// defaults (id, created_at).
///
/// Fails on a duplicate email (unique constraint); callers that need to
/// distinguish that case should check [`email_exists`] first.
pub async fn insert_user(pool: &PgPool, email: &str, password_hash: &str) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (email, password_hash) \
         VALUES ($1, $2) \
         RETURNING *",
    )
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .context("failed to insert user")?;

    Ok(user)
}

/// Check whether a user with the given email already exists.
pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(pool)
        .await
        .context("failed to check email existence")?;

    Ok(exists)
}

/// Fetch a user by email.
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user by email")?;

    Ok(user)
}

/// Fetch a user by ID.
pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user")?;

    Ok(user)
}
