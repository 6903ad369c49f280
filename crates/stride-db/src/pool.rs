use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use tracing::info;

use crate::config::DbConfig;

/// Schema migrations compiled in from `crates/stride-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Every table the schema defines, in dependency order.
const TABLES: [&str; 4] = ["users", "goals", "habits", "todos"];

/// Open a pool against the configured URL. Five connections cover both
/// the CLI one-shots and the API server.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_url))?;
    Ok(pool)
}

/// Apply any migrations the connected database has not seen yet.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;

    info!("migrations applied successfully");
    Ok(())
}

/// `CREATE DATABASE` cannot take bind parameters, so the name gets
/// spliced into the statement and must be vetted first.
fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Create the configured database if it does not exist yet, going
/// through the server's `postgres` maintenance database.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<()> {
    let db_name = config
        .database_name()
        .context("database URL names no database")?;
    if !is_safe_identifier(db_name) {
        anyhow::bail!("refusing to create database with unsafe name {db_name:?}");
    }

    let maintenance_url = config.maintenance_url();
    let mut conn = PgConnection::connect(&maintenance_url)
        .await
        .with_context(|| format!("failed to connect to {maintenance_url}"))?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&mut conn)
            .await
            .context("failed to look up database in pg_database")?;

    if exists {
        info!(db = db_name, "database already exists");
    } else {
        let stmt = format!("CREATE DATABASE {db_name}");
        conn.execute(stmt.as_str())
            .await
            .with_context(|| format!("failed to create database {db_name}"))?;
        info!(db = db_name, "database created");
    }

    let _ = conn.close().await;
    Ok(())
}

/// Row counts for the stride tables; `stride db-init` prints these as
/// its success summary.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(&'static str, i64)>> {
    let mut counts = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let stmt = format!("SELECT COUNT(*) FROM {table}");
        let count: i64 = sqlx::query_scalar(&stmt)
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to count rows in {table}"))?;
        counts.push((table, count));
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::is_safe_identifier;

    #[test]
    fn plain_names_are_safe() {
        assert!(is_safe_identifier("stride"));
        assert!(is_safe_identifier("stride_it_0af3"));
    }

    #[test]
    fn injection_shaped_names_are_rejected() {
        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("stride; DROP TABLE users"));
        assert!(!is_safe_identifier("stride-prod"));
    }
}
