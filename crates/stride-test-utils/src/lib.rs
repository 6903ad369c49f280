//! PostgreSQL harness for stride's integration tests.
//!
//! One server, many throwaway databases: the first test in a binary
//! either picks up an externally managed server from `STRIDE_TEST_PG_URL`
//! or starts a postgres container, and every test then creates (and
//! later drops) a uniquely named, fully migrated database on it.

use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use stride_db::pool;

static PG_SERVER: OnceCell<PgServer> = OnceCell::const_new();

struct PgServer {
    /// Server-root URL, no database path.
    url: String,
    /// Keeps the container alive for the rest of the test binary.
    /// `None` when `STRIDE_TEST_PG_URL` points at an external server.
    _keepalive: Option<ContainerAsync<Postgres>>,
}

impl PgServer {
    async fn get() -> &'static PgServer {
        PG_SERVER.get_or_init(Self::start).await
    }

    async fn start() -> PgServer {
        if let Ok(url) = std::env::var("STRIDE_TEST_PG_URL") {
            return PgServer {
                url,
                _keepalive: None,
            };
        }

        let container = Postgres::default()
            .with_tag("18")
            .start()
            .await
            .expect("postgres container should start");
        let host = container.get_host().await.expect("container host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("container port mapping");

        PgServer {
            url: format!("postgresql://postgres:postgres@{host}:{port}"),
            _keepalive: Some(container),
        }
    }

    /// One-shot connection to the server's `postgres` maintenance
    /// database, for statements that cannot run inside the target
    /// database itself.
    async fn maintenance(&self) -> PgConnection {
        PgConnection::connect(&format!("{}/postgres", self.url))
            .await
            .expect("maintenance connection should open")
    }
}

/// Create a migrated throwaway database and a pool connected to it.
///
/// Returns the pool and the database name; hand the name back to
/// [`drop_test_db`] after closing the pool.
pub async fn create_test_db() -> (PgPool, String) {
    let server = PgServer::get().await;
    let db_name = format!("stride_it_{}", Uuid::new_v4().simple());

    let mut maint = server.maintenance().await;
    maint
        .execute(format!("CREATE DATABASE {db_name}").as_str())
        .await
        .unwrap_or_else(|e| panic!("creating {db_name} failed: {e}"));
    let _ = maint.close().await;

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&format!("{}/{db_name}", server.url))
        .await
        .unwrap_or_else(|e| panic!("connecting to {db_name} failed: {e}"));
    pool::run_migrations(&db_pool)
        .await
        .expect("migrations should apply to a fresh database");

    (db_pool, db_name)
}

/// Drop a throwaway database, kicking off any session still holding it
/// open. Dropping a database that is already gone is not an error.
pub async fn drop_test_db(db_name: &str) {
    let server = PgServer::get().await;
    let mut maint = server.maintenance().await;

    let terminate = format!(
        "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
         WHERE datname = '{db_name}' AND pid <> pg_backend_pid()"
    );
    let _ = maint.execute(terminate.as_str()).await;
    let _ = maint
        .execute(format!("DROP DATABASE IF EXISTS {db_name}").as_str())
        .await;
    let _ = maint.close().await;
}
