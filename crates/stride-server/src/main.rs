mod config;
mod serve;
#[cfg(test)]
mod test_util;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use stride_core::planner::OpenAiPlanner;
use stride_db::pool;

use config::StrideConfig;

#[derive(Parser)]
#[command(name = "stride", about = "Goal decomposition and habit tracking service")]
struct Cli {
    /// Database URL (overrides STRIDE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a stride config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/stride")]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the stride database (requires config file or env vars)
    DbInit,
    /// Run the HTTP API server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

/// Execute the `stride init` command: write config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let token_secret = config::generate_token_secret();

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        auth: config::AuthSection {
            token_secret: token_secret.clone(),
            session_ttl_hours: 24,
        },
        planner: config::PlannerSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!(
        "  auth.token_secret = {}...{}",
        &token_secret[..8],
        &token_secret[56..]
    );
    println!();
    println!("Next: run `stride db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `stride db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = StrideConfig::resolve(cli_db_url)?;

    println!("Initializing stride database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("stride db-init complete.");
    Ok(())
}

/// Execute the `stride serve` command: run the HTTP API.
async fn cmd_serve(cli_db_url: Option<&str>, bind: &str, port: u16) -> anyhow::Result<()> {
    let resolved = StrideConfig::resolve(cli_db_url)?;
    let planner_config = StrideConfig::resolve_planner()?;

    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let planner = OpenAiPlanner::new(planner_config)
        .map_err(|e| anyhow::anyhow!("failed to build planner client: {e}"))?;

    let state = serve::AppState {
        pool: db_pool.clone(),
        planner: Arc::new(planner),
        tokens: resolved.token_config,
        session_ttl: resolved.session_ttl,
    };

    let result = serve::run_serve(state, bind, port).await;
    db_pool.close().await;
    result
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            cmd_serve(cli.database_url.as_deref(), &bind, port).await?;
        }
    }

    Ok(())
}
