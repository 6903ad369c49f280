//! Configuration file management for stride.
//!
//! Provides a TOML-based config file at `~/.config/stride/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use stride_core::auth::TokenConfig;
use stride_core::planner::PlannerConfig;
use stride_db::config::DbConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub auth: AuthSection,
    #[serde(default)]
    pub planner: PlannerSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthSection {
    /// Hex-encoded token secret (64 hex chars = 32 bytes).
    pub token_secret: String,
    /// Session lifetime in hours.
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PlannerSection {
    /// Model name; defaults to `gpt-4o-mini`.
    #[serde(default)]
    pub model: Option<String>,
    /// API base URL; defaults to `https://api.openai.com`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_session_ttl_hours() -> i64 {
    24
}

pub const DEFAULT_PLANNER_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_PLANNER_BASE_URL: &str = "https://api.openai.com";

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the stride config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/stride` or `~/.config/stride`.
/// We intentionally ignore the platform-specific `dirs::config_dir()`
/// (which returns `~/Library/Application Support` on macOS).
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("stride");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("stride")
}

/// Return the path to the stride config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // Set permissions to 0600 (owner read/write only) on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Token secret generation
// -----------------------------------------------------------------------

/// Generate a random token secret: 32 random bytes, hex-encoded (64 chars).
pub fn generate_token_secret() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct StrideConfig {
    pub db_config: DbConfig,
    pub token_config: TokenConfig,
    pub session_ttl: chrono::Duration,
}

impl StrideConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `STRIDE_DATABASE_URL` env > `config_file.database.url` > `DbConfig::DEFAULT_URL`
    /// - Token secret: `STRIDE_TOKEN_SECRET` env > `config_file.auth.token_secret` (hex-decoded) > error
    /// - Session TTL: `config_file.auth.session_ttl_hours` > 24 hours
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = load_config().ok();

        // DB URL resolution.
        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var("STRIDE_DATABASE_URL") {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };
        let db_config = DbConfig::new(db_url);

        // Token secret resolution.
        let token_config = if let Ok(secret_hex) = std::env::var("STRIDE_TOKEN_SECRET") {
            let bytes = hex::decode(&secret_hex)
                .context("STRIDE_TOKEN_SECRET env var is not valid hex")?;
            TokenConfig::new(bytes)
        } else if let Some(ref cfg) = file_config {
            let bytes = hex::decode(&cfg.auth.token_secret)
                .context("invalid hex in config file token_secret")?;
            TokenConfig::new(bytes)
        } else {
            bail!(
                "token secret not found; set STRIDE_TOKEN_SECRET or run `stride init` to create a config file"
            );
        };

        let session_ttl_hours = file_config
            .as_ref()
            .map(|cfg| cfg.auth.session_ttl_hours)
            .unwrap_or_else(default_session_ttl_hours);
        if session_ttl_hours <= 0 {
            bail!("auth.session_ttl_hours must be positive");
        }

        Ok(Self {
            db_config,
            token_config,
            session_ttl: chrono::Duration::hours(session_ttl_hours),
        })
    }

    /// Resolve the planner client configuration.
    ///
    /// - API key: `STRIDE_PLANNER_API_KEY` env > `OPENAI_API_KEY` env > error.
    ///   Keys never live in the config file.
    /// - Model / base URL / timeout: env > config file > default.
    pub fn resolve_planner() -> Result<PlannerConfig> {
        let file_config = load_config().ok();
        let planner_section = file_config.map(|cfg| cfg.planner).unwrap_or_default();

        let api_key = std::env::var("STRIDE_PLANNER_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| {
                anyhow::anyhow!(
                    "planner API key not found; set STRIDE_PLANNER_API_KEY or OPENAI_API_KEY"
                )
            })?;

        let model = std::env::var("STRIDE_PLANNER_MODEL")
            .ok()
            .or(planner_section.model)
            .unwrap_or_else(|| DEFAULT_PLANNER_MODEL.to_string());
        let base_url = std::env::var("STRIDE_PLANNER_BASE_URL")
            .ok()
            .or(planner_section.base_url)
            .unwrap_or_else(|| DEFAULT_PLANNER_BASE_URL.to_string());

        let mut config = PlannerConfig::new(model, base_url, api_key);
        if let Some(secs) = planner_section.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
