//! Stateless session tokens.
//!
//! Tokens are HMAC-SHA256 based, scoped to a (user_id, expiry) pair.
//! Format: `v1.<user_id>.<expires_unix>.<hmac_hex>`

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Version prefix for the current token format.
const TOKEN_PREFIX: &str = "v1.";

/// Errors that can occur during token operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token format: {0}")]
    InvalidFormat(String),

    #[error("invalid user ID in token: {0}")]
    InvalidUserId(String),

    #[error("invalid expiry in token: {0}")]
    InvalidExpiry(String),

    #[error("token HMAC verification failed")]
    HmacMismatch,

    #[error("token expired")]
    Expired,

    #[error("missing token secret")]
    MissingSecret,
}

/// Configuration for token generation and validation.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// The HMAC secret key bytes.
    pub secret: Vec<u8>,
}

impl TokenConfig {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }

    /// Create a TokenConfig from the `STRIDE_TOKEN_SECRET` environment
    /// variable. The value must be hex-encoded, as written by
    /// `stride init`.
    pub fn from_env() -> Result<Self, TokenError> {
        let secret_hex =
            std::env::var("STRIDE_TOKEN_SECRET").map_err(|_| TokenError::MissingSecret)?;
        let secret = hex::decode(&secret_hex).map_err(|e| {
            TokenError::InvalidFormat(format!("STRIDE_TOKEN_SECRET is not valid hex: {e}"))
        })?;
        Ok(Self::new(secret))
    }
}

/// Claims extracted from a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// The user this session belongs to.
    pub user_id: Uuid,
    /// When the session stops being valid.
    pub expires_at: DateTime<Utc>,
}

/// Generate a session token for a user, valid for `ttl`.
///
/// The HMAC-SHA256 is computed over `<user_id>:<expires_unix>`.
pub fn generate_session_token(
    config: &TokenConfig,
    user_id: Uuid,
    ttl: chrono::Duration,
) -> String {
    let expires_unix = (Utc::now() + ttl).timestamp();
    let message = format!("{user_id}:{expires_unix}");
    let mac = compute_hmac(&config.secret, message.as_bytes());
    let hmac_hex = hex::encode(mac);
    format!("{TOKEN_PREFIX}{user_id}.{expires_unix}.{hmac_hex}")
}

/// Validate a session token and extract its claims.
///
/// Parses the format, recomputes the HMAC with a constant-time
/// comparison, then checks expiry. A bad signature is reported before a
/// stale expiry: the expiry field is untrusted until the HMAC holds.
pub fn validate_session_token(
    config: &TokenConfig,
    token: &str,
) -> Result<SessionClaims, TokenError> {
    let rest = token
        .strip_prefix(TOKEN_PREFIX)
        .ok_or_else(|| TokenError::InvalidFormat("token must start with 'v1.'".to_string()))?;

    // <user_id>.<expires_unix>.<hmac_hex> — the UUID's own dots never
    // collide with the separators because UUIDs contain no '.'.
    let (user_id_str, after_user_id) = rest
        .split_once('.')
        .ok_or_else(|| TokenError::InvalidFormat("expected dot after user ID".to_string()))?;
    let (expires_str, hmac_hex) = after_user_id.split_once('.').ok_or_else(|| {
        TokenError::InvalidFormat("expected dot between expiry and hmac".to_string())
    })?;

    let user_id =
        Uuid::parse_str(user_id_str).map_err(|e| TokenError::InvalidUserId(e.to_string()))?;
    let expires_unix: i64 = expires_str
        .parse()
        .map_err(|e: std::num::ParseIntError| TokenError::InvalidExpiry(e.to_string()))?;

    let provided_mac = hex::decode(hmac_hex)
        .map_err(|e| TokenError::InvalidFormat(format!("invalid hex in hmac: {e}")))?;

    let message = format!("{user_id}:{expires_unix}");
    verify_hmac_constant_time(&config.secret, message.as_bytes(), &provided_mac)?;

    let expires_at = Utc
        .timestamp_opt(expires_unix, 0)
        .single()
        .ok_or_else(|| TokenError::InvalidExpiry(format!("{expires_unix} out of range")))?;
    if expires_at <= Utc::now() {
        return Err(TokenError::Expired);
    }

    Ok(SessionClaims {
        user_id,
        expires_at,
    })
}

/// Compute HMAC-SHA256 over the given message with the given key.
fn compute_hmac(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Verify HMAC using constant-time comparison.
///
/// The `hmac` crate's `verify_slice` is constant-time.
fn verify_hmac_constant_time(
    key: &[u8],
    message: &[u8],
    expected_mac: &[u8],
) -> Result<(), TokenError> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.verify_slice(expected_mac)
        .map_err(|_| TokenError::HmacMismatch)
}
