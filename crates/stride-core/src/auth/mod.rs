//! Account credentials and session tokens.
//!
//! Passwords are stored as Argon2id hashes; sessions are stateless
//! HMAC-SHA256 bearer tokens carrying the user id and an expiry.

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password, PasswordError};
pub use token::{
    generate_session_token, validate_session_token, SessionClaims, TokenConfig, TokenError,
};
