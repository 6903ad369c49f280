//! PostgreSQL layer for stride: pool management, embedded migrations,
//! row models, and per-table query modules.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
