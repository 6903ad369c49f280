//! Per-table query modules.

pub mod goals;
pub mod habits;
pub mod todos;
pub mod users;
