//! Domain logic for stride: the habit planner adapter, goal/habit store
//! operations, the daily todo materializer, progress aggregation, and
//! auth primitives.

pub mod auth;
pub mod error;
pub mod ops;
pub mod planner;
pub mod progress;
pub mod todos;

pub use error::OpError;
