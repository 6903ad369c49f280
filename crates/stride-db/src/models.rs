use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Category of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Health,
    Wellness,
    Work,
    Financial,
    Family,
    Pets,
    Other,
}

impl Default for Category {
    fn default() -> Self {
        Self::Other
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Health => "health",
            Self::Wellness => "wellness",
            Self::Work => "work",
            Self::Financial => "financial",
            Self::Family => "family",
            Self::Pets => "pets",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "health" => Ok(Self::Health),
            "wellness" => Ok(Self::Wellness),
            "work" => Ok(Self::Work),
            "financial" => Ok(Self::Financial),
            "family" => Ok(Self::Family),
            "pets" => Ok(Self::Pets),
            "other" => Ok(Self::Other),
            other => Err(CategoryParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Category`] string.
#[derive(Debug, Clone)]
pub struct CategoryParseError(pub String);

impl fmt::Display for CategoryParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid category: {:?}", self.0)
    }
}

impl std::error::Error for CategoryParseError {}

// ---------------------------------------------------------------------------

/// Lifecycle status of a goal.
///
/// The transition operation is an unconditional overwrite; there is no
/// terminal-state lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl Default for GoalStatus {
    fn default() -> Self {
        Self::InProgress
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

impl FromStr for GoalStatus {
    type Err = GoalStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(GoalStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`GoalStatus`] string.
#[derive(Debug, Clone)]
pub struct GoalStatusParseError(pub String);

impl fmt::Display for GoalStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid goal status: {:?}", self.0)
    }
}

impl std::error::Error for GoalStatusParseError {}

// ---------------------------------------------------------------------------

/// Recurrence frequency of a habit. Only daily habits materialize todos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        };
        f.write_str(s)
    }
}

impl FromStr for Frequency {
    type Err = FrequencyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            other => Err(FrequencyParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Frequency`] string.
#[derive(Debug, Clone)]
pub struct FrequencyParseError(pub String);

impl fmt::Display for FrequencyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid frequency: {:?}", self.0)
    }
}

impl std::error::Error for FrequencyParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A registered user -- the identity anchor for all owned records.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A user-authored objective, decomposed into habits.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub category: Category,
    pub status: GoalStatus,
    pub target_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// A recurring action derived from a goal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Habit {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub description: String,
    pub frequency: Frequency,
    pub created_at: DateTime<Utc>,
}

/// One dated, completable instance of a daily habit.
///
/// `habit_id` is `None` once the originating habit has been replaced or
/// deleted; the row itself is kept as completion history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Todo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub habit_id: Option<Uuid>,
    pub description: String,
    pub completed: bool,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_display_roundtrip() {
        let variants = [
            Category::Health,
            Category::Wellness,
            Category::Work,
            Category::Financial,
            Category::Family,
            Category::Pets,
            Category::Other,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: Category = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn category_invalid() {
        let result = "hobbies".parse::<Category>();
        assert!(result.is_err());
    }

    #[test]
    fn category_default_is_other() {
        assert_eq!(Category::default(), Category::Other);
    }

    #[test]
    fn goal_status_display_roundtrip() {
        let variants = [
            GoalStatus::InProgress,
            GoalStatus::Completed,
            GoalStatus::Abandoned,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: GoalStatus = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn goal_status_invalid() {
        let result = "paused".parse::<GoalStatus>();
        assert!(result.is_err());
    }

    #[test]
    fn goal_status_default_is_in_progress() {
        assert_eq!(GoalStatus::default(), GoalStatus::InProgress);
    }

    #[test]
    fn frequency_display_roundtrip() {
        let variants = [Frequency::Daily, Frequency::Weekly];
        for v in &variants {
            let s = v.to_string();
            let parsed: Frequency = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn frequency_invalid() {
        let result = "monthly".parse::<Frequency>();
        assert!(result.is_err());
    }

    #[test]
    fn frequency_serde_snake_case() {
        let json = serde_json::to_string(&Frequency::Daily).unwrap();
        assert_eq!(json, "\"daily\"");
        let parsed: Frequency = serde_json::from_str("\"weekly\"").unwrap();
        assert_eq!(parsed, Frequency::Weekly);
    }

    #[test]
    fn user_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("a@example.com"));
    }
}
