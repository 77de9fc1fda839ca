// src/models/test.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// Represents the 'tests' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Test {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Time allowed for a single attempt.
    pub duration_minutes: i32,
    /// Window during which attempts may be started.
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A test row together with the number of questions attached to it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TestSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub test: Test,
    pub question_count: i64,
}

/// Insert payload handed to the store once the request is validated.
#[derive(Debug, Clone)]
pub struct NewTest {
    pub title: String,
    pub description: Option<String>,
    pub schedule: Schedule,
    pub tags: Vec<String>,
}

/// The time-related columns of a test, validated as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
}

impl Schedule {
    pub fn new(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration_minutes: i32,
    ) -> Result<Self, AppError> {
        if end_time <= start_time {
            return Err(AppError::BadRequest(
                "End time must be after start time".to_string(),
            ));
        }
        if duration_minutes <= 0 {
            return Err(AppError::BadRequest(
                "Duration must be a positive number of minutes".to_string(),
            ));
        }
        Ok(Self {
            start_time,
            end_time,
            duration_minutes,
        })
    }

    /// Applies a partial update.
    ///
    /// An explicit end time always wins. Otherwise a new duration moves the
    /// end time to `start + duration`; with no duration change the stored end
    /// time is kept.
    pub fn reschedule(&self, patch: &SchedulePatch) -> Result<Self, AppError> {
        let start_time = patch.start_time.unwrap_or(self.start_time);
        let duration_minutes = patch.duration_minutes.unwrap_or(self.duration_minutes);

        let end_time = match (patch.end_time, patch.duration_minutes) {
            (Some(end), _) => end,
            (None, Some(minutes)) => start_time + Duration::minutes(i64::from(minutes)),
            (None, None) => self.end_time,
        };

        Self::new(start_time, end_time, duration_minutes)
    }
}

impl Test {
    pub fn schedule(&self) -> Schedule {
        Schedule {
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
        }
    }

    /// Whether a new attempt may be started at `now`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now < self.end_time
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchedulePatch {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
}

/// Partial update handed to the store.
#[derive(Debug, Clone)]
pub struct TestChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub schedule: Schedule,
}

/// DTO for creating a test.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTestRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters."))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes."))]
    pub duration_minutes: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub tags: Vec<String>,
}

/// DTO for updating a test. Everything but the id is optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTestRequest {
    #[serde(rename = "testId", alias = "test_id")]
    pub test_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters."))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes."))]
    pub duration_minutes: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[validate(length(max = 20))]
    pub tags: Option<Vec<String>>,
}

impl UpdateTestRequest {
    pub fn schedule_patch(&self) -> SchedulePatch {
        SchedulePatch {
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn stored() -> Schedule {
        Schedule::new(at("2025-01-01T10:00:00Z"), at("2025-01-01T11:00:00Z"), 60).unwrap()
    }

    #[test]
    fn end_must_follow_start() {
        let t = at("2025-01-01T10:00:00Z");
        assert!(Schedule::new(t, t, 60).is_err());
        assert!(Schedule::new(t, t - Duration::minutes(1), 60).is_err());
    }

    #[test]
    fn duration_only_moves_end_time() {
        let patch = SchedulePatch {
            duration_minutes: Some(90),
            ..Default::default()
        };
        let updated = stored().reschedule(&patch).unwrap();
        assert_eq!(updated.start_time, at("2025-01-01T10:00:00Z"));
        assert_eq!(updated.end_time, at("2025-01-01T11:30:00Z"));
        assert_eq!(updated.duration_minutes, 90);
    }

    #[test]
    fn explicit_end_time_wins_over_duration() {
        let patch = SchedulePatch {
            duration_minutes: Some(90),
            end_time: Some(at("2025-01-02T10:00:00Z")),
            ..Default::default()
        };
        let updated = stored().reschedule(&patch).unwrap();
        assert_eq!(updated.end_time, at("2025-01-02T10:00:00Z"));
    }

    #[test]
    fn new_start_with_duration_recomputes_from_new_start() {
        let patch = SchedulePatch {
            start_time: Some(at("2025-01-01T12:00:00Z")),
            duration_minutes: Some(30),
            ..Default::default()
        };
        let updated = stored().reschedule(&patch).unwrap();
        assert_eq!(updated.end_time, at("2025-01-01T12:30:00Z"));
    }

    #[test]
    fn start_moved_past_stored_end_is_rejected() {
        let patch = SchedulePatch {
            start_time: Some(at("2025-01-01T12:00:00Z")),
            ..Default::default()
        };
        assert!(stored().reschedule(&patch).is_err());
    }

    #[test]
    fn empty_patch_keeps_schedule() {
        assert_eq!(stored().reschedule(&SchedulePatch::default()).unwrap(), stored());
    }
}
