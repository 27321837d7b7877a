use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::nullable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An open-ended event (no `end_time`) is always well-formed.
pub fn schedule_is_valid(start_time: DateTime<Utc>, end_time: Option<DateTime<Utc>>) -> bool {
    end_time.map_or(true, |end| end >= start_time)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub organizer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// `description` and `end_time` can be cleared with an explicit `null`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventChanges {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable")]
    pub end_time: Option<Option<DateTime<Utc>>>,
}

impl EventChanges {
    pub fn apply_to(self, event: &mut Event) {
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(location) = self.location {
            event.location = location;
        }
        if let Some(start_time) = self.start_time {
            event.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            event.end_time = end_time;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub organizer_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_keeps_and_null_clears() {
        let keep: EventChanges = serde_json::from_str(r#"{"title": "Renamed"}"#).unwrap();
        assert_eq!(keep.end_time, None);
        assert_eq!(keep.description, None);

        let clear: EventChanges =
            serde_json::from_str(r#"{"end_time": null, "description": null}"#).unwrap();
        assert_eq!(clear.end_time, Some(None));
        assert_eq!(clear.description, Some(None));

        let set: EventChanges =
            serde_json::from_str(r#"{"end_time": "2030-01-01T12:00:00Z"}"#).unwrap();
        assert!(matches!(set.end_time, Some(Some(_))));
    }

    #[test]
    fn test_open_ended_schedule_is_valid() {
        let start = Utc::now();
        assert!(schedule_is_valid(start, None));
        assert!(schedule_is_valid(start, Some(start)));
        assert!(!schedule_is_valid(start, Some(start - chrono::Duration::seconds(1))));
    }
}
