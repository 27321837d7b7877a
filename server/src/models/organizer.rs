use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::nullable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Organizer {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub contact_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrganizer {
    pub name: String,
    pub description: Option<String>,
    pub contact_email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizerChanges {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub contact_email: Option<String>,
}

impl OrganizerChanges {
    pub fn apply_to(self, organizer: &mut Organizer) {
        if let Some(name) = self.name {
            organizer.name = name;
        }
        if let Some(description) = self.description {
            organizer.description = description;
        }
        if let Some(contact_email) = self.contact_email {
            organizer.contact_email = contact_email;
        }
    }
}
