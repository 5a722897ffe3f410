use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::double_option;

/// The two kinds of dated records a lane holds. They share a shape and
/// differ only in whether an image is mandatory and how they sort by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Event,
    Memory,
}

impl EntryKind {
    pub fn table(&self) -> &'static str {
        match self {
            EntryKind::Event => "events",
            EntryKind::Memory => "memories",
        }
    }

    pub fn requires_image(&self) -> bool {
        matches!(self, EntryKind::Memory)
    }

    pub fn default_sort(&self) -> SortDirection {
        match self {
            EntryKind::Event => SortDirection::Asc,
            EntryKind::Memory => SortDirection::Desc,
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            EntryKind::Event => "Event",
            EntryKind::Memory => "Memory",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// A dated record on a lane (an event or a memory).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TimelineEntry {
    pub id: Uuid,
    pub lane_id: Uuid,
    pub title: String,
    pub date: DateTime<Utc>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEntry {
    pub title: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image: Option<Option<String>>,
}

impl EntryChanges {
    pub fn apply(self, entry: &mut TimelineEntry) {
        if let Some(title) = self.title {
            entry.title = title;
        }
        if let Some(date) = self.date {
            entry.date = date;
        }
        if let Some(description) = self.description {
            entry.description = description;
        }
        if let Some(image) = self.image {
            entry.image = image;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelineQuery {
    #[serde(default)]
    pub sort: Option<SortDirection>,
}
