use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::double_option;

/// Who can read a lane besides its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown visibility: {0}")]
pub struct UnknownVisibility(pub String);

impl FromStr for Visibility {
    type Err = UnknownVisibility;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(UnknownVisibility(other.to_string())),
        }
    }
}

impl TryFrom<String> for Visibility {
    type Error = UnknownVisibility;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A titled timeline owned by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemoryLane {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLane {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
}

/// Partial update; `description: null` clears the description.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LaneChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
}

impl LaneChanges {
    pub fn apply(self, lane: &mut MemoryLane) {
        if let Some(title) = self.title {
            lane.title = title;
        }
        if let Some(description) = self.description {
            lane.description = description;
        }
        if let Some(visibility) = self.visibility {
            lane.visibility = visibility;
        }
    }
}

/// A lane as seen by a particular viewer.
#[derive(Debug, Clone, Serialize)]
pub struct LaneView {
    #[serde(flatten)]
    pub lane: MemoryLane,
    pub is_owner: bool,
    pub share_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaneAccess {
    pub is_owner: bool,
}
