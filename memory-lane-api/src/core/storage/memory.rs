//! In-memory storage implementation
//!
//! Stores rows in memory using thread-safe data structures.
//! Data is lost when the process exits.

use anyhow::{Result, anyhow, ensure};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::entry::{EntryChanges, EntryKind, NewEntry, TimelineEntry};
use crate::models::lane::{LaneChanges, MemoryLane, NewLane};
use crate::models::user::Profile;

use super::traits::{EntryStore, LaneStore, ProfileStore, Store};

#[derive(Default)]
struct Tables {
    lanes: HashMap<Uuid, MemoryLane>,
    events: HashMap<Uuid, TimelineEntry>,
    memories: HashMap<Uuid, TimelineEntry>,
    profiles: HashMap<String, Profile>,
}

impl Tables {
    fn entries(&self, kind: EntryKind) -> &HashMap<Uuid, TimelineEntry> {
        match kind {
            EntryKind::Event => &self.events,
            EntryKind::Memory => &self.memories,
        }
    }

    fn entries_mut(&mut self, kind: EntryKind) -> &mut HashMap<Uuid, TimelineEntry> {
        match kind {
            EntryKind::Event => &mut self.events,
            EntryKind::Memory => &mut self.memories,
        }
    }
}

/// In-memory implementation of [`Store`]
///
/// All tables sit behind a single RwLock so a lane delete and its cascade
/// happen under one write guard.
/// Suitable for development and tests.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LaneStore for InMemoryStore {
    async fn list_lanes(&self, owner_id: &str) -> Result<Vec<MemoryLane>> {
        let tables = self.tables.read();
        let mut lanes: Vec<MemoryLane> = tables
            .lanes
            .values()
            .filter(|lane| lane.user_id == owner_id)
            .cloned()
            .collect();
        lanes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(lanes)
    }

    async fn get_lane(&self, id: Uuid) -> Result<Option<MemoryLane>> {
        Ok(self.tables.read().lanes.get(&id).cloned())
    }

    async fn create_lane(&self, owner_id: &str, lane: NewLane) -> Result<MemoryLane> {
        let now = Utc::now();
        let lane = MemoryLane {
            id: Uuid::new_v4(),
            user_id: owner_id.to_string(),
            title: lane.title,
            description: lane.description,
            visibility: lane.visibility.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        self.tables.write().lanes.insert(lane.id, lane.clone());
        info!("Created memory lane {} for {}", lane.id, owner_id);

        Ok(lane)
    }

    async fn update_lane(&self, id: Uuid, changes: LaneChanges) -> Result<Option<MemoryLane>> {
        let mut tables = self.tables.write();
        let Some(lane) = tables.lanes.get_mut(&id) else {
            return Ok(None);
        };

        changes.apply(lane);
        lane.updated_at = Utc::now();
        Ok(Some(lane.clone()))
    }

    async fn delete_lane(&self, id: Uuid) -> Result<Option<Vec<String>>> {
        let mut tables = self.tables.write();
        if tables.lanes.remove(&id).is_none() {
            return Ok(None);
        }

        let mut images = Vec::new();
        for kind in [EntryKind::Event, EntryKind::Memory] {
            let entries = tables.entries_mut(kind);
            let doomed: Vec<Uuid> = entries
                .values()
                .filter(|entry| entry.lane_id == id)
                .map(|entry| entry.id)
                .collect();

            for entry_id in doomed {
                if let Some(image) = entries.remove(&entry_id).and_then(|e| e.image) {
                    images.push(image);
                }
            }
        }

        debug!(
            "Deleted memory lane {} ({} image references released)",
            id,
            images.len()
        );
        Ok(Some(images))
    }
}

#[async_trait]
impl EntryStore for InMemoryStore {
    async fn list_entries(&self, kind: EntryKind, lane_id: Uuid) -> Result<Vec<TimelineEntry>> {
        let tables = self.tables.read();
        Ok(tables
            .entries(kind)
            .values()
            .filter(|entry| entry.lane_id == lane_id)
            .cloned()
            .collect())
    }

    async fn get_entry(&self, kind: EntryKind, id: Uuid) -> Result<Option<TimelineEntry>> {
        Ok(self.tables.read().entries(kind).get(&id).cloned())
    }

    async fn create_entry(
        &self,
        kind: EntryKind,
        lane_id: Uuid,
        entry: NewEntry,
    ) -> Result<TimelineEntry> {
        let mut tables = self.tables.write();
        if !tables.lanes.contains_key(&lane_id) {
            return Err(anyhow!("Memory lane not found: {}", lane_id));
        }

        let now = Utc::now();
        let entry = TimelineEntry {
            id: Uuid::new_v4(),
            lane_id,
            title: entry.title,
            date: entry.date,
            description: entry.description,
            image: entry.image,
            created_at: now,
            updated_at: now,
        };

        tables.entries_mut(kind).insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn update_entry(
        &self,
        kind: EntryKind,
        id: Uuid,
        changes: EntryChanges,
    ) -> Result<Option<TimelineEntry>> {
        let mut tables = self.tables.write();
        let Some(entry) = tables.entries_mut(kind).get_mut(&id) else {
            return Ok(None);
        };

        changes.apply(entry);
        entry.updated_at = Utc::now();
        Ok(Some(entry.clone()))
    }

    async fn delete_entries(&self, kind: EntryKind, ids: &[Uuid]) -> Result<Vec<String>> {
        ensure!(!ids.is_empty(), "No id or ids provided");

        let mut tables = self.tables.write();
        let entries = tables.entries_mut(kind);
        Ok(ids
            .iter()
            .filter_map(|id| entries.remove(id))
            .filter_map(|entry| entry.image)
            .collect())
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        Ok(self.tables.read().profiles.get(user_id).cloned())
    }

    async fn upsert_profile(&self, user_id: &str, name: &str) -> Result<Profile> {
        let profile = Profile {
            user_id: user_id.to_string(),
            name: name.to_string(),
            updated_at: Utc::now(),
        };

        self.tables
            .write()
            .profiles
            .insert(user_id.to_string(), profile.clone());
        Ok(profile)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
