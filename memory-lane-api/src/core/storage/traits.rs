//! Storage trait definitions
//!
//! These traits define the interface for row storage backends.
//! Implementations can be in-memory, Postgres-backed, or any other system.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::entry::{EntryChanges, EntryKind, NewEntry, TimelineEntry};
use crate::models::lane::{LaneChanges, MemoryLane, NewLane};
use crate::models::user::Profile;

/// Trait for memory lane storage backends
///
/// Implementations must be thread-safe (Send + Sync) as they will be
/// shared across multiple async tasks.
#[async_trait]
pub trait LaneStore: Send + Sync {
    /// Lanes owned by `owner_id`, newest first
    async fn list_lanes(&self, owner_id: &str) -> Result<Vec<MemoryLane>>;

    async fn get_lane(&self, id: Uuid) -> Result<Option<MemoryLane>>;

    async fn create_lane(&self, owner_id: &str, lane: NewLane) -> Result<MemoryLane>;

    /// Returns `None` when the lane does not exist
    async fn update_lane(&self, id: Uuid, changes: LaneChanges) -> Result<Option<MemoryLane>>;

    /// Delete a lane together with its events and memories in one unit.
    ///
    /// Returns the image references the removed entries held, or `None` when
    /// the lane does not exist.
    async fn delete_lane(&self, id: Uuid) -> Result<Option<Vec<String>>>;
}

/// Trait for event and memory storage backends
#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn list_entries(&self, kind: EntryKind, lane_id: Uuid) -> Result<Vec<TimelineEntry>>;

    async fn get_entry(&self, kind: EntryKind, id: Uuid) -> Result<Option<TimelineEntry>>;

    async fn create_entry(
        &self,
        kind: EntryKind,
        lane_id: Uuid,
        entry: NewEntry,
    ) -> Result<TimelineEntry>;

    async fn update_entry(
        &self,
        kind: EntryKind,
        id: Uuid,
        changes: EntryChanges,
    ) -> Result<Option<TimelineEntry>>;

    /// Delete entries by id and return the image references they held.
    /// An empty id list is an error.
    async fn delete_entries(&self, kind: EntryKind, ids: &[Uuid]) -> Result<Vec<String>>;
}

/// Trait for user profile storage backends
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>>;

    async fn upsert_profile(&self, user_id: &str, name: &str) -> Result<Profile>;
}

/// Everything the managers need from a backend.
#[async_trait]
pub trait Store: LaneStore + EntryStore + ProfileStore {
    /// Cheap round trip used by the readiness probe
    async fn ping(&self) -> Result<()>;
}
