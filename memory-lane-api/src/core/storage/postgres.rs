//! Postgres storage implementation
//!
//! Rows live in four tables created by the embedded migrations:
//!
//! ```sql
//! memory_lanes  (id, user_id, title, description, visibility, created_at, updated_at)
//! events        (id, lane_id -> memory_lanes ON DELETE CASCADE, title, date, description, image NULL, ...)
//! memories      (id, lane_id -> memory_lanes ON DELETE CASCADE, title, date, description, image NOT NULL, ...)
//! user_profiles (user_id, name, updated_at)
//! ```

use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::config::DatabaseConfig;
use crate::models::entry::{EntryChanges, EntryKind, NewEntry, TimelineEntry};
use crate::models::lane::{LaneChanges, MemoryLane, NewLane};
use crate::models::user::Profile;

use super::traits::{EntryStore, LaneStore, ProfileStore, Store};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const LANE_COLUMNS: &str = "id, user_id, title, description, visibility, created_at, updated_at";
const ENTRY_COLUMNS: &str = "id, lane_id, title, date, description, image, created_at, updated_at";

/// Postgres-backed implementation of [`Store`]
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and, if configured, bring the schema up to date
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self> {
        info!(
            "Connecting to Postgres (max {} connections)",
            config.max_connections
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
            .context("failed to connect to Postgres")?;

        if config.run_migrations {
            MIGRATOR
                .run(&pool)
                .await
                .context("failed to run database migrations")?;
            info!("Database migrations applied");
        }

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl LaneStore for PgStore {
    async fn list_lanes(&self, owner_id: &str) -> Result<Vec<MemoryLane>> {
        let sql = format!(
            "SELECT {LANE_COLUMNS} FROM memory_lanes WHERE user_id = $1 ORDER BY created_at DESC, id"
        );
        let lanes = sqlx::query_as::<_, MemoryLane>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(lanes)
    }

    async fn get_lane(&self, id: Uuid) -> Result<Option<MemoryLane>> {
        let sql = format!("SELECT {LANE_COLUMNS} FROM memory_lanes WHERE id = $1");
        let lane = sqlx::query_as::<_, MemoryLane>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lane)
    }

    async fn create_lane(&self, owner_id: &str, lane: NewLane) -> Result<MemoryLane> {
        let sql = format!(
            "INSERT INTO memory_lanes (id, user_id, title, description, visibility)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {LANE_COLUMNS}"
        );
        let lane = sqlx::query_as::<_, MemoryLane>(&sql)
            .bind(Uuid::new_v4())
            .bind(owner_id)
            .bind(lane.title)
            .bind(lane.description)
            .bind(lane.visibility.unwrap_or_default().as_str())
            .fetch_one(&self.pool)
            .await?;

        info!("Created memory lane {} for {}", lane.id, owner_id);
        Ok(lane)
    }

    async fn update_lane(&self, id: Uuid, changes: LaneChanges) -> Result<Option<MemoryLane>> {
        let sql = format!(
            "UPDATE memory_lanes SET
                title = COALESCE($2, title),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                visibility = COALESCE($5, visibility),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {LANE_COLUMNS}"
        );
        let lane = sqlx::query_as::<_, MemoryLane>(&sql)
            .bind(id)
            .bind(changes.title)
            .bind(changes.description.is_some())
            .bind(changes.description.flatten())
            .bind(changes.visibility.map(|v| v.as_str()))
            .fetch_optional(&self.pool)
            .await?;
        Ok(lane)
    }

    async fn delete_lane(&self, id: Uuid) -> Result<Option<Vec<String>>> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM memory_lanes WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let mut images = Vec::new();
        for kind in [EntryKind::Event, EntryKind::Memory] {
            let sql = format!("DELETE FROM {} WHERE lane_id = $1 RETURNING image", kind.table());
            let rows: Vec<(Option<String>,)> = sqlx::query_as(&sql)
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
            images.extend(rows.into_iter().filter_map(|(image,)| image));
        }

        sqlx::query("DELETE FROM memory_lanes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            "Deleted memory lane {} ({} image references released)",
            id,
            images.len()
        );
        Ok(Some(images))
    }
}

#[async_trait]
impl EntryStore for PgStore {
    async fn list_entries(&self, kind: EntryKind, lane_id: Uuid) -> Result<Vec<TimelineEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM {} WHERE lane_id = $1 ORDER BY date, created_at, id",
            kind.table()
        );
        let entries = sqlx::query_as::<_, TimelineEntry>(&sql)
            .bind(lane_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    async fn get_entry(&self, kind: EntryKind, id: Uuid) -> Result<Option<TimelineEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM {} WHERE id = $1",
            kind.table()
        );
        let entry = sqlx::query_as::<_, TimelineEntry>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    async fn create_entry(
        &self,
        kind: EntryKind,
        lane_id: Uuid,
        entry: NewEntry,
    ) -> Result<TimelineEntry> {
        let sql = format!(
            "INSERT INTO {} (id, lane_id, title, date, description, image)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ENTRY_COLUMNS}",
            kind.table()
        );
        let entry = sqlx::query_as::<_, TimelineEntry>(&sql)
            .bind(Uuid::new_v4())
            .bind(lane_id)
            .bind(entry.title)
            .bind(entry.date)
            .bind(entry.description)
            .bind(entry.image)
            .fetch_one(&self.pool)
            .await?;
        Ok(entry)
    }

    async fn update_entry(
        &self,
        kind: EntryKind,
        id: Uuid,
        changes: EntryChanges,
    ) -> Result<Option<TimelineEntry>> {
        let sql = format!(
            "UPDATE {} SET
                title = COALESCE($2, title),
                date = COALESCE($3, date),
                description = CASE WHEN $4 THEN $5 ELSE description END,
                image = CASE WHEN $6 THEN $7 ELSE image END,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {ENTRY_COLUMNS}",
            kind.table()
        );
        let entry = sqlx::query_as::<_, TimelineEntry>(&sql)
            .bind(id)
            .bind(changes.title)
            .bind(changes.date)
            .bind(changes.description.is_some())
            .bind(changes.description.flatten())
            .bind(changes.image.is_some())
            .bind(changes.image.flatten())
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    async fn delete_entries(&self, kind: EntryKind, ids: &[Uuid]) -> Result<Vec<String>> {
        ensure!(!ids.is_empty(), "No id or ids provided");

        let sql = format!(
            "DELETE FROM {} WHERE id = ANY($1) RETURNING image",
            kind.table()
        );
        let rows: Vec<(Option<String>,)> = sqlx::query_as(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().filter_map(|(image,)| image).collect())
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT user_id, name, updated_at FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn upsert_profile(&self, user_id: &str, name: &str) -> Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            "INSERT INTO user_profiles (user_id, name) VALUES ($1, $2)
             ON CONFLICT (user_id) DO UPDATE SET name = EXCLUDED.name, updated_at = NOW()
             RETURNING user_id, name, updated_at",
        )
        .bind(user_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(profile)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
