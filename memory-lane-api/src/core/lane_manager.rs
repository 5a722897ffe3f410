use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::access::{check_edit, check_view};
use crate::core::auth::AuthUser;
use crate::core::config::SiteConfig;
use crate::core::error::{ServiceError, ServiceResult};
use crate::core::images::ImageManager;
use crate::core::storage::Store;
use crate::core::timeline::{Timeline, build_timeline};
use crate::models::entry::{EntryChanges, EntryKind, NewEntry, SortDirection, TimelineEntry};
use crate::models::lane::{LaneAccess, LaneChanges, LaneView, MemoryLane, NewLane};

/// Lanes, their events and memories, and the images those entries point at.
pub struct LaneManager {
    store: Arc<dyn Store>,
    images: Arc<ImageManager>,
    site: SiteConfig,
}

impl LaneManager {
    pub fn new(store: Arc<dyn Store>, images: Arc<ImageManager>, site: SiteConfig) -> Self {
        Self {
            store,
            images,
            site,
        }
    }

    pub async fn list_lanes(&self, user: &AuthUser) -> ServiceResult<Vec<MemoryLane>> {
        self.store
            .list_lanes(&user.id)
            .await
            .map_err(ServiceError::storage("Failed to list memory lanes"))
    }

    pub async fn get_lane(&self, id: Uuid, viewer: Option<&AuthUser>) -> ServiceResult<LaneView> {
        let lane = self.load_lane(id).await?;
        let is_owner = check_view(&lane, viewer)?;
        Ok(LaneView {
            share_url: self.site.share_url(lane.id),
            lane,
            is_owner,
        })
    }

    pub async fn check_access(
        &self,
        id: Uuid,
        viewer: Option<&AuthUser>,
    ) -> ServiceResult<LaneAccess> {
        let lane = self.load_lane(id).await?;
        let is_owner = check_view(&lane, viewer)?;
        Ok(LaneAccess { is_owner })
    }

    pub async fn create_lane(&self, user: &AuthUser, mut lane: NewLane) -> ServiceResult<MemoryLane> {
        lane.title = required_title(&lane.title)?;

        let lane = self
            .store
            .create_lane(&user.id, lane)
            .await
            .map_err(ServiceError::storage("Failed to create memory lane"))?;

        info!("User {} created memory lane {}", user.id, lane.id);
        Ok(lane)
    }

    pub async fn update_lane(
        &self,
        user: &AuthUser,
        id: Uuid,
        mut changes: LaneChanges,
    ) -> ServiceResult<MemoryLane> {
        if let Some(title) = &changes.title {
            changes.title = Some(required_title(title)?);
        }

        self.owned_lane(user, id).await?;

        self.store
            .update_lane(id, changes)
            .await
            .map_err(ServiceError::storage("Failed to update memory lane"))?
            .ok_or_else(lane_not_found)
    }

    /// Deletes the lane with every event and memory on it, then the images
    /// those entries referenced.
    pub async fn delete_lane(&self, user: &AuthUser, id: Uuid) -> ServiceResult<()> {
        self.owned_lane(user, id).await?;

        let images = self
            .store
            .delete_lane(id)
            .await
            .map_err(ServiceError::storage("Failed to delete memory lane"))?
            .ok_or_else(lane_not_found)?;

        info!(
            "User {} deleted memory lane {} ({} images)",
            user.id,
            id,
            images.len()
        );
        self.images.release(&images).await
    }

    pub async fn list_entries(
        &self,
        kind: EntryKind,
        lane_id: Uuid,
        viewer: Option<&AuthUser>,
        sort: Option<SortDirection>,
    ) -> ServiceResult<Timeline<TimelineEntry>> {
        let lane = self.load_lane(lane_id).await?;
        check_view(&lane, viewer)?;

        let entries = self
            .store
            .list_entries(kind, lane_id)
            .await
            .map_err(ServiceError::storage(format!(
                "Failed to list {}",
                kind.table()
            )))?;

        Ok(build_timeline(
            entries,
            sort.unwrap_or_else(|| kind.default_sort()),
        ))
    }

    pub async fn create_entry(
        &self,
        kind: EntryKind,
        user: &AuthUser,
        lane_id: Uuid,
        mut entry: NewEntry,
    ) -> ServiceResult<TimelineEntry> {
        entry.title = required_title(&entry.title)?;
        entry.image = entry.image.and_then(normalize_image);
        if kind.requires_image() && entry.image.is_none() {
            return Err(image_required());
        }

        self.owned_lane(user, lane_id).await?;

        let entry = self
            .store
            .create_entry(kind, lane_id, entry)
            .await
            .map_err(ServiceError::storage(format!(
                "Failed to create {}",
                kind.noun().to_lowercase()
            )))?;

        info!("Added {} {} to lane {}", kind.noun().to_lowercase(), entry.id, lane_id);
        Ok(entry)
    }

    pub async fn update_entry(
        &self,
        kind: EntryKind,
        user: &AuthUser,
        id: Uuid,
        mut changes: EntryChanges,
    ) -> ServiceResult<TimelineEntry> {
        if let Some(title) = &changes.title {
            changes.title = Some(required_title(title)?);
        }
        if let Some(image) = changes.image.take() {
            let image = image.and_then(normalize_image);
            if kind.requires_image() && image.is_none() {
                return Err(image_required());
            }
            changes.image = Some(image);
        }

        let current = self.owned_entry(kind, user, id).await?;

        let updated = self
            .store
            .update_entry(kind, id, changes)
            .await
            .map_err(ServiceError::storage(format!(
                "Failed to update {}",
                kind.noun().to_lowercase()
            )))?
            .ok_or_else(|| entry_not_found(kind))?;

        // A replaced or cleared image is no longer referenced. The same object
        // may come back as a URL or a bare key, so compare resolved keys.
        if let Some(previous) = current.image {
            let still_used = updated
                .image
                .as_deref()
                .is_some_and(|image| self.images.same_object(image, &previous));
            if !still_used {
                if let Err(e) = self.images.release(&[previous]).await {
                    warn!("Could not remove replaced image of {}: {}", id, e);
                }
            }
        }

        Ok(updated)
    }

    pub async fn delete_entry(&self, kind: EntryKind, user: &AuthUser, id: Uuid) -> ServiceResult<()> {
        self.owned_entry(kind, user, id).await?;

        let images = self
            .store
            .delete_entries(kind, &[id])
            .await
            .map_err(ServiceError::storage(format!(
                "Failed to delete {}",
                kind.noun().to_lowercase()
            )))?;

        self.images.release(&images).await
    }

    async fn load_lane(&self, id: Uuid) -> ServiceResult<MemoryLane> {
        self.store
            .get_lane(id)
            .await
            .map_err(ServiceError::storage("Failed to load memory lane"))?
            .ok_or_else(lane_not_found)
    }

    async fn owned_lane(&self, user: &AuthUser, id: Uuid) -> ServiceResult<MemoryLane> {
        let lane = self.load_lane(id).await?;
        check_edit(&lane, user)?;
        Ok(lane)
    }

    /// Loads an entry and checks the caller owns the lane it sits on.
    async fn owned_entry(
        &self,
        kind: EntryKind,
        user: &AuthUser,
        id: Uuid,
    ) -> ServiceResult<TimelineEntry> {
        let entry = self
            .store
            .get_entry(kind, id)
            .await
            .map_err(ServiceError::storage(format!(
                "Failed to load {}",
                kind.noun().to_lowercase()
            )))?
            .ok_or_else(|| entry_not_found(kind))?;

        self.owned_lane(user, entry.lane_id).await?;
        Ok(entry)
    }
}

fn required_title(title: &str) -> ServiceResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ServiceError::Validation("Title is required".to_string()));
    }
    Ok(title.to_string())
}

/// Blank references count as no image.
fn normalize_image(image: String) -> Option<String> {
    let image = image.trim();
    (!image.is_empty()).then(|| image.to_string())
}

fn image_required() -> ServiceError {
    ServiceError::Validation("Image is required".to_string())
}

fn lane_not_found() -> ServiceError {
    ServiceError::NotFound("Memory lane not found".to_string())
}

fn entry_not_found(kind: EntryKind) -> ServiceError {
    ServiceError::NotFound(format!("{} not found", kind.noun()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::UserMetadata;
    use crate::core::images::{FailingImageStore, InMemoryImageStore};
    use crate::core::storage::InMemoryStore;
    use crate::models::lane::Visibility;
    use bytes::Bytes;
    use chrono::{DateTime, TimeZone, Utc};

    const BASE: &str = "https://cdn.example/lanes";

    struct Fixture {
        manager: LaneManager,
        images: Arc<ImageManager>,
        objects: Arc<InMemoryImageStore>,
    }

    fn fixture() -> Fixture {
        let objects = Arc::new(InMemoryImageStore::new(BASE));
        let images = Arc::new(ImageManager::new(objects.clone(), 1024));
        let manager = LaneManager::new(
            Arc::new(InMemoryStore::new()),
            images.clone(),
            SiteConfig {
                url: "https://lanes.example".to_string(),
            },
        );
        Fixture {
            manager,
            images,
            objects,
        }
    }

    fn user(id: &str) -> AuthUser {
        AuthUser {
            id: id.to_string(),
            email: None,
            metadata: UserMetadata::default(),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn new_lane(title: &str, visibility: Option<Visibility>) -> NewLane {
        NewLane {
            title: title.to_string(),
            description: None,
            visibility,
        }
    }

    fn new_entry(title: &str, date: DateTime<Utc>, image: Option<&str>) -> NewEntry {
        NewEntry {
            title: title.to_string(),
            date,
            description: None,
            image: image.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_create_lane_defaults_to_private() {
        let f = fixture();
        let alice = user("alice");

        let lane = f
            .manager
            .create_lane(&alice, new_lane("  Summer 2024  ", None))
            .await
            .unwrap();
        assert_eq!(lane.title, "Summer 2024");
        assert_eq!(lane.visibility, Visibility::Private);
        assert_eq!(lane.user_id, "alice");

        let lanes = f.manager.list_lanes(&alice).await.unwrap();
        assert_eq!(lanes.len(), 1);
        assert!(f.manager.list_lanes(&user("bob")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_lane_requires_title() {
        let f = fixture();
        let err = f
            .manager
            .create_lane(&user("alice"), new_lane("   ", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(msg) if msg == "Title is required"));
    }

    #[tokio::test]
    async fn test_get_lane_view() {
        let f = fixture();
        let alice = user("alice");
        let lane = f
            .manager
            .create_lane(&alice, new_lane("Trip", Some(Visibility::Public)))
            .await
            .unwrap();

        let view = f.manager.get_lane(lane.id, Some(&alice)).await.unwrap();
        assert!(view.is_owner);
        assert_eq!(view.share_url, format!("https://lanes.example/m/{}", lane.id));

        let anonymous = f.manager.get_lane(lane.id, None).await.unwrap();
        assert!(!anonymous.is_owner);

        let err = f.manager.get_lane(Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_private_lane_access() {
        let f = fixture();
        let alice = user("alice");
        let lane = f
            .manager
            .create_lane(&alice, new_lane("Diary", None))
            .await
            .unwrap();

        let access = f.manager.check_access(lane.id, Some(&alice)).await.unwrap();
        assert!(access.is_owner);

        let err = f
            .manager
            .check_access(lane.id, Some(&user("bob")))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = f
            .manager
            .list_entries(EntryKind::Event, lane.id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_only_owner_mutates_lane() {
        let f = fixture();
        let alice = user("alice");
        let bob = user("bob");
        let lane = f
            .manager
            .create_lane(&alice, new_lane("Trip", Some(Visibility::Public)))
            .await
            .unwrap();

        let err = f
            .manager
            .update_lane(
                &bob,
                lane.id,
                LaneChanges {
                    title: Some("Hijacked".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = f.manager.delete_lane(&bob, lane.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let updated = f
            .manager
            .update_lane(
                &alice,
                lane.id,
                LaneChanges {
                    description: Some(Some("Road trip".to_string())),
                    visibility: Some(Visibility::Private),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Trip");
        assert_eq!(updated.description.as_deref(), Some("Road trip"));
        assert_eq!(updated.visibility, Visibility::Private);
    }

    #[tokio::test]
    async fn test_memory_requires_image() {
        let f = fixture();
        let alice = user("alice");
        let lane = f
            .manager
            .create_lane(&alice, new_lane("Trip", None))
            .await
            .unwrap();

        let err = f
            .manager
            .create_entry(
                EntryKind::Memory,
                &alice,
                lane.id,
                new_entry("Beach", day(2024, 7, 1), Some("  ")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(msg) if msg == "Image is required"));

        // Events may go without one.
        let event = f
            .manager
            .create_entry(
                EntryKind::Event,
                &alice,
                lane.id,
                new_entry("Flight", day(2024, 7, 1), None),
            )
            .await
            .unwrap();
        assert!(event.image.is_none());

        let memory = f
            .manager
            .create_entry(
                EntryKind::Memory,
                &alice,
                lane.id,
                new_entry("Beach", day(2024, 7, 2), Some("beach.png")),
            )
            .await
            .unwrap();

        let err = f
            .manager
            .update_entry(
                EntryKind::Memory,
                &alice,
                memory.id,
                EntryChanges {
                    image: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_entries_need_lane_owner() {
        let f = fixture();
        let alice = user("alice");
        let bob = user("bob");
        let lane = f
            .manager
            .create_lane(&alice, new_lane("Trip", Some(Visibility::Public)))
            .await
            .unwrap();

        let err = f
            .manager
            .create_entry(
                EntryKind::Event,
                &bob,
                lane.id,
                new_entry("Crash", day(2024, 1, 1), None),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let event = f
            .manager
            .create_entry(
                EntryKind::Event,
                &alice,
                lane.id,
                new_entry("Flight", day(2024, 1, 1), None),
            )
            .await
            .unwrap();

        let err = f
            .manager
            .delete_entry(EntryKind::Event, &bob, event.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = f
            .manager
            .delete_entry(EntryKind::Memory, &alice, event.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(msg) if msg == "Memory not found"));
    }

    #[tokio::test]
    async fn test_timeline_default_sort_per_kind() {
        let f = fixture();
        let alice = user("alice");
        let lane = f
            .manager
            .create_lane(&alice, new_lane("Year", Some(Visibility::Public)))
            .await
            .unwrap();

        for (title, date) in [
            ("March", day(2024, 3, 10)),
            ("January", day(2024, 1, 5)),
            ("January later", day(2024, 1, 20)),
        ] {
            f.manager
                .create_entry(EntryKind::Event, &alice, lane.id, new_entry(title, date, None))
                .await
                .unwrap();
            f.manager
                .create_entry(
                    EntryKind::Memory,
                    &alice,
                    lane.id,
                    new_entry(title, date, Some("img.png")),
                )
                .await
                .unwrap();
        }

        let events = f
            .manager
            .list_entries(EntryKind::Event, lane.id, None, None)
            .await
            .unwrap();
        let titles: Vec<_> = events.entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["January", "January later", "March"]);
        assert_eq!(events.grouped.len(), 2);
        assert_eq!(events.grouped[0].date, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(events.grouped[0].entries.len(), 2);

        let memories = f
            .manager
            .list_entries(EntryKind::Memory, lane.id, None, None)
            .await
            .unwrap();
        let titles: Vec<_> = memories.entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["March", "January later", "January"]);
        assert_eq!(memories.grouped[0].date, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());

        let explicit = f
            .manager
            .list_entries(EntryKind::Memory, lane.id, None, Some(SortDirection::Asc))
            .await
            .unwrap();
        assert_eq!(explicit.entries[0].title, "January");
    }

    #[tokio::test]
    async fn test_delete_lane_releases_images() {
        let f = fixture();
        let alice = user("alice");
        let lane = f
            .manager
            .create_lane(&alice, new_lane("Trip", None))
            .await
            .unwrap();

        let photo = f
            .images
            .upload(Bytes::from_static(b"\x89PNG"), "image/png")
            .await
            .unwrap();
        let poster = f
            .images
            .upload(Bytes::from_static(b"\xff\xd8"), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(f.objects.len(), 2);

        f.manager
            .create_entry(
                EntryKind::Memory,
                &alice,
                lane.id,
                new_entry("Beach", day(2024, 7, 1), Some(&photo.url)),
            )
            .await
            .unwrap();
        f.manager
            .create_entry(
                EntryKind::Event,
                &alice,
                lane.id,
                new_entry("Concert", day(2024, 7, 2), Some(&poster.path)),
            )
            .await
            .unwrap();

        f.manager.delete_lane(&alice, lane.id).await.unwrap();
        assert_eq!(f.objects.len(), 0);

        let err = f.manager.get_lane(lane.id, Some(&alice)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_replacing_image_releases_old_one() {
        let f = fixture();
        let alice = user("alice");
        let lane = f
            .manager
            .create_lane(&alice, new_lane("Trip", None))
            .await
            .unwrap();

        let first = f
            .images
            .upload(Bytes::from_static(b"one"), "image/png")
            .await
            .unwrap();
        let second = f
            .images
            .upload(Bytes::from_static(b"two"), "image/png")
            .await
            .unwrap();

        let memory = f
            .manager
            .create_entry(
                EntryKind::Memory,
                &alice,
                lane.id,
                new_entry("Beach", day(2024, 7, 1), Some(&first.url)),
            )
            .await
            .unwrap();

        let updated = f
            .manager
            .update_entry(
                EntryKind::Memory,
                &alice,
                memory.id,
                EntryChanges {
                    image: Some(Some(second.url.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.image.as_deref(), Some(second.url.as_str()));
        assert!(f.objects.get(&first.path).is_none());
        assert!(f.objects.get(&second.path).is_some());

        f.manager
            .delete_entry(EntryKind::Memory, &alice, memory.id)
            .await
            .unwrap();
        assert_eq!(f.objects.len(), 0);
    }

    fn failing_manager() -> LaneManager {
        let images = Arc::new(ImageManager::new(
            Arc::new(FailingImageStore::new(BASE)),
            1024,
        ));
        LaneManager::new(
            Arc::new(InMemoryStore::new()),
            images,
            SiteConfig {
                url: "https://lanes.example".to_string(),
            },
        )
    }

    fn assert_image_cleanup_failed(err: ServiceError) {
        match err {
            ServiceError::Storage { message, source } => {
                assert_eq!(message, "Failed to delete images");
                assert_eq!(source.to_string(), FailingImageStore::CAUSE);
            },
            other => panic!("expected a storage error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_lane_keeps_rows_deleted_when_images_fail() {
        let manager = failing_manager();
        let alice = user("alice");
        let lane = manager
            .create_lane(&alice, new_lane("Trip", None))
            .await
            .unwrap();
        manager
            .create_entry(
                EntryKind::Memory,
                &alice,
                lane.id,
                new_entry("Beach", day(2024, 7, 1), Some("beach.png")),
            )
            .await
            .unwrap();

        let err = manager.delete_lane(&alice, lane.id).await.unwrap_err();
        assert_image_cleanup_failed(err);

        let err = manager.get_lane(lane.id, Some(&alice)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(manager.list_lanes(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_entry_keeps_row_deleted_when_images_fail() {
        let manager = failing_manager();
        let alice = user("alice");
        let lane = manager
            .create_lane(&alice, new_lane("Trip", None))
            .await
            .unwrap();
        let memory = manager
            .create_entry(
                EntryKind::Memory,
                &alice,
                lane.id,
                new_entry("Beach", day(2024, 7, 1), Some("beach.png")),
            )
            .await
            .unwrap();

        let err = manager
            .delete_entry(EntryKind::Memory, &alice, memory.id)
            .await
            .unwrap_err();
        assert_image_cleanup_failed(err);

        let timeline = manager
            .list_entries(EntryKind::Memory, lane.id, Some(&alice), None)
            .await
            .unwrap();
        assert!(timeline.entries.is_empty());
    }

    #[tokio::test]
    async fn test_same_image_in_another_form_is_kept() {
        let f = fixture();
        let alice = user("alice");
        let lane = f
            .manager
            .create_lane(&alice, new_lane("Trip", None))
            .await
            .unwrap();
        let image = f
            .images
            .upload(Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        let memory = f
            .manager
            .create_entry(
                EntryKind::Memory,
                &alice,
                lane.id,
                new_entry("Beach", day(2024, 7, 1), Some(&image.url)),
            )
            .await
            .unwrap();

        let updated = f
            .manager
            .update_entry(
                EntryKind::Memory,
                &alice,
                memory.id,
                EntryChanges {
                    image: Some(Some(format!(" {} ", image.path))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.image.as_deref(), Some(image.path.as_str()));
        assert!(f.objects.get(&image.path).is_some());
    }

    #[tokio::test]
    async fn test_image_references_are_trimmed() {
        let f = fixture();
        let alice = user("alice");
        let lane = f
            .manager
            .create_lane(&alice, new_lane("Trip", None))
            .await
            .unwrap();

        let event = f
            .manager
            .create_entry(
                EntryKind::Event,
                &alice,
                lane.id,
                new_entry("Concert", day(2024, 7, 2), Some("  poster.jpg\n")),
            )
            .await
            .unwrap();
        assert_eq!(event.image.as_deref(), Some("poster.jpg"));
    }
}
