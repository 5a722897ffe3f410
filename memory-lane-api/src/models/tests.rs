#[cfg(test)]
#[allow(clippy::module_inception)]
mod tests {
    use super::super::OperationStatus;
    use super::super::entry::*;
    use super::super::lane::*;
    use super::super::user::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn sample_lane() -> MemoryLane {
        MemoryLane {
            id: Uuid::nil(),
            user_id: "alice".to_string(),
            title: "Summer".to_string(),
            description: None,
            visibility: Visibility::Public,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_visibility_wire_format() {
        assert_eq!(serde_json::to_string(&Visibility::Public).unwrap(), "\"public\"");
        assert_eq!(Visibility::default(), Visibility::Private);
        assert_eq!("private".parse::<Visibility>().unwrap(), Visibility::Private);
        assert!("secret".parse::<Visibility>().is_err());
        assert!(serde_json::from_str::<Visibility>("\"Public\"").is_err());
    }

    #[test]
    fn test_new_lane_optional_fields() {
        let lane: NewLane = serde_json::from_str(r#"{"title":"Trip"}"#).unwrap();
        assert_eq!(lane.title, "Trip");
        assert!(lane.description.is_none());
        assert!(lane.visibility.is_none());

        assert!(serde_json::from_str::<NewLane>(r#"{"description":"no title"}"#).is_err());
    }

    #[test]
    fn test_lane_changes_distinguish_null_from_absent() {
        let absent: LaneChanges = serde_json::from_str(r#"{"title":"New"}"#).unwrap();
        assert!(absent.description.is_none());

        let cleared: LaneChanges = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));

        let mut lane = sample_lane();
        lane.description = Some("old".to_string());
        cleared.apply(&mut lane);
        assert!(lane.description.is_none());
        assert_eq!(lane.title, "Summer");
    }

    #[test]
    fn test_entry_changes_apply() {
        let changes: EntryChanges =
            serde_json::from_str(r#"{"date":"2024-03-05T10:00:00Z","image":null}"#).unwrap();
        assert_eq!(changes.image, Some(None));
        assert!(changes.description.is_none());

        let mut entry = TimelineEntry {
            id: Uuid::nil(),
            lane_id: Uuid::nil(),
            title: "Flight".to_string(),
            date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            description: Some("Window seat".to_string()),
            image: Some("plane.png".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        changes.apply(&mut entry);
        assert_eq!(entry.date, Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap());
        assert!(entry.image.is_none());
        assert_eq!(entry.description.as_deref(), Some("Window seat"));
    }

    #[test]
    fn test_sort_query_parsing() {
        let query: TimelineQuery = serde_json::from_str(r#"{"sort":"desc"}"#).unwrap();
        assert_eq!(query.sort, Some(SortDirection::Desc));

        let query: TimelineQuery = serde_json::from_str("{}").unwrap();
        assert!(query.sort.is_none());

        assert!(serde_json::from_str::<TimelineQuery>(r#"{"sort":"up"}"#).is_err());
    }

    #[test]
    fn test_entry_kind_rules() {
        assert!(EntryKind::Memory.requires_image());
        assert!(!EntryKind::Event.requires_image());
        assert_eq!(EntryKind::Event.default_sort(), SortDirection::Asc);
        assert_eq!(EntryKind::Memory.default_sort(), SortDirection::Desc);
        assert_eq!(EntryKind::Memory.table(), "memories");
    }

    #[test]
    fn test_lane_view_is_flattened() {
        let view = LaneView {
            lane: sample_lane(),
            is_owner: true,
            share_url: "https://lanes.example/m/x".to_string(),
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["title"], "Summer");
        assert_eq!(json["visibility"], "public");
        assert_eq!(json["is_owner"], true);
        assert!(json.get("lane").is_none());
    }

    #[test]
    fn test_user_payloads() {
        let info = UserInfo {
            name: Some("Alice".to_string()),
            avatar: None,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"avatar\":null"));

        assert!(serde_json::from_str::<UpdateUser>("{}").is_err());
        assert_eq!(
            serde_json::to_string(&OperationStatus::ok()).unwrap(),
            r#"{"success":true}"#
        );
    }
}
