//! Events and memories share one set of handlers, parameterised by kind.

use axum::{extract::State, http::StatusCode};
use std::sync::Arc;
use uuid::Uuid;

use super::extract::{Json, Path, Query};
use crate::{
    core::{
        auth::{AuthUser, OptionalUser},
        lane_manager::LaneManager,
        timeline::Timeline,
    },
    models::{
        OperationStatus,
        entry::{EntryChanges, EntryKind, NewEntry, TimelineEntry, TimelineQuery},
        error::ApiResult,
    },
};

type Created<T> = (StatusCode, Json<T>);

async fn list(
    kind: EntryKind,
    lanes: &LaneManager,
    viewer: Option<AuthUser>,
    lane_id: Uuid,
    query: TimelineQuery,
) -> ApiResult<Json<Timeline<TimelineEntry>>> {
    let timeline = lanes
        .list_entries(kind, lane_id, viewer.as_ref(), query.sort)
        .await?;
    Ok(Json(timeline))
}

async fn create(
    kind: EntryKind,
    lanes: &LaneManager,
    user: AuthUser,
    lane_id: Uuid,
    entry: NewEntry,
) -> ApiResult<Created<TimelineEntry>> {
    let entry = lanes.create_entry(kind, &user, lane_id, entry).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update(
    kind: EntryKind,
    lanes: &LaneManager,
    user: AuthUser,
    id: Uuid,
    changes: EntryChanges,
) -> ApiResult<Json<TimelineEntry>> {
    let entry = lanes.update_entry(kind, &user, id, changes).await?;
    Ok(Json(entry))
}

async fn remove(
    kind: EntryKind,
    lanes: &LaneManager,
    user: AuthUser,
    id: Uuid,
) -> ApiResult<Json<OperationStatus>> {
    lanes.delete_entry(kind, &user, id).await?;
    Ok(Json(OperationStatus::ok()))
}

pub async fn list_events(
    State(lanes): State<Arc<LaneManager>>,
    OptionalUser(viewer): OptionalUser,
    Path(lane_id): Path<Uuid>,
    Query(query): Query<TimelineQuery>,
) -> ApiResult<Json<Timeline<TimelineEntry>>> {
    list(EntryKind::Event, &lanes, viewer, lane_id, query).await
}

pub async fn create_event(
    State(lanes): State<Arc<LaneManager>>,
    user: AuthUser,
    Path(lane_id): Path<Uuid>,
    Json(entry): Json<NewEntry>,
) -> ApiResult<Created<TimelineEntry>> {
    create(EntryKind::Event, &lanes, user, lane_id, entry).await
}

pub async fn update_event(
    State(lanes): State<Arc<LaneManager>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(changes): Json<EntryChanges>,
) -> ApiResult<Json<TimelineEntry>> {
    update(EntryKind::Event, &lanes, user, id, changes).await
}

pub async fn delete_event(
    State(lanes): State<Arc<LaneManager>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OperationStatus>> {
    remove(EntryKind::Event, &lanes, user, id).await
}

pub async fn list_memories(
    State(lanes): State<Arc<LaneManager>>,
    OptionalUser(viewer): OptionalUser,
    Path(lane_id): Path<Uuid>,
    Query(query): Query<TimelineQuery>,
) -> ApiResult<Json<Timeline<TimelineEntry>>> {
    list(EntryKind::Memory, &lanes, viewer, lane_id, query).await
}

pub async fn create_memory(
    State(lanes): State<Arc<LaneManager>>,
    user: AuthUser,
    Path(lane_id): Path<Uuid>,
    Json(entry): Json<NewEntry>,
) -> ApiResult<Created<TimelineEntry>> {
    create(EntryKind::Memory, &lanes, user, lane_id, entry).await
}

pub async fn update_memory(
    State(lanes): State<Arc<LaneManager>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(changes): Json<EntryChanges>,
) -> ApiResult<Json<TimelineEntry>> {
    update(EntryKind::Memory, &lanes, user, id, changes).await
}

pub async fn delete_memory(
    State(lanes): State<Arc<LaneManager>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OperationStatus>> {
    remove(EntryKind::Memory, &lanes, user, id).await
}
