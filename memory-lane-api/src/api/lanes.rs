use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use uuid::Uuid;

use super::extract::{Json, Path};
use crate::{
    core::{
        auth::{AuthUser, OptionalUser},
        lane_manager::LaneManager,
    },
    models::{
        OperationStatus,
        error::ApiResult,
        lane::{LaneChanges, NewLane},
    },
};

pub async fn list_lanes(
    State(lanes): State<Arc<LaneManager>>,
    user: AuthUser,
) -> ApiResult<impl IntoResponse> {
    let lanes = lanes.list_lanes(&user).await?;
    Ok(Json(lanes))
}

pub async fn create_lane(
    State(lanes): State<Arc<LaneManager>>,
    user: AuthUser,
    Json(request): Json<NewLane>,
) -> ApiResult<impl IntoResponse> {
    let lane = lanes.create_lane(&user, request).await?;
    Ok((StatusCode::CREATED, Json(lane)))
}

pub async fn get_lane(
    State(lanes): State<Arc<LaneManager>>,
    OptionalUser(viewer): OptionalUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let view = lanes.get_lane(id, viewer.as_ref()).await?;
    Ok(Json(view))
}

pub async fn check_access(
    State(lanes): State<Arc<LaneManager>>,
    OptionalUser(viewer): OptionalUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let access = lanes.check_access(id, viewer.as_ref()).await?;
    Ok(Json(access))
}

pub async fn update_lane(
    State(lanes): State<Arc<LaneManager>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(changes): Json<LaneChanges>,
) -> ApiResult<impl IntoResponse> {
    let lane = lanes.update_lane(&user, id, changes).await?;
    Ok(Json(lane))
}

pub async fn delete_lane(
    State(lanes): State<Arc<LaneManager>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    lanes.delete_lane(&user, id).await?;
    Ok(Json(OperationStatus::ok()))
}
