use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{delete, get, patch, post},
};
use std::sync::Arc;

use crate::core::{
    auth::AuthManager, images::ImageManager, lane_manager::LaneManager, storage::Store,
    users::UserManager,
};

pub mod entries;
pub mod extract;
pub mod health;
pub mod images;
pub mod lanes;
pub mod users;


/// Multipart framing on top of the raw image bytes.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub lanes: Arc<LaneManager>,
    pub users: Arc<UserManager>,
    pub images: Arc<ImageManager>,
    pub auth: Arc<AuthManager>,
    pub store: Arc<dyn Store>,
}

pub fn router(state: AppState) -> Router {
    let lane_routes = Router::new()
        .route("/v1/lanes", get(lanes::list_lanes).post(lanes::create_lane))
        .route(
            "/v1/lanes/:id",
            get(lanes::get_lane)
                .patch(lanes::update_lane)
                .delete(lanes::delete_lane),
        )
        .route("/v1/lanes/:id/access", get(lanes::check_access));

    let entry_routes = Router::new()
        .route(
            "/v1/lanes/:id/events",
            get(entries::list_events).post(entries::create_event),
        )
        .route(
            "/v1/events/:id",
            patch(entries::update_event).delete(entries::delete_event),
        )
        .route(
            "/v1/lanes/:id/memories",
            get(entries::list_memories).post(entries::create_memory),
        )
        .route(
            "/v1/memories/:id",
            patch(entries::update_memory).delete(entries::delete_memory),
        );

    let image_routes = Router::new()
        .route(
            "/v1/images",
            post(images::upload_image).layer(DefaultBodyLimit::max(
                state.images.max_upload_bytes() + MULTIPART_OVERHEAD,
            )),
        )
        .route("/v1/images/*path", delete(images::delete_image));

    let user_routes = Router::new()
        .route("/v1/users/me", get(users::get_user).patch(users::update_user))
        .route("/v1/users/logged-in", get(users::is_logged_in));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness))
        .merge(lane_routes)
        .merge(entry_routes)
        .merge(image_routes)
        .merge(user_routes)
        .with_state(state)
}
