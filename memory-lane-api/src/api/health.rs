use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::{
    core::storage::Store,
    models::error::{ApiError, ApiResult},
};

#[derive(Debug, Serialize)]
pub struct Readiness {
    pub status: &'static str,
}

pub async fn health_check() -> &'static str {
    "OK"
}

/// Ready once the row store answers.
pub async fn readiness(State(store): State<Arc<dyn Store>>) -> ApiResult<Json<Readiness>> {
    store.ping().await.map_err(|e| {
        error!("Readiness check failed: {:#}", e);
        ApiError::ServiceUnavailable("Storage is unavailable".to_string())
    })?;

    Ok(Json(Readiness { status: "ready" }))
}
