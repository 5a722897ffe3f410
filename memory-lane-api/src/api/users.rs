use axum::{extract::State, response::IntoResponse};
use serde::Serialize;
use std::sync::Arc;

use super::extract::Json;
use crate::{
    core::{
        auth::{AuthUser, OptionalUser},
        users::UserManager,
    },
    models::{error::ApiResult, user::UpdateUser},
};

#[derive(Debug, Serialize)]
pub struct LoggedIn {
    pub logged_in: bool,
}

pub async fn get_user(
    State(users): State<Arc<UserManager>>,
    user: AuthUser,
) -> ApiResult<impl IntoResponse> {
    let info = users.get_user(&user).await?;
    Ok(Json(info))
}

pub async fn update_user(
    State(users): State<Arc<UserManager>>,
    user: AuthUser,
    Json(request): Json<UpdateUser>,
) -> ApiResult<impl IntoResponse> {
    let response = users.update_user(&user, request).await?;
    Ok(Json(response))
}

/// Never fails: a missing or unusable token simply means logged out.
pub async fn is_logged_in(OptionalUser(user): OptionalUser) -> Json<LoggedIn> {
    Json(LoggedIn {
        logged_in: user.is_some(),
    })
}
