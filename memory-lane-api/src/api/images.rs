use axum::{
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

use super::extract::{Json, Path};
use crate::{
    core::{auth::AuthUser, images::ImageManager},
    models::{
        OperationStatus,
        error::{ApiError, ApiResult},
    },
};

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Image is too large".to_string())
    } else {
        ApiError::BadRequest(format!("Multipart error: {}", err))
    }
}

/// Upload an image via multipart/form-data.
///
/// The image goes in the `file` field. Its content type comes from the part
/// header, falling back to a guess from the file name.
pub async fn upload_image(
    State(images): State<Arc<ImageManager>>,
    user: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut upload: Option<(Bytes, String)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(String::from)
            .or_else(|| {
                field
                    .file_name()
                    .and_then(|name| mime_guess::from_path(name).first())
                    .map(|mime| mime.to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((data, content_type));
    }

    let (data, content_type) = upload
        .ok_or_else(|| ApiError::BadRequest("Missing file in multipart form".to_string()))?;

    debug!("User {} uploading {} bytes of {}", user.id, data.len(), content_type);
    let image = images.upload(data, &content_type).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn delete_image(
    State(images): State<Arc<ImageManager>>,
    _user: AuthUser,
    Path(path): Path<String>,
) -> ApiResult<impl IntoResponse> {
    images.delete(&path).await?;
    Ok(Json(OperationStatus::ok()))
}
