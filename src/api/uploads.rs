//! Direct uploads for images embedded in article text.

use axum::{extract::State, Json};
use serde::Serialize;

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::images::UploadPayload;
use crate::AppState;

const ARTICLE_IMAGE_PREFIX: &str = "article_images";

#[derive(Debug, Serialize)]
pub struct UploadedImage {
    pub url: String,
}

/// POST /api/uploads/article-image - Upload an image and return its URL.
///
/// There is no inline fallback here: a storage failure is reported to the caller.
pub async fn upload_article_image(
    State(state): State<AppState>,
    Json(payload): Json<UploadPayload>,
) -> ApiResult<UploadedImage> {
    let file = payload.decode().map_err(AppError::Validation)?;
    let reference = state
        .images
        .upload_direct(file, ARTICLE_IMAGE_PREFIX)
        .await?;

    success(UploadedImage {
        url: reference.into_string(),
    })
}
