//! Review endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::db::{self, Document, OrderBy};
use crate::errors::AppError;
use crate::models::{CreateReviewRequest, REVIEWS_COLLECTION};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewParams {
    #[serde(default)]
    pub context_id: String,
}

/// GET /api/reviews?contextId= - List reviews of a product or article, newest first.
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(params): Query<ReviewParams>,
) -> ApiResult<Vec<Document>> {
    let context_id = params.context_id.trim();
    if context_id.is_empty() {
        return Err(AppError::Validation("contextId is required".to_string()));
    }

    let query = db::Query::new()
        .where_eq("contextId", context_id)
        .order_by(OrderBy::desc("timestamp"));
    success(state.store.query(REVIEWS_COLLECTION, &query).await?)
}

/// POST /api/reviews - Post a review.
pub async fn create_review(
    State(state): State<AppState>,
    Json(request): Json<CreateReviewRequest>,
) -> ApiResult<Document> {
    let write = request.into_write().map_err(AppError::Validation)?;
    let id = state.store.add(REVIEWS_COLLECTION, write).await?;

    match state.store.get(REVIEWS_COLLECTION, &id).await? {
        Some(doc) => success(doc),
        None => Err(AppError::Internal(format!("Review {} vanished after save", id))),
    }
}
