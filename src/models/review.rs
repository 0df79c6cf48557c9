//! Public reviews attached to a product or article.

use serde::Deserialize;

use crate::db::{FieldValue, WriteFields};

pub const REVIEWS_COLLECTION: &str = "reviews";

/// Request body for posting a review.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub context_id: String,
    pub name: String,
    pub content: String,
    pub rating: Option<i64>,
}

impl CreateReviewRequest {
    /// Validate and build the store write.
    pub fn into_write(self) -> Result<WriteFields, String> {
        let context_id = self.context_id.trim();
        let name = self.name.trim();
        let content = self.content.trim();

        if context_id.is_empty() {
            return Err("contextId is required".to_string());
        }
        if name.is_empty() {
            return Err("Name is required".to_string());
        }
        if content.is_empty() {
            return Err("Content is required".to_string());
        }
        let rating = self.rating.unwrap_or(5);
        if !(1..=5).contains(&rating) {
            return Err("Rating must be between 1 and 5".to_string());
        }

        let mut write = WriteFields::new();
        write.insert("contextId".to_string(), context_id.into());
        write.insert("name".to_string(), name.into());
        write.insert("content".to_string(), content.into());
        write.insert("rating".to_string(), serde_json::Value::from(rating).into());
        write.insert("timestamp".to_string(), FieldValue::ServerTimestamp);
        Ok(write)
    }
}
