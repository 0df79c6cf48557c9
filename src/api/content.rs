//! Content collection endpoints: products, news and services.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{success, ApiResult};
use crate::db::{Direction, Document};
use crate::errors::AppError;
use crate::images::{ImageReference, LogProgress};
use crate::models::{format_price, ImagePolicy, RecordForm, RecordSchema};
use crate::pagination::{ListFilter, ListView, PageCursor};
use crate::search::SearchTerm;
use crate::AppState;

/// Query parameters of a listing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page_size: Option<u32>,
    pub cursor: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
    /// `asc` for oldest first
    pub order: Option<Direction>,
}

/// One page of a listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    pub records: Vec<Document>,
    /// Pass back as `cursor` to continue; absent once the list is exhausted
    pub next_cursor: Option<String>,
    pub has_more: bool,
    /// Set when the supplied cursor belonged to another list and the first page was served
    pub reset: bool,
}

fn schema_for(collection: &str) -> Result<&'static RecordSchema, AppError> {
    RecordSchema::lookup(collection)
        .ok_or_else(|| AppError::NotFound(format!("Collection {} not found", collection)))
}

/// Attach display-only fields to a record.
fn present(schema: &RecordSchema, mut doc: Document) -> Document {
    if let Some(field) = schema.price_field {
        let raw = match doc.get(field) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
            _ => String::new(),
        };
        doc.fields
            .insert("displayPrice".to_string(), Value::String(format_price(&raw)));
    }
    doc
}

fn list_filter(schema: &RecordSchema, params: &ListParams) -> Result<ListFilter, AppError> {
    if let Some(term) = params.q.as_deref().map(SearchTerm::new) {
        if !term.is_empty() {
            return Ok(ListFilter::Search(term));
        }
    }

    match params.category.as_deref().map(str::trim) {
        Some(category) if !category.is_empty() => {
            if schema.category_field.is_none() {
                return Err(AppError::Validation(format!(
                    "{} cannot be filtered by category",
                    schema.collection
                )));
            }
            Ok(ListFilter::Category(category.to_string()))
        }
        _ => Ok(ListFilter::All),
    }
}

/// GET /api/:collection - List one page of records, newest first.
pub async fn list_records(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<ListPage> {
    let schema = schema_for(&collection)?;
    let filter = list_filter(schema, &params)?;
    if let ListFilter::Search(term) = &filter {
        tracing::debug!("Searching {} for {:?}", collection, term.raw());
    }

    let spec = schema.list_spec(params.page_size, params.order);
    let mut view = ListView::with_filter(spec, filter);

    let cursor = params
        .cursor
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(PageCursor::decode)
        .transpose()?;

    let mut reset = false;
    match cursor {
        Some(cursor) if view.resume(&cursor) => {
            view.load_more(state.store.as_ref()).await?;
        }
        Some(_) => {
            tracing::debug!("Discarding stale cursor for {}", collection);
            reset = true;
            view.load_first(state.store.as_ref()).await?;
        }
        None => {
            view.load_first(state.store.as_ref()).await?;
        }
    }

    tracing::debug!(
        "Listed {} records of {} ({:?})",
        view.rendered().len(),
        collection,
        view.state()
    );

    let next_cursor = view.next_token();
    let has_more = view.has_more();
    let records = view
        .into_rendered()
        .into_iter()
        .map(|doc| present(schema, doc))
        .collect();

    success(ListPage {
        records,
        next_cursor,
        has_more,
        reset,
    })
}

/// GET /api/:collection/:id - Get a single record.
pub async fn get_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<Document> {
    let schema = schema_for(&collection)?;

    match state.store.get(schema.collection, &id).await? {
        Some(doc) => success(present(schema, doc)),
        None => Err(AppError::NotFound(format!("{}/{} not found", collection, id))),
    }
}

/// POST /api/:collection - Create a record.
pub async fn create_record(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(mut form): Json<RecordForm>,
) -> ApiResult<Document> {
    let schema = schema_for(&collection)?;
    let policy = ImagePolicy::new(state.config.require_image_on_edit);

    form.validate(schema, false).map_err(AppError::Validation)?;
    let existing = form.image.take().unwrap_or_default();
    form.check_image(&policy, false, &existing)
        .map_err(AppError::Validation)?;
    let file = form
        .image_file
        .take()
        .map(|payload| payload.decode())
        .transpose()
        .map_err(AppError::Validation)?;
    let uploading = file.is_some();

    let progress = LogProgress::new(format!("{} create", schema.collection));
    let image = state
        .images
        .resolve_image(file, existing, schema.image_prefix, &progress)
        .await?;
    if uploading && image.is_inline() {
        tracing::info!("Storing inline image for new {} record", schema.collection);
    }

    let id = state
        .store
        .add(schema.collection, form.into_write(schema, image, true))
        .await?;
    tracing::info!("Created {}/{}", schema.collection, id);

    fetch_saved(&state, schema, &id).await
}

/// PUT /api/:collection/:id - Update a record. Fields left out of the body are kept.
pub async fn update_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(mut form): Json<RecordForm>,
) -> ApiResult<Document> {
    let schema = schema_for(&collection)?;
    let policy = ImagePolicy::new(state.config.require_image_on_edit);

    form.validate(schema, true).map_err(AppError::Validation)?;

    let current = state
        .store
        .get(schema.collection, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{}/{} not found", collection, id)))?;

    let existing = form.image.take().unwrap_or_else(|| {
        ImageReference::new(current.get_str("image").unwrap_or_default())
    });
    form.check_image(&policy, true, &existing)
        .map_err(AppError::Validation)?;
    let file = form
        .image_file
        .take()
        .map(|payload| payload.decode())
        .transpose()
        .map_err(AppError::Validation)?;
    let uploading = file.is_some();

    let progress = LogProgress::new(format!("{} {}", schema.collection, id));
    let image = state
        .images
        .resolve_image(file, existing, schema.image_prefix, &progress)
        .await?;
    if uploading && image.is_inline() {
        tracing::info!("Storing inline image for {}/{}", schema.collection, id);
    }

    state
        .store
        .update(schema.collection, &id, form.into_write(schema, image, false))
        .await?;
    tracing::info!("Updated {}/{}", schema.collection, id);

    fetch_saved(&state, schema, &id).await
}

/// DELETE /api/:collection/:id - Delete a record.
pub async fn delete_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<()> {
    let schema = schema_for(&collection)?;

    state.store.delete(schema.collection, &id).await?;
    tracing::info!("Deleted {}/{}", schema.collection, id);

    success(())
}

async fn fetch_saved(state: &AppState, schema: &RecordSchema, id: &str) -> ApiResult<Document> {
    match state.store.get(schema.collection, id).await? {
        Some(doc) => success(present(schema, doc)),
        None => Err(AppError::Internal(format!(
            "{}/{} vanished after save",
            schema.collection, id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CONTACT_FOR_PRICE, NEWS, PRODUCTS};
    use serde_json::json;

    fn params(q: Option<&str>, category: Option<&str>) -> ListParams {
        ListParams {
            q: q.map(str::to_string),
            category: category.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_search_takes_precedence_over_category() {
        let filter = list_filter(&PRODUCTS, &params(Some("hoa"), Some("cay-xanh"))).unwrap();
        assert_eq!(filter, ListFilter::Search(SearchTerm::new("hoa")));

        let filter = list_filter(&PRODUCTS, &params(Some("  "), Some("cay-xanh"))).unwrap();
        assert_eq!(filter, ListFilter::Category("cay-xanh".to_string()));

        assert_eq!(
            list_filter(&PRODUCTS, &params(None, Some(""))).unwrap(),
            ListFilter::All
        );
    }

    #[test]
    fn test_category_on_uncategorized_collection_is_rejected() {
        assert!(matches!(
            list_filter(&NEWS, &params(None, Some("x"))),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_products_carry_display_price() {
        let doc = Document {
            id: "p1".to_string(),
            fields: json!({ "name": "A", "price": 150000 }).as_object().cloned().unwrap(),
        };
        let shown = present(&PRODUCTS, doc.clone());
        assert_eq!(shown.get_str("displayPrice"), Some("150.000đ"));

        let news = present(&NEWS, doc);
        assert!(news.get("displayPrice").is_none());
    }

    #[test]
    fn test_zero_price_asks_for_contact() {
        let doc = Document {
            id: "p2".to_string(),
            fields: json!({ "name": "B", "price": 0 }).as_object().cloned().unwrap(),
        };
        let shown = present(&PRODUCTS, doc);
        assert_eq!(shown.get_str("displayPrice"), Some(CONTACT_FOR_PRICE));
    }
}
