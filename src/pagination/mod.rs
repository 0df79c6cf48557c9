//! Paginated query controller.
//!
//! Fetches ordered, optionally filtered pages of a collection and resumes strictly after
//! the last record of the previous page. Category filters run in the store; text search
//! runs here over the ordered, unfiltered result because the store cannot match
//! normalized substrings.

mod cursor;
mod view;

pub use cursor::*;
pub use view::*;

use std::cmp::Ordering;

use serde_json::Value;

use crate::db::{Direction, Document, DocumentStore, OrderBy, Position, Query, StoreError};
use crate::search::SearchTerm;

/// Shape of a paginated list: which collection, how it is ordered and filtered.
#[derive(Debug, Clone)]
pub struct ListSpec {
    pub collection: String,
    pub page_size: u32,
    pub order: Option<OrderBy>,
    /// Field compared by [`ListFilter::Category`]
    pub category_field: Option<String>,
    /// Field matched by [`ListFilter::Search`]
    pub search_field: Option<String>,
}

/// Active filter of a list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ListFilter {
    #[default]
    All,
    Category(String),
    Search(SearchTerm),
}

impl ListFilter {
    fn fingerprint(&self) -> String {
        match self {
            ListFilter::All => "all".to_string(),
            ListFilter::Category(value) => format!("category={}", value),
            ListFilter::Search(term) => format!("search={}", term.normalized()),
        }
    }
}

/// One fetched page.
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<Document>,
    /// Position of the last returned record; `None` when the page is empty
    pub last: Option<Position>,
    /// Whether the page came back full. An exact multiple of the page size costs one
    /// extra empty fetch before this turns false.
    pub has_more: bool,
}

/// Fingerprint of a list's collection, ordering and filter, used to detect stale cursors.
pub fn list_key(spec: &ListSpec, filter: &ListFilter) -> String {
    let order = match &spec.order {
        Some(order) => format!("{}:{}", order.field, order.direction.as_str()),
        None => "id:asc".to_string(),
    };
    format!("{}|{}|{}", spec.collection, order, filter.fingerprint())
}

/// Fetch the page after `after`, or the first page when it is `None`.
pub async fn load_page(
    store: &dyn DocumentStore,
    spec: &ListSpec,
    filter: &ListFilter,
    after: Option<&Position>,
) -> Result<Page, StoreError> {
    let page_size = spec.page_size.max(1);

    let records = match filter {
        ListFilter::Search(term) => {
            let field = spec
                .search_field
                .as_deref()
                .ok_or_else(|| StoreError::InvalidField("search".to_string()))?;

            let mut query = Query::new();
            if let Some(order) = &spec.order {
                query = query.order_by(order.clone());
            }
            let candidates = store.query(&spec.collection, &query).await?;

            candidates
                .into_iter()
                .filter(|doc| term.matches(doc.get_str(field).unwrap_or_default()))
                .filter(|doc| after.map_or(true, |pos| is_after(doc, pos, spec.order.as_ref())))
                .take(page_size as usize)
                .collect::<Vec<_>>()
        }
        ListFilter::All | ListFilter::Category(_) => {
            let mut query = Query::new().limit(page_size);
            if let Some(order) = &spec.order {
                query = query.order_by(order.clone());
            }
            if let ListFilter::Category(value) = filter {
                let field = spec
                    .category_field
                    .as_deref()
                    .ok_or_else(|| StoreError::InvalidField("category".to_string()))?;
                query = query.where_eq(field, value.clone());
            }
            if let Some(pos) = after {
                query = query.start_after(pos.clone());
            }
            store.query(&spec.collection, &query).await?
        }
    };

    let has_more = records.len() == page_size as usize;
    let last = records
        .last()
        .map(|doc| position_of(doc, spec.order.as_ref()));

    Ok(Page {
        records,
        last,
        has_more,
    })
}

/// Position of `doc` under `order`.
pub fn position_of(doc: &Document, order: Option<&OrderBy>) -> Position {
    let value = order
        .and_then(|o| doc.get(&o.field).cloned())
        .unwrap_or(Value::Null);
    Position {
        value,
        id: doc.id.clone(),
    }
}

/// Whether `doc` sorts strictly after `pos` under `order` (ties broken by id).
fn is_after(doc: &Document, pos: &Position, order: Option<&OrderBy>) -> bool {
    let Some(order) = order else {
        return doc.id.as_str() > pos.id.as_str();
    };

    let value = doc.get(&order.field).unwrap_or(&Value::Null);
    let ordering = compare_values(value, &pos.value).then_with(|| doc.id.cmp(&pos.id));

    match order.direction {
        Direction::Asc => ordering == Ordering::Greater,
        Direction::Desc => ordering == Ordering::Less,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
