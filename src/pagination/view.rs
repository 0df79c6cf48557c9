//! Per-list view state.

use crate::db::{Document, DocumentStore, Position, StoreError};

use super::{list_key, load_page, ListFilter, ListSpec, PageCursor};

/// Which kind of fetch is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Initial,
    Continuation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    Loading(LoadKind),
    Populated,
    Empty,
    Error(String),
}

/// A rendered, incrementally loaded list.
///
/// Holds its own cursor: continuations append to what is already rendered, and any
/// change of filter discards both the rendered records and the cursor.
#[derive(Debug)]
pub struct ListView {
    spec: ListSpec,
    filter: ListFilter,
    key: String,
    rendered: Vec<Document>,
    last: Option<Position>,
    has_more: bool,
    state: ViewState,
}

impl ListView {
    pub fn new(spec: ListSpec) -> Self {
        Self::with_filter(spec, ListFilter::All)
    }

    pub fn with_filter(spec: ListSpec, filter: ListFilter) -> Self {
        let key = list_key(&spec, &filter);
        Self {
            spec,
            filter,
            key,
            rendered: Vec::new(),
            last: None,
            has_more: false,
            state: ViewState::Idle,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn rendered(&self) -> &[Document] {
        &self.rendered
    }

    pub fn into_rendered(self) -> Vec<Document> {
        self.rendered
    }

    /// Whether the "load more" trigger is shown.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Cursor at the last rendered record.
    pub fn cursor(&self) -> Option<PageCursor> {
        self.last
            .as_ref()
            .map(|pos| PageCursor::new(self.key.clone(), pos.clone()))
    }

    /// Token for the next continuation, present only while more records may follow.
    pub fn next_token(&self) -> Option<String> {
        if !self.has_more {
            return None;
        }
        self.cursor().map(|c| c.encode())
    }

    /// Replace the filter, dropping the rendered records and the cursor.
    pub fn set_filter(&mut self, filter: ListFilter) {
        self.key = list_key(&self.spec, &filter);
        self.filter = filter;
        self.clear();
        self.state = ViewState::Idle;
    }

    /// Continue from a cursor issued earlier for this same list.
    ///
    /// The records before the cursor are already shown by whoever holds it, so the view
    /// starts with an empty rendered list and a visible trigger. Returns `false` and
    /// leaves the view untouched when the cursor belongs to another list.
    pub fn resume(&mut self, cursor: &PageCursor) -> bool {
        if cursor.key() != self.key {
            return false;
        }
        self.rendered.clear();
        self.last = Some(cursor.position());
        self.has_more = true;
        self.state = ViewState::Populated;
        true
    }

    /// Discard everything rendered and load the first page.
    pub async fn load_first(
        &mut self,
        store: &dyn DocumentStore,
    ) -> Result<&[Document], StoreError> {
        self.clear();
        self.state = ViewState::Loading(LoadKind::Initial);

        let result = load_page(store, &self.spec, &self.filter, None).await;
        match result {
            Ok(page) => {
                self.state = if page.records.is_empty() {
                    ViewState::Empty
                } else {
                    ViewState::Populated
                };
                self.has_more = page.has_more;
                self.last = page.last;
                self.rendered = page.records;
                Ok(self.rendered.as_slice())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Append the next page. Does nothing unless the trigger is shown.
    ///
    /// Returns the newly appended records. An empty continuation hides the trigger and
    /// keeps the cursor where it was.
    pub async fn load_more(
        &mut self,
        store: &dyn DocumentStore,
    ) -> Result<&[Document], StoreError> {
        if !self.has_more || self.state != ViewState::Populated {
            return Ok(&[][..]);
        }
        self.state = ViewState::Loading(LoadKind::Continuation);

        let result = load_page(store, &self.spec, &self.filter, self.last.as_ref()).await;
        match result {
            Ok(page) => {
                self.state = ViewState::Populated;
                self.has_more = page.has_more;
                if page.last.is_some() {
                    self.last = page.last;
                }
                let start = self.rendered.len();
                self.rendered.extend(page.records);
                Ok(&self.rendered[start..])
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn clear(&mut self) {
        self.rendered.clear();
        self.last = None;
        self.has_more = false;
    }

    fn fail(&mut self, error: StoreError) -> StoreError {
        tracing::error!("Failed to load {}: {}", self.spec.collection, error);
        self.clear();
        self.state = ViewState::Error(error.to_string());
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Query, SqliteDocumentStore, WriteFields};
    use crate::pagination::tests::{products_spec, seed_products, test_store};
    use crate::search::SearchTerm;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Delegates to SQLite until `failing` is set.
    struct FlakyStore {
        inner: SqliteDocumentStore,
        failing: AtomicBool,
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn query(
            &self,
            collection: &str,
            query: &Query,
        ) -> Result<Vec<Document>, StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::UnsupportedValue("offline".to_string()));
            }
            self.inner.query(collection, query).await
        }

        async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
            self.inner.get(collection, id).await
        }

        async fn add(&self, collection: &str, fields: WriteFields) -> Result<String, StoreError> {
            self.inner.add(collection, fields).await
        }

        async fn update(
            &self,
            collection: &str,
            id: &str,
            fields: WriteFields,
        ) -> Result<(), StoreError> {
            self.inner.update(collection, id, fields).await
        }

        async fn set_merge(
            &self,
            collection: &str,
            id: &str,
            fields: WriteFields,
        ) -> Result<(), StoreError> {
            self.inner.set_merge(collection, id, fields).await
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
            self.inner.delete(collection, id).await
        }
    }

    fn ids(docs: &[Document]) -> Vec<String> {
        docs.iter().map(|d| d.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_load_first_twice_resets_instead_of_duplicating() {
        let (store, _dir) = test_store().await;
        seed_products(&store, 5, |i| format!("P{}", i), |_| "x").await;

        let mut view = ListView::new(products_spec(3));
        let first = ids(view.load_first(&store).await.unwrap());
        let again = ids(view.load_first(&store).await.unwrap());

        assert_eq!(first, again);
        assert_eq!(view.rendered().len(), 3);
        assert_eq!(view.state(), &ViewState::Populated);
    }

    #[tokio::test]
    async fn test_continuations_append_without_duplicates() {
        let (store, _dir) = test_store().await;
        seed_products(&store, 8, |i| format!("P{}", i), |_| "x").await;

        let mut view = ListView::new(products_spec(3));
        view.load_first(&store).await.unwrap();
        while view.has_more() {
            view.load_more(&store).await.unwrap();
        }

        let rendered = view.rendered();
        assert_eq!(rendered.len(), 8);
        let unique: HashSet<_> = rendered.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(unique.len(), 8);

        let stamps: Vec<_> = rendered
            .iter()
            .map(|d| d.get_str("createdAt").unwrap())
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] > w[1]));
    }

    #[tokio::test]
    async fn test_exact_multiple_costs_one_empty_continuation() {
        let (store, _dir) = test_store().await;
        seed_products(&store, 20, |i| format!("P{}", i), |_| "x").await;

        let mut view = ListView::new(products_spec(20));
        assert_eq!(view.load_first(&store).await.unwrap().len(), 20);
        assert!(view.has_more());
        let token_before = view.next_token().unwrap();

        let appended = view.load_more(&store).await.unwrap();
        assert!(appended.is_empty());
        assert!(!view.has_more());
        assert_eq!(view.rendered().len(), 20);
        assert_eq!(view.cursor().unwrap().encode(), token_before);
        assert!(view.next_token().is_none());
    }

    #[tokio::test]
    async fn test_load_more_without_trigger_is_a_no_op() {
        let (store, _dir) = test_store().await;
        seed_products(&store, 2, |i| format!("P{}", i), |_| "x").await;

        let mut view = ListView::new(products_spec(20));
        assert!(view.load_more(&store).await.unwrap().is_empty());
        assert_eq!(view.state(), &ViewState::Idle);

        view.load_first(&store).await.unwrap();
        assert!(!view.has_more());
        assert!(view.load_more(&store).await.unwrap().is_empty());
        assert_eq!(view.rendered().len(), 2);
    }

    #[tokio::test]
    async fn test_filter_change_drops_rendered_list_and_cursor() {
        let (store, _dir) = test_store().await;
        seed_products(
            &store,
            6,
            |i| format!("P{}", i),
            |i| if i <= 3 { "cay-xanh" } else { "ban-cong" },
        )
        .await;

        let mut view = ListView::new(products_spec(2));
        view.load_first(&store).await.unwrap();
        let stale = view.cursor().unwrap();

        view.set_filter(ListFilter::Category("cay-xanh".to_string()));
        assert_eq!(view.state(), &ViewState::Idle);
        assert!(view.rendered().is_empty());
        assert!(view.cursor().is_none());
        assert!(!view.resume(&stale));

        view.load_first(&store).await.unwrap();
        let names: Vec<_> = view
            .rendered()
            .iter()
            .map(|d| d.get_str("name").unwrap())
            .collect();
        assert_eq!(names, vec!["P3", "P2"]);
    }

    #[tokio::test]
    async fn test_search_view_pages_through_matches() {
        let (store, _dir) = test_store().await;
        let catalog = ["Cây Hoa Hồng", "Cây Xanh", "Hoa Lan", "Cây Cảnh"];
        seed_products(&store, catalog.len(), |i| catalog[i - 1].to_string(), |_| "x").await;

        let mut view = ListView::with_filter(
            products_spec(20),
            ListFilter::Search(SearchTerm::new("hoa")),
        );
        view.load_first(&store).await.unwrap();

        let names: Vec<_> = view
            .rendered()
            .iter()
            .map(|d| d.get_str("name").unwrap())
            .collect();
        assert_eq!(names, vec!["Hoa Lan", "Cây Hoa Hồng"]);
    }

    #[tokio::test]
    async fn test_resume_continues_after_cursor() {
        let (store, _dir) = test_store().await;
        seed_products(&store, 5, |i| format!("P{}", i), |_| "x").await;

        let mut first = ListView::new(products_spec(2));
        first.load_first(&store).await.unwrap();
        let token = first.next_token().unwrap();

        let mut resumed = ListView::new(products_spec(2));
        assert!(resumed.resume(&PageCursor::decode(&token).unwrap()));
        let names: Vec<_> = resumed
            .load_more(&store)
            .await
            .unwrap()
            .iter()
            .map(|d| d.get_str("name").unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["P3", "P2"]);
    }

    #[tokio::test]
    async fn test_failed_continuation_leaves_error_with_nothing_rendered() {
        let (inner, _dir) = test_store().await;
        seed_products(&inner, 4, |i| format!("P{}", i), |_| "x").await;
        let store = FlakyStore {
            inner,
            failing: AtomicBool::new(false),
        };

        let mut view = ListView::new(products_spec(2));
        view.load_first(&store).await.unwrap();

        store.failing.store(true, Ordering::SeqCst);
        assert!(view.load_more(&store).await.is_err());
        assert!(matches!(view.state(), ViewState::Error(_)));
        assert!(view.rendered().is_empty());
        assert!(!view.has_more());
    }

    #[tokio::test]
    async fn test_empty_collection_is_empty_state() {
        let (store, _dir) = test_store().await;

        let mut view = ListView::new(products_spec(20));
        view.load_first(&store).await.unwrap();
        assert_eq!(view.state(), &ViewState::Empty);
        assert!(view.next_token().is_none());
    }
}
