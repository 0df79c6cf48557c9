//! Content type descriptors shared by the admin and listing routes.

use crate::db::{Direction, OrderBy};
use crate::pagination::ListSpec;

/// Descriptor of a content collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSchema {
    pub collection: &'static str,
    /// Editable fields, excluding `image` and timestamps
    pub fields: &'static [&'static str],
    pub required: &'static [&'static str],
    pub order_field: &'static str,
    pub search_field: &'static str,
    pub category_field: Option<&'static str>,
    /// Field rendered through `format_price` on listings
    pub price_field: Option<&'static str>,
    pub page_size: u32,
    /// Object storage prefix for uploaded images
    pub image_prefix: &'static str,
}

pub const PRODUCTS: RecordSchema = RecordSchema {
    collection: "products",
    fields: &["name", "price", "category", "description"],
    required: &["name"],
    order_field: "createdAt",
    search_field: "name",
    category_field: Some("category"),
    price_field: Some("price"),
    page_size: 20,
    image_prefix: "products",
};

pub const NEWS: RecordSchema = RecordSchema {
    collection: "news",
    fields: &["title", "excerpt", "content"],
    required: &["title"],
    order_field: "createdAt",
    search_field: "title",
    category_field: None,
    price_field: None,
    page_size: 10,
    image_prefix: "news",
};

pub const SERVICES: RecordSchema = RecordSchema {
    collection: "services",
    fields: &["title", "excerpt", "content"],
    required: &["title"],
    order_field: "createdAt",
    search_field: "title",
    category_field: None,
    price_field: None,
    page_size: 20,
    image_prefix: "services",
};

pub static SCHEMAS: [RecordSchema; 3] = [PRODUCTS, NEWS, SERVICES];

/// Upper bound on a client-requested page size.
pub const MAX_PAGE_SIZE: u32 = 100;

impl RecordSchema {
    pub fn lookup(collection: &str) -> Option<&'static RecordSchema> {
        SCHEMAS.iter().find(|s| s.collection == collection)
    }

    /// Listing shape for this collection. Newest first unless `direction` says otherwise.
    pub fn list_spec(&self, page_size: Option<u32>, direction: Option<Direction>) -> ListSpec {
        ListSpec {
            collection: self.collection.to_string(),
            page_size: page_size
                .unwrap_or(self.page_size)
                .clamp(1, MAX_PAGE_SIZE),
            order: Some(OrderBy::new(
                self.order_field,
                direction.unwrap_or(Direction::Desc),
            )),
            category_field: self.category_field.map(str::to_string),
            search_field: Some(self.search_field.to_string()),
        }
    }
}

/// When a save must carry an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePolicy {
    pub require_on_create: bool,
    pub require_on_edit: bool,
}

impl ImagePolicy {
    pub fn new(require_on_edit: bool) -> Self {
        Self {
            require_on_create: true,
            require_on_edit,
        }
    }

    pub fn requires_image(&self, is_edit: bool) -> bool {
        if is_edit {
            self.require_on_edit
        } else {
            self.require_on_create
        }
    }
}
