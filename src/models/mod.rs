//! Data models for the storefront: content schemas, admin forms, site settings and reviews.
//!
//! Stored records stay schemaless JSON; these types only shape what enters the store.

mod form;
mod price;
mod review;
mod schema;
mod settings;

pub use form::*;
pub use price::*;
pub use review::*;
pub use schema::*;
pub use settings::*;
