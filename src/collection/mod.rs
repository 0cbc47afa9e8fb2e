//! Column collection module
//!
//! Holds the ordered columns of one layer, indexes them, and keeps them
//! consistent as columns are added, removed or moved to another data view.

mod collection;
mod convert;
mod error;

pub use collection::ColumnCollection;
pub use error::CollectionError;
