mod error;
mod filter;
mod models;
mod mounts;
mod schema;
mod store;
mod view;

pub use error::{CatalogError, CatalogResult};
pub use filter::{CatalogFilter, Combinator, SortKey, SortOrder};
pub use models::{MediaEntry, MergeReport, ScanBatch, StagedEntry, StagedKind};
pub use mounts::{normalize_path, MediaSources};
pub use schema::CATALOG_VERSIONED_SCHEMAS;
pub use store::CatalogStore;
pub use view::CatalogView;
