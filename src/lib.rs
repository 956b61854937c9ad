//! allplay media catalog library
//!
//! This library exposes the catalog engine for the CLI binary and for tests.

pub mod catalog_store;
pub mod config;
pub mod interrupt;
pub mod media;
pub mod remote_sync;
pub mod scanner;
pub mod session;
pub mod sqlite_persistence;
pub mod tags;

// Re-export commonly used types for convenience
pub use catalog_store::{CatalogError, CatalogFilter, CatalogStore, MediaEntry, MediaSources};
pub use interrupt::InterruptFlag;
pub use media::MediaItem;
pub use remote_sync::{RemoteObjectStore, RemoteSyncCache, SyncOutcome};
pub use scanner::{MediaExtensions, Scanner};
pub use session::{Session, SessionSettings};
pub use tags::TagManager;
