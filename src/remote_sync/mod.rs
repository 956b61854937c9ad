//! Keeps the local catalog file in step with a remote copy.

mod cache;
mod decision;
mod object_store;
mod s3;

pub use cache::{RemoteSyncCache, SyncOutcome};
pub use decision::{local_modified, should_pull, should_push, GRACE_SKEW};
pub use object_store::{RemoteObjectStore, RemoteSyncError};
pub use s3::{S3Location, S3ObjectStore};
