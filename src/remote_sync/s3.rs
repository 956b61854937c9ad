//! S3 backend for the catalog mirror.

use super::object_store::{RemoteObjectStore, RemoteSyncError};
use crate::interrupt::{InterruptFlag, Interrupted};
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::debug;

/// Where the catalog file lives in S3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
    pub profile: String,
}

/// Blocking facade over the async S3 client, driven by a private
/// current-thread runtime. Every request is abandoned as soon as the
/// interrupt flag is raised.
pub struct S3ObjectStore {
    runtime: Runtime,
    client: Client,
    location: S3Location,
    interrupt: InterruptFlag,
}

fn request_error<E: std::error::Error>(err: E) -> RemoteSyncError {
    RemoteSyncError::Request(DisplayErrorContext(&err).to_string())
}

/// Drives `request` to completion unless `interrupt` is raised first.
fn block_on_interruptible<T>(
    runtime: &Runtime,
    interrupt: &InterruptFlag,
    request: impl Future<Output = Result<T, RemoteSyncError>>,
) -> Result<T, RemoteSyncError> {
    interrupt.check()?;
    runtime.block_on(async {
        tokio::select! {
            result = request => result,
            _ = interrupt.raised() => {
                debug!("S3 request abandoned after interrupt");
                Err(Interrupted.into())
            }
        }
    })
}

impl S3ObjectStore {
    pub fn connect(location: S3Location, interrupt: InterruptFlag) -> Result<Self, RemoteSyncError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let sdk_config = block_on_interruptible(&runtime, &interrupt, async {
            Ok::<_, RemoteSyncError>(aws_config::defaults(BehaviorVersion::latest())
                .profile_name(&location.profile)
                .load()
                .await)
        })?;
        debug!(
            "Created S3 client for s3://{}/{} with profile {}",
            location.bucket, location.key, location.profile
        );
        Ok(Self {
            runtime,
            client: Client::new(&sdk_config),
            location,
            interrupt,
        })
    }

    fn run<T>(
        &self,
        request: impl Future<Output = Result<T, RemoteSyncError>>,
    ) -> Result<T, RemoteSyncError> {
        block_on_interruptible(&self.runtime, &self.interrupt, request)
    }
}

impl RemoteObjectStore for S3ObjectStore {
    fn last_modified(&self) -> Result<DateTime<Utc>, RemoteSyncError> {
        let output = self.run(async {
            self.client
                .head_object()
                .bucket(&self.location.bucket)
                .key(&self.location.key)
                .send()
                .await
                .map_err(|err| {
                    if err
                        .as_service_error()
                        .map(|service_err| service_err.is_not_found())
                        .unwrap_or(false)
                    {
                        RemoteSyncError::MissingObject(self.describe())
                    } else {
                        request_error(err)
                    }
                })
        })?;

        output
            .last_modified()
            .and_then(|modified| DateTime::from_timestamp(modified.secs(), modified.subsec_nanos()))
            .ok_or_else(|| RemoteSyncError::MissingTimestamp(self.describe()))
    }

    fn download_to(&self, destination: &Path) -> Result<(), RemoteSyncError> {
        self.run(async {
            let output = self
                .client
                .get_object()
                .bucket(&self.location.bucket)
                .key(&self.location.key)
                .send()
                .await
                .map_err(request_error)?;
            let bytes = output
                .body
                .collect()
                .await
                .map_err(request_error)?
                .into_bytes();
            tokio::fs::write(destination, &bytes).await?;
            Ok::<(), RemoteSyncError>(())
        })
    }

    fn upload_from(&self, source: &Path) -> Result<(), RemoteSyncError> {
        self.run(async {
            let body = ByteStream::from_path(source)
                .await
                .map_err(request_error)?;
            self.client
                .put_object()
                .bucket(&self.location.bucket)
                .key(&self.location.key)
                .body(body)
                .send()
                .await
                .map_err(request_error)?;
            Ok::<(), RemoteSyncError>(())
        })
    }

    fn describe(&self) -> String {
        format!("s3://{}/{}", self.location.bucket, self.location.key)
    }
}
