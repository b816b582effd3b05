//! Packaging and upload
//!
//! The records of a run are serialized into one JSON document (an array of
//! tagged records), named and typed as a file, and shipped in three steps:
//! ask the signing service for an upload target, PUT the exact bytes to it,
//! then tell the notify service the package landed. Each step runs once; a
//! failure at any step ends the run and later steps are never attempted.

use crate::cancel::CancelHandle;
use crate::error::{Error, PackageError, Result};
use crate::http::ensure_success;
use crate::records::Record;
use crate::types::Event;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Content type of every package
pub const PACKAGE_CONTENT_TYPE: &str = "application/json";

/// Serialized records, ready to upload
#[derive(Clone, PartialEq, Eq)]
pub struct Package {
    /// File name
    pub name: String,
    /// MIME type
    pub content_type: String,
    /// Exact bytes to upload
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl Package {
    /// Serialize `records`, in order, into a JSON package named `name`
    pub fn from_records(name: impl Into<String>, records: &[Record]) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            content_type: PACKAGE_CONTENT_TYPE.to_string(),
            bytes: serde_json::to_vec(records)?,
        })
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// What the signing service needs to issue an upload target
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    /// Package file name
    pub name: String,
    /// Package MIME type
    pub content_type: String,
    /// Package size in bytes
    pub size: u64,
    /// Account the package belongs to
    pub email: String,
}

/// Signed upload location
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    /// Opaque package ID used for the notify call
    pub id: String,
    /// Pre-signed URL the package is PUT to
    pub upload_url: String,
}

/// Issues signed upload targets
#[async_trait]
pub trait SigningService: Send + Sync {
    /// Request an upload target for a package
    async fn sign(&self, request: &SignRequest) -> Result<UploadTarget>;
}

/// Receives "package uploaded" notifications
#[async_trait]
pub trait NotifyService: Send + Sync {
    /// Report a finished upload; returns the service's `ok` acknowledgement
    async fn notify(&self, package_id: &str, email: &str) -> Result<bool>;
}

/// Stores package bytes at a signed URL
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// PUT `bytes` to `url` with a matching content type
    async fn put(&self, url: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
}

/// Object storage reached with a plain HTTP PUT to a pre-signed URL
#[derive(Clone, Debug, Default)]
pub struct HttpObjectStorage {
    client: reqwest::Client,
}

impl HttpObjectStorage {
    /// Use an existing client (shares its connection pool and timeout)
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn put(&self, url: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        // Pre-signed URLs carry their own authorization
        let response = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        ensure_success(url, response).await?;
        Ok(())
    }
}

/// Runs the sign → PUT → notify sequence
#[derive(Clone)]
pub struct Uploader {
    signing: Arc<dyn SigningService>,
    storage: Arc<dyn ObjectStorage>,
    notify: Arc<dyn NotifyService>,
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader").finish_non_exhaustive()
    }
}

impl Uploader {
    /// Create an uploader from its three collaborators
    pub fn new(
        signing: Arc<dyn SigningService>,
        storage: Arc<dyn ObjectStorage>,
        notify: Arc<dyn NotifyService>,
    ) -> Self {
        Self {
            signing,
            storage,
            notify,
        }
    }

    /// Upload `package` for `email`, returning the package ID
    ///
    /// Emits `Signing`, `Uploading` and `Notifying` through `emit` as each step
    /// starts. Cancellation aborts whichever step is in flight.
    pub async fn upload<F>(
        &self,
        package: Package,
        email: &str,
        cancel: &CancelHandle,
        mut emit: F,
    ) -> Result<String>
    where
        F: FnMut(Event) + Send,
    {
        let request = SignRequest {
            name: package.name.clone(),
            content_type: package.content_type.clone(),
            size: package.size(),
            email: email.to_string(),
        };

        emit(Event::Signing {
            name: request.name.clone(),
            size: request.size,
        });
        let target = cancel
            .run(self.signing.sign(&request))
            .await
            .map_err(|e| {
                step_error(e, |reason| PackageError::SigningFailed {
                    name: request.name.clone(),
                    reason,
                })
            })?;
        tracing::debug!(package_id = %target.id, size = request.size, "Package signed");

        emit(Event::Uploading {
            package_id: target.id.clone(),
        });
        cancel
            .run(
                self.storage
                    .put(&target.upload_url, package.bytes, &package.content_type),
            )
            .await
            .map_err(|e| {
                step_error(e, |reason| PackageError::UploadFailed {
                    id: target.id.clone(),
                    reason,
                })
            })?;

        emit(Event::Notifying {
            package_id: target.id.clone(),
        });
        let acknowledged = cancel
            .run(self.notify.notify(&target.id, email))
            .await
            .map_err(|e| {
                step_error(e, |reason| PackageError::NotifyFailed {
                    id: target.id.clone(),
                    reason,
                })
            })?;
        if !acknowledged {
            return Err(PackageError::NotifyRejected { id: target.id }.into());
        }

        tracing::info!(package_id = %target.id, "Package uploaded and acknowledged");
        Ok(target.id)
    }
}

/// Wrap a step failure; cancellations pass through untouched
fn step_error<F>(error: Error, wrap: F) -> Error
where
    F: FnOnce(String) -> PackageError,
{
    if error.is_cancelled() {
        error
    } else {
        Error::Package(wrap(error.to_string()))
    }
}
