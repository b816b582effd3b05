//! Configuration types for acquisition

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fetch behavior configuration (chunking, throttling, page sizes)
///
/// Groups settings that shape how records are enumerated and fetched.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Number of record identifiers fetched per batch request (default: 50)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Fixed pause after each chunk fetch, except the last (default: 1000 ms)
    ///
    /// This is a plain cooperative backoff; it never inspects rate-limit headers.
    #[serde(default = "default_chunk_delay", with = "duration_ms_serde")]
    pub chunk_delay: Duration,

    /// Gmail message list page size, `maxResults` (default: 5000)
    #[serde(default = "default_gmail_page_size")]
    pub gmail_page_size: u32,

    /// Microsoft Graph `$top` page size (None = provider default)
    #[serde(default)]
    pub graph_page_size: Option<u32>,

    /// Zoom meetings/participants page size (default: 100)
    #[serde(default = "default_zoom_page_size")]
    pub zoom_page_size: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_delay: default_chunk_delay(),
            gmail_page_size: default_gmail_page_size(),
            graph_page_size: None,
            zoom_page_size: default_zoom_page_size(),
        }
    }
}

/// What happens once every record has been fetched
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPolicy {
    /// Go straight from fetching to signing and uploading
    #[default]
    AutoUpload,
    /// Stop at `records-fetched` until [`Workflow::confirm_upload`](crate::workflow::Workflow::confirm_upload)
    ConfirmBeforeUpload,
}

/// Base URLs for every remote API the workflow talks to
///
/// Overridable so deployments can route through a proxy and tests can point
/// everything at a mock server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Gmail REST API base (default: "https://www.googleapis.com")
    #[serde(default = "default_gmail_api")]
    pub gmail_api: String,

    /// Gmail batch endpoint (default: "https://www.googleapis.com/batch/gmail/v1")
    #[serde(default = "default_gmail_batch")]
    pub gmail_batch: String,

    /// Microsoft Graph base (default: "https://graph.microsoft.com")
    #[serde(default = "default_graph_api")]
    pub graph_api: String,

    /// Zoom API base (default: "https://api.zoom.us/v2")
    #[serde(default = "default_zoom_api")]
    pub zoom_api: String,

    /// Backend service host providing allow-list, signing and notify endpoints
    #[serde(default = "default_backend_api")]
    pub backend_api: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            gmail_api: default_gmail_api(),
            gmail_batch: default_gmail_batch(),
            graph_api: default_graph_api(),
            zoom_api: default_zoom_api(),
            backend_api: default_backend_api(),
        }
    }
}

/// Package naming
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PackageConfig {
    /// File name given to the uploaded JSON package (default: "data.json")
    #[serde(default = "default_package_name")]
    pub file_name: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            file_name: default_package_name(),
        }
    }
}

/// Main configuration for the acquisition workflow
///
/// Fields are organized into logical sub-configs:
/// - [`fetch`](FetchConfig): chunking, throttling, page sizes
/// - [`endpoints`](EndpointsConfig): remote API base URLs
/// - [`package`](PackageConfig): package naming
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chunking, throttling and pagination settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Remote API base URLs
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Whether to upload immediately or wait for confirmation
    #[serde(default)]
    pub upload_policy: UploadPolicy,

    /// Package naming
    #[serde(default)]
    pub package: PackageConfig,

    /// Per-request timeout (None = transport default)
    #[serde(default, with = "optional_duration_ms_serde")]
    pub request_timeout: Option<Duration>,
}

impl Config {
    /// Check the configuration for values that would make a run impossible
    pub fn validate(&self) -> Result<()> {
        if self.fetch.chunk_size == 0 {
            return Err(Error::config(
                "fetch.chunk_size",
                "chunk size must be at least 1",
            ));
        }
        if self.fetch.gmail_page_size == 0 {
            return Err(Error::config(
                "fetch.gmail_page_size",
                "page size must be at least 1",
            ));
        }
        if self.fetch.zoom_page_size == 0 {
            return Err(Error::config(
                "fetch.zoom_page_size",
                "page size must be at least 1",
            ));
        }
        if self.fetch.graph_page_size == Some(0) {
            return Err(Error::config(
                "fetch.graph_page_size",
                "page size must be at least 1",
            ));
        }
        if self.package.file_name.trim().is_empty() {
            return Err(Error::config(
                "package.file_name",
                "package file name must not be empty",
            ));
        }

        let endpoints = [
            ("endpoints.gmail_api", &self.endpoints.gmail_api),
            ("endpoints.gmail_batch", &self.endpoints.gmail_batch),
            ("endpoints.graph_api", &self.endpoints.graph_api),
            ("endpoints.zoom_api", &self.endpoints.zoom_api),
            ("endpoints.backend_api", &self.endpoints.backend_api),
        ];
        for (key, value) in endpoints {
            url::Url::parse(value)
                .map_err(|e| Error::config(key, format!("invalid URL {:?}: {}", value, e)))?;
        }

        Ok(())
    }
}

fn default_chunk_size() -> usize {
    50
}

fn default_chunk_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_gmail_page_size() -> u32 {
    5000
}

fn default_zoom_page_size() -> u32 {
    100
}

fn default_gmail_api() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_gmail_batch() -> String {
    "https://www.googleapis.com/batch/gmail/v1".to_string()
}

fn default_graph_api() -> String {
    "https://graph.microsoft.com".to_string()
}

fn default_zoom_api() -> String {
    "https://api.zoom.us/v2".to_string()
}

fn default_backend_api() -> String {
    "http://localhost:4000".to_string()
}

fn default_package_name() -> String {
    "data.json".to_string()
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper (milliseconds)
mod optional_duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
