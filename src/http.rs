//! Shared HTTP client for provider APIs
//!
//! Wraps a [`reqwest::Client`] with bearer-token helpers. Every request is
//! issued through the run's [`CancelHandle`], so cancelling a run drops the
//! in-flight request future, and no new request starts after cancellation.
//! Non-2xx responses become [`ApiError::Status`] carrying a truncated body.

use crate::cancel::CancelHandle;
use crate::config::Config;
use crate::error::{ApiError, Error, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest response body kept in an error message
const ERROR_BODY_LIMIT: usize = 512;

/// Thin wrapper over a pooled reqwest client
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a client with an optional per-request timeout
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent("acquisition");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Create a client honoring `config.request_timeout`
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.request_timeout)
    }

    /// The underlying reqwest client
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// GET `url` with a bearer token and decode the JSON body
    pub async fn get_json<T>(&self, url: &str, token: &str, cancel: &CancelHandle) -> Result<T>
    where
        T: DeserializeOwned,
    {
        cancel
            .run(async {
                let response = self.client.get(url).bearer_auth(token).send().await?;
                let response = ensure_success(url, response).await?;
                let body = response.bytes().await?;
                serde_json::from_slice(&body).map_err(|e| Error::malformed(url, e.to_string()))
            })
            .await
    }

    /// POST a raw body with a bearer token
    ///
    /// Returns the response `Content-Type` (empty if absent) and body text.
    pub async fn post_raw(
        &self,
        url: &str,
        token: &str,
        content_type: &str,
        body: String,
        cancel: &CancelHandle,
    ) -> Result<(String, String)> {
        cancel
            .run(async {
                let response = self
                    .client
                    .post(url)
                    .bearer_auth(token)
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .body(body)
                    .send()
                    .await?;
                let response = ensure_success(url, response).await?;
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let text = response.text().await?;
                Ok((content_type, text))
            })
            .await
    }

    /// DELETE `url` with a bearer token, ignoring the response body
    pub async fn delete(&self, url: &str, token: &str, cancel: &CancelHandle) -> Result<()> {
        cancel
            .run(async {
                let response = self.client.delete(url).bearer_auth(token).send().await?;
                ensure_success(url, response).await?;
                Ok(())
            })
            .await
    }
}

/// Map a non-2xx response onto [`ApiError::Status`]
pub(crate) async fn ensure_success(url: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    Err(Error::Api(ApiError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body,
    }))
}

/// Join a base URL and a path without doubling or dropping the slash
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
