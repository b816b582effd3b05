//! Backend service client
//!
//! The backend owns the user's session and exposes the allow-list, package
//! signing and upload notification. Every response is a `{ "ok": bool, ... }`
//! envelope; `ok: false` is a typed failure.
//!
//! Requests carry the session's bearer token. When the backend answers 401 and
//! a refresh token is held, the client refreshes the session once and replays
//! the request. Concurrent callers that hit 401 together share that single
//! refresh.

use crate::error::{ApiError, Error, Result};
use crate::http::{ensure_success, join_url};
use crate::package::{NotifyService, SignRequest, SigningService, UploadTarget};
use crate::validator::AllowListSource;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::RwLock;

/// Backend session tokens
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Bearer token sent with every request
    pub access_token: String,
    /// Token exchanged for a new access token on 401
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// HTTP client for the backend API
#[derive(Debug)]
pub struct BackendClient {
    client: reqwest::Client,
    base: String,
    session: RwLock<Session>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl BackendClient {
    /// Create a client for the backend at `base`
    pub fn new(client: reqwest::Client, base: impl Into<String>, session: Session) -> Self {
        Self {
            client,
            base: base.into(),
            session: RwLock::new(session),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Current access token
    pub fn access_token(&self) -> String {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .access_token
            .clone()
    }

    /// Whether the session is accepted by the backend
    ///
    /// Any failure counts as "not authorized".
    pub async fn check_authorized(&self) -> bool {
        match self.get_envelope("private/checkAuth", &[]).await {
            Ok(envelope) => envelope_ok(&envelope),
            Err(e) => {
                tracing::debug!(error = %e, "Session check failed");
                false
            }
        }
    }

    /// Account addresses the current user may acquire data from
    pub async fn allowed_emails(&self) -> Result<Vec<String>> {
        let envelope = self.get_envelope("private/getMyEmails", &[]).await?;
        if !envelope_ok(&envelope) {
            return Err(ApiError::Rejected("allow-list request".into()).into());
        }

        let emails = envelope
            .get("emails")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::malformed("private/getMyEmails", "missing emails array"))?;
        Ok(emails
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    /// Request a signed upload target for a package
    pub async fn sign_package(&self, request: &SignRequest) -> Result<UploadTarget> {
        let query = [
            ("name", request.name.clone()),
            ("contentType", request.content_type.clone()),
            ("size", request.size.to_string()),
            ("email", request.email.clone()),
        ];
        let envelope = self
            .get_envelope("private/signGmailPackage", &query)
            .await?;
        if !envelope_ok(&envelope) {
            return Err(ApiError::Rejected(format!("signing of {}", request.name)).into());
        }

        let field = |name: &str| {
            envelope
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::malformed("private/signGmailPackage", format!("missing {}", name))
                })
        };
        Ok(UploadTarget {
            id: field("id")?,
            upload_url: field("s3Url")?,
        })
    }

    /// Report an uploaded package; returns the backend's acknowledgement
    pub async fn notify_uploaded(&self, package_id: &str, email: &str) -> Result<bool> {
        let query = [
            ("id", package_id.to_string()),
            ("email", email.to_string()),
        ];
        let envelope = self
            .get_envelope("private/gmailPackageUploaded", &query)
            .await?;
        Ok(envelope_ok(&envelope))
    }

    async fn get_envelope(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = join_url(&self.base, path);
        let token = self.access_token();

        let mut response = self.send(&url, query, &token).await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            if let Some(fresh) = self.refresh_after_unauthorized(&token).await? {
                tracing::debug!(path, "Replaying request with refreshed session");
                response = self.send(&url, query, &fresh).await?;
            }
        }

        let response = ensure_success(&url, response).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| Error::malformed(path, e.to_string()))
    }

    async fn send(
        &self,
        url: &str,
        query: &[(&str, String)],
        token: &str,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?)
    }

    /// Refresh the session after `rejected` got a 401
    ///
    /// Returns the token to replay with, or None when no refresh token is held.
    async fn refresh_after_unauthorized(&self, rejected: &str) -> Result<Option<String>> {
        let refresh_token = {
            let session = self.session.read().unwrap_or_else(|e| e.into_inner());
            match &session.refresh_token {
                Some(token) => token.clone(),
                None => return Ok(None),
            }
        };

        let _guard = self.refresh_lock.lock().await;

        // Another caller refreshed while we waited
        let current = self.access_token();
        if current != rejected {
            return Ok(Some(current));
        }

        let url = join_url(&self.base, "auth/refresh-token");
        let response = self
            .send(&url, &[("refreshToken", refresh_token)], &current)
            .await?;
        let response = ensure_success(&url, response).await?;
        let body: Value = response.json().await?;
        let fresh = body
            .pointer("/refreshed/accessToken")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::malformed("auth/refresh-token", "missing refreshed.accessToken"))?
            .to_string();

        self.session
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .access_token = fresh.clone();
        tracing::info!("Backend session refreshed");
        Ok(Some(fresh))
    }
}

fn envelope_ok(envelope: &Value) -> bool {
    envelope.get("ok").and_then(Value::as_bool).unwrap_or(false)
}

#[async_trait]
impl SigningService for BackendClient {
    async fn sign(&self, request: &SignRequest) -> Result<UploadTarget> {
        self.sign_package(request).await
    }
}

#[async_trait]
impl NotifyService for BackendClient {
    async fn notify(&self, package_id: &str, email: &str) -> Result<bool> {
        self.notify_uploaded(package_id, email).await
    }
}

#[async_trait]
impl AllowListSource for BackendClient {
    async fn allowed_emails(&self) -> Result<Vec<String>> {
        BackendClient::allowed_emails(self).await
    }
}
