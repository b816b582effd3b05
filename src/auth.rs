//! Provider authorization
//!
//! Login itself happens outside this crate (a browser popup, an OAuth redirect,
//! a token handed over by a sign-in button). The workflow only sees the narrow
//! [`Authorizer`] interface: try to get a credential silently, fall back to an
//! interactive consent flow when the provider says interaction is required,
//! and log out.
//!
//! Authorizers are held per session in an [`AuthRegistry`], keyed by
//! [`Application`]. An instance is created by the registry's factory on first
//! use and torn down on logout, so "choose another account" always starts from
//! a fresh login.

use crate::cancel::CancelHandle;
use crate::error::{AuthError, Error, Result};
use crate::types::{Credential, Provider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Application an authorizer logs into (one per provider)
pub type Application = Provider;

/// Scopes requested for each application
pub fn default_scopes(application: Application) -> &'static [&'static str] {
    match application {
        Provider::Gmail => &["https://www.googleapis.com/auth/gmail.metadata"],
        Provider::Outlook => &["User.Read", "Mail.ReadBasic"],
        Provider::Teams => &["User.Read", "Group.Read.All"],
        Provider::Zoom => &["user:read", "meeting:read"],
    }
}

/// Parameters for a token acquisition
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthRequest {
    /// Account to preselect in the login UI
    pub login_hint: Option<String>,
    /// Scopes to request
    pub scopes: Vec<String>,
}

impl AuthRequest {
    /// Request the default scopes for `application`
    pub fn for_application(application: Application, login_hint: Option<String>) -> Self {
        Self {
            login_hint,
            scopes: default_scopes(application)
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Provider login/consent collaborator
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Obtain a credential without user interaction
    ///
    /// Must fail with [`AuthError::InteractionRequired`] when consent, login or
    /// account selection is needed; any other error is treated as fatal.
    async fn acquire_silent(&self, request: &AuthRequest) -> Result<Credential>;

    /// Obtain a credential through an interactive consent flow
    async fn acquire_interactive(&self, request: &AuthRequest) -> Result<Credential>;

    /// Clear cached sessions for this application (best-effort)
    async fn logout(&self) -> Result<()>;
}

/// Acquire a credential, escalating to the interactive flow only when required
///
/// `on_interactive` runs just before the interactive flow starts.
pub async fn authorize<F>(
    authorizer: &dyn Authorizer,
    request: &AuthRequest,
    cancel: &CancelHandle,
    on_interactive: F,
) -> Result<Credential>
where
    F: FnOnce() + Send,
{
    match cancel.run(authorizer.acquire_silent(request)).await {
        Ok(credential) => Ok(credential),
        Err(e) if e.requires_interaction() => {
            tracing::debug!(reason = %e, "Silent token acquisition failed, escalating to interactive flow");
            on_interactive();
            cancel.run(authorizer.acquire_interactive(request)).await
        }
        Err(e) => Err(e),
    }
}

/// Builds an authorizer for an application on first use
pub type AuthorizerFactory =
    Box<dyn Fn(Application) -> Result<Arc<dyn Authorizer>> + Send + Sync>;

/// Per-session authorizer instances keyed by application
pub struct AuthRegistry {
    factory: AuthorizerFactory,
    instances: Mutex<HashMap<Application, Arc<dyn Authorizer>>>,
}

impl std::fmt::Debug for AuthRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active: Vec<Application> = self
            .instances
            .lock()
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default();
        f.debug_struct("AuthRegistry")
            .field("active", &active)
            .finish()
    }
}

impl AuthRegistry {
    /// Create a registry that builds authorizers with `factory`
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(Application) -> Result<Arc<dyn Authorizer>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// A registry that always hands out the same authorizer
    pub fn single(authorizer: Arc<dyn Authorizer>) -> Self {
        Self::new(move |_| Ok(Arc::clone(&authorizer)))
    }

    /// Authorizer for `application`, created on first use
    pub fn get(&self, application: Application) -> Result<Arc<dyn Authorizer>> {
        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = instances.get(&application) {
            return Ok(Arc::clone(existing));
        }

        let created = (self.factory)(application)?;
        tracing::debug!(application = %application, "Created authorizer");
        instances.insert(application, Arc::clone(&created));
        Ok(created)
    }

    /// Whether an authorizer instance currently exists for `application`
    pub fn is_active(&self, application: Application) -> bool {
        self.instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&application)
    }

    /// Log out and drop the instance for `application`
    ///
    /// Logout is best-effort: a failure is logged and the instance is dropped
    /// anyway, so the next `get` starts a fresh session.
    pub async fn teardown(&self, application: Application) {
        let removed = self
            .instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&application);

        if let Some(authorizer) = removed {
            match authorizer.logout().await {
                Ok(()) => tracing::info!(application = %application, "Logged out"),
                Err(e) => {
                    tracing::warn!(application = %application, error = %e, "Logout failed, session dropped anyway")
                }
            }
        }
    }
}

/// Authorizer for flows where the app already holds a token
///
/// Gmail sign-in and the Zoom OAuth redirect both hand the application a ready
/// access token. Silent acquisition returns it while it is valid; there is no
/// interactive flow to fall back to.
#[derive(Debug, Default)]
pub struct StaticAuthorizer {
    credential: Mutex<Option<Credential>>,
}

impl StaticAuthorizer {
    /// Wrap a credential obtained elsewhere
    pub fn new(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
        }
    }

    /// Replace the held credential (e.g. after the user signs in again)
    pub fn replace(&self, credential: Credential) {
        *self.credential.lock().unwrap_or_else(|e| e.into_inner()) = Some(credential);
    }

    fn current(&self) -> Option<Credential> {
        self.credential
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn acquire_silent(&self, _request: &AuthRequest) -> Result<Credential> {
        match self.current() {
            Some(credential) if !credential.is_expired() => Ok(credential),
            Some(_) => Err(AuthError::InteractionRequired("token expired".into()).into()),
            None => Err(AuthError::InteractionRequired("login_required".into()).into()),
        }
    }

    async fn acquire_interactive(&self, _request: &AuthRequest) -> Result<Credential> {
        match self.current() {
            Some(credential) if !credential.is_expired() => Ok(credential),
            Some(credential) => Err(Error::Auth(AuthError::Expired {
                email: credential.account_email,
            })),
            None => Err(AuthError::Denied("no credential available, sign in again".into()).into()),
        }
    }

    async fn logout(&self) -> Result<()> {
        self.credential
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        Ok(())
    }
}
