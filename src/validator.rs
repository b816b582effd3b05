//! Account validation against the allow-list
//!
//! Addresses are compared in canonical form (trimmed, lowercased). The verdict
//! is a pure function of its inputs, so validating the same address against the
//! same allow-list always yields the same answer.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Source of the allow-list for the current user
#[async_trait]
pub trait AllowListSource: Send + Sync {
    /// Account addresses the current user may acquire data from
    async fn allowed_emails(&self) -> Result<Vec<String>>;
}

/// Outcome of checking an authenticated account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// The account is allowed to complete a run
    Allowed {
        /// Canonical address that matched
        email: String,
    },
    /// The account is not in the allow-list
    Rejected {
        /// Canonical address that was rejected
        email: String,
        /// The allow-list it was checked against, for remediation UI
        allowed: Vec<String>,
    },
}

impl Verdict {
    /// Whether the account passed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed { .. })
    }
}

/// Allow-list of account addresses permitted for the current user
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountValidator {
    allowed: Vec<String>,
}

impl AccountValidator {
    /// Build a validator; entries are canonicalized and de-duplicated, order kept
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut canonical: Vec<String> = Vec::new();
        for address in allowed {
            let address = canonicalize(address.as_ref());
            if !address.is_empty() && !canonical.contains(&address) {
                canonical.push(address);
            }
        }
        Self { allowed: canonical }
    }

    /// The canonical allow-list
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// The first allowed address, used as a login hint
    pub fn login_hint(&self) -> Option<&str> {
        self.allowed.first().map(String::as_str)
    }

    /// Whether the allow-list is empty (nothing can pass)
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Check an authenticated account address
    pub fn validate(&self, email: &str) -> Verdict {
        let email = canonicalize(email);
        if !email.is_empty() && self.allowed.contains(&email) {
            Verdict::Allowed { email }
        } else {
            Verdict::Rejected {
                email,
                allowed: self.allowed.clone(),
            }
        }
    }
}

// A fixed allow-list, for embedders that already know it
#[async_trait]
impl AllowListSource for AccountValidator {
    async fn allowed_emails(&self) -> Result<Vec<String>> {
        Ok(self.allowed.clone())
    }
}

/// Canonical form of an account address
pub fn canonicalize(email: &str) -> String {
    email.trim().to_lowercase()
}
