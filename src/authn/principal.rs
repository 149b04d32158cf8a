//! Principals and the credential-to-principal resolution contract.

use std::collections::HashMap;

use regex::Regex;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::Credential;

/// Attribute name to value(s), e.g. `mail -> [alice@example.org]`.
pub type Attributes = HashMap<String, Vec<String>>;

/// Static per-account attribute source. Person-directory lookups live outside
/// this system; deployments that want attributes configure them up front.
pub type AttributeSource = HashMap<String, Attributes>;

/// Canonical identity plus its attribute set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub attributes: Attributes,
}

impl Principal {
    #[must_use]
    pub fn new(id: String, attributes: Attributes) -> Self {
        Self { id, attributes }
    }
}

/// Maps a credential a handler just accepted to a canonical principal.
///
/// Returning `None` after a handler success is a configuration fault; the
/// dispatcher fails the whole authentication rather than granting an
/// anonymous principal.
pub trait PrincipalResolver: Send + Sync {
    fn resolve(&self, credential: &Credential) -> Option<Principal>;
}

fn normalize_account_id(raw: &str) -> Option<String> {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn is_email(candidate: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(candidate))
}

/// Resolves the credential's username verbatim (lowercased, trimmed).
#[derive(Debug, Default)]
pub struct AccountIdResolver {
    attributes: AttributeSource,
}

impl AccountIdResolver {
    #[must_use]
    pub fn new(attributes: AttributeSource) -> Self {
        Self { attributes }
    }
}

impl PrincipalResolver for AccountIdResolver {
    fn resolve(&self, credential: &Credential) -> Option<Principal> {
        let id = normalize_account_id(credential.username()?)?;
        let attributes = self.attributes.get(&id).cloned().unwrap_or_default();
        Some(Principal::new(id, attributes))
    }
}

/// Resolves email-formatted usernames back to the account id (the local
/// part); non-email usernames pass through unchanged. Backing directories
/// are case-insensitive, so the result is always lowercased.
#[derive(Debug, Default)]
pub struct EmailAccountResolver {
    attributes: AttributeSource,
}

impl EmailAccountResolver {
    #[must_use]
    pub fn new(attributes: AttributeSource) -> Self {
        Self { attributes }
    }
}

impl PrincipalResolver for EmailAccountResolver {
    fn resolve(&self, credential: &Credential) -> Option<Principal> {
        let username = credential.username()?.trim();
        let account = if is_email(username) {
            username.split('@').next()?
        } else {
            username
        };
        let id = normalize_account_id(account)?;
        let attributes = self.attributes.get(&id).cloned().unwrap_or_default();
        Some(Principal::new(id, attributes))
    }
}

/// Resolves the subject prefix of a delegated assertion
/// (`<subject>:<opaque blob>`).
#[derive(Debug, Default)]
pub struct DelegatedSubjectResolver;

impl PrincipalResolver for DelegatedSubjectResolver {
    fn resolve(&self, credential: &Credential) -> Option<Principal> {
        let Credential::DelegatedAssertion { assertion } = credential else {
            return None;
        };
        let subject = assertion.expose_secret().split(':').next()?;
        let id = normalize_account_id(subject)?;
        Some(Principal::new(id, Attributes::new()))
    }
}
