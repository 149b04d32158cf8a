//! Local account table: exact match against an in-memory map.

use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::AuthenticationHandler;
use crate::authn::{Credential, HandlerOutcome};

/// Unknown accounts and wrong passwords share one reason string so the
/// failure trace leaks nothing about which accounts exist.
const REJECT_REASON: &str = "unknown account or bad password";

pub struct LocalTableHandler {
    users: HashMap<String, SecretString>,
}

impl LocalTableHandler {
    #[must_use]
    pub fn new(users: HashMap<String, SecretString>) -> Self {
        Self { users }
    }

    /// Parse `account:password` lines; `#` starts a comment.
    pub fn from_lines(text: &str) -> Result<Self> {
        let mut users = HashMap::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((account, password)) = line.split_once(':') else {
                bail!("malformed local account entry on line {}", index + 1);
            };
            let account = account.trim();
            if account.is_empty() || password.is_empty() {
                bail!("malformed local account entry on line {}", index + 1);
            }
            users.insert(
                account.to_string(),
                SecretString::from(password.to_string()),
            );
        }
        Ok(Self { users })
    }
}

#[async_trait]
impl AuthenticationHandler for LocalTableHandler {
    fn name(&self) -> &'static str {
        "local-table"
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::UsernamePassword { .. })
    }

    async fn authenticate(&self, credential: &Credential) -> HandlerOutcome {
        let Credential::UsernamePassword { username, password } = credential else {
            return HandlerOutcome::HandledFailure {
                reason: format!("credential kind {} not supported", credential.kind()),
            };
        };

        match self.users.get(username) {
            Some(expected) if expected.expose_secret() == password.expose_secret() => {
                HandlerOutcome::Success
            }
            _ => HandlerOutcome::HandledFailure {
                reason: REJECT_REASON.to_string(),
            },
        }
    }
}
