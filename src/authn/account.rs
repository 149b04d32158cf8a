//! Device account registry: which OTP device belongs to which account.
//!
//! The OTP handler consults this before ever calling the remote verifier, so
//! an unregistered device costs zero external calls and leaks nothing through
//! timing.

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};

/// Capability check binding an account id to an authorized device public id.
pub trait AccountRegistry: Send + Sync {
    fn is_registered(&self, uid: &str, public_id: &str) -> bool;
}

/// In-memory registry loaded once at startup from `account:public_id` lines.
#[derive(Debug, Default)]
pub struct StaticAccountRegistry {
    devices: HashMap<String, HashSet<String>>,
}

impl StaticAccountRegistry {
    #[must_use]
    pub fn new(devices: HashMap<String, HashSet<String>>) -> Self {
        Self { devices }
    }

    /// Parse `account:public_id` lines; `#` starts a comment.
    pub fn from_lines(text: &str) -> Result<Self> {
        let mut devices: HashMap<String, HashSet<String>> = HashMap::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((account, public_id)) = line.split_once(':') else {
                bail!("malformed device account entry on line {}", index + 1);
            };
            let account = account.trim();
            let public_id = public_id.trim();
            if account.is_empty() || public_id.is_empty() {
                bail!("malformed device account entry on line {}", index + 1);
            }
            devices
                .entry(account.to_string())
                .or_default()
                .insert(public_id.to_string());
        }
        Ok(Self { devices })
    }
}

impl AccountRegistry for StaticAccountRegistry {
    fn is_registered(&self, uid: &str, public_id: &str) -> bool {
        self.devices
            .get(uid)
            .is_some_and(|ids| ids.contains(public_id))
    }
}

/// Proof token required to build [`AcceptAllAccountRegistry`].
///
/// The only constructor spells out what the caller is opting into, and the
/// server assembly path never creates one, so the accept-all registry cannot
/// be reached through production configuration.
pub struct NonProductionGuard(());

impl NonProductionGuard {
    #[must_use]
    pub fn i_accept_every_device_is_authorized() -> Self {
        Self(())
    }
}

/// Registry that considers every device registered for every account.
/// Usable only in tests and demos; see [`NonProductionGuard`].
pub struct AcceptAllAccountRegistry {
    _guard: NonProductionGuard,
}

impl AcceptAllAccountRegistry {
    #[must_use]
    pub fn new(guard: NonProductionGuard) -> Self {
        Self { _guard: guard }
    }
}

impl AccountRegistry for AcceptAllAccountRegistry {
    fn is_registered(&self, _uid: &str, _public_id: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_registry_parses_lines_and_comments() {
        let registry = StaticAccountRegistry::from_lines(
            "# devices\nalice:ccccccbchvth\n\nbob:ccccccdhgrkn\nalice:ccccccbcjedn\n",
        )
        .expect("parse");
        assert!(registry.is_registered("alice", "ccccccbchvth"));
        assert!(registry.is_registered("alice", "ccccccbcjedn"));
        assert!(registry.is_registered("bob", "ccccccdhgrkn"));
        assert!(!registry.is_registered("bob", "ccccccbchvth"));
        assert!(!registry.is_registered("carol", "ccccccbchvth"));
    }

    #[test]
    fn static_registry_rejects_malformed_lines() {
        assert!(StaticAccountRegistry::from_lines("alice").is_err());
        assert!(StaticAccountRegistry::from_lines("alice:").is_err());
        assert!(StaticAccountRegistry::from_lines(":ccccccbchvth").is_err());
    }

    #[test]
    fn accept_all_requires_explicit_guard() {
        let registry =
            AcceptAllAccountRegistry::new(NonProductionGuard::i_accept_every_device_is_authorized());
        assert!(registry.is_registered("anyone", "anything"));
    }
}
