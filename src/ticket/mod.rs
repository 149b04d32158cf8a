//! Ticket data model and lifetime policy.
//!
//! Two kinds of tickets exist: granting tickets (`TGT-…`) that represent an
//! established sign-on session, and service tickets (`ST-…`) that are
//! exchanged once for access to a single service. The registry in
//! [`registry`] is the sole owner of ticket state; everything here is plain
//! data.

pub mod error;
pub mod registry;
pub mod sweep;

pub use error::TicketError;
pub use registry::{ConsumeAttempt, InMemoryTicketStore, TicketRegistry, TicketStore};

use std::time::{Duration, SystemTime};

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::authn::principal::Principal;

const DEFAULT_GRANTING_LIFETIME_SECONDS: u64 = 8 * 60 * 60;
const DEFAULT_GRANTING_IDLE_TIMEOUT_SECONDS: u64 = 2 * 60 * 60;
const DEFAULT_SERVICE_LIFETIME_SECONDS: u64 = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    Granting,
    Service,
}

impl TicketKind {
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Granting => "TGT",
            Self::Service => "ST",
        }
    }
}

/// Per-kind lifetime policy, assembled once at startup.
#[derive(Clone, Copy, Debug)]
pub struct TicketPolicy {
    granting_lifetime: Duration,
    granting_idle_timeout: Duration,
    service_lifetime: Duration,
}

impl Default for TicketPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            granting_lifetime: Duration::from_secs(DEFAULT_GRANTING_LIFETIME_SECONDS),
            granting_idle_timeout: Duration::from_secs(DEFAULT_GRANTING_IDLE_TIMEOUT_SECONDS),
            service_lifetime: Duration::from_secs(DEFAULT_SERVICE_LIFETIME_SECONDS),
        }
    }

    #[must_use]
    pub fn with_granting_lifetime(mut self, lifetime: Duration) -> Self {
        self.granting_lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn with_granting_idle_timeout(mut self, idle: Duration) -> Self {
        self.granting_idle_timeout = idle;
        self
    }

    #[must_use]
    pub fn with_service_lifetime(mut self, lifetime: Duration) -> Self {
        self.service_lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn granting_lifetime(&self) -> Duration {
        self.granting_lifetime
    }

    #[must_use]
    pub fn granting_idle_timeout(&self) -> Duration {
        self.granting_idle_timeout
    }

    #[must_use]
    pub fn service_lifetime(&self) -> Duration {
        self.service_lifetime
    }
}

/// Immutable identity plus mutable lifecycle state of one ticket.
///
/// Granting tickets carry the resolved principal; service tickets carry the
/// parent granting ticket id, the service they were issued to, and the
/// one-time `consumed` flag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub kind: TicketKind,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
    pub last_used_at: SystemTime,
    pub idle_timeout: Option<Duration>,
    pub parent_id: Option<String>,
    pub service: Option<String>,
    pub principal: Option<Principal>,
    pub consumed: bool,
}

impl Ticket {
    /// Build a granting ticket for an authenticated principal.
    #[must_use]
    pub fn granting(id: String, principal: Principal, now: SystemTime, policy: &TicketPolicy) -> Self {
        Self {
            id,
            kind: TicketKind::Granting,
            created_at: now,
            expires_at: now + policy.granting_lifetime(),
            last_used_at: now,
            idle_timeout: Some(policy.granting_idle_timeout()),
            parent_id: None,
            service: None,
            principal: Some(principal),
            consumed: false,
        }
    }

    /// Build a service ticket chained to an unexpired granting ticket.
    #[must_use]
    pub fn service(
        id: String,
        parent: &Ticket,
        service: String,
        now: SystemTime,
        policy: &TicketPolicy,
    ) -> Self {
        Self {
            id,
            kind: TicketKind::Service,
            created_at: now,
            expires_at: now + policy.service_lifetime(),
            last_used_at: now,
            idle_timeout: None,
            parent_id: Some(parent.id.clone()),
            service: Some(service),
            principal: None,
            consumed: false,
        }
    }

    /// Wall-clock expiry check; both the absolute lifetime and the sliding
    /// idle window terminate the ticket, whichever passes first.
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        if now >= self.expires_at {
            return true;
        }
        match self.idle_timeout {
            Some(idle) => now >= self.last_used_at + idle,
            None => false,
        }
    }
}

/// Mint a new ticket id: kind prefix plus 256 bits of OS randomness.
///
/// Uniqueness is only verified by the registry's put-if-absent insert; the
/// caller regenerates on collision.
pub fn generate_ticket_id(kind: TicketKind) -> Result<String, TicketError> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(TicketError::IdGeneration)?;
    Ok(format!(
        "{}-{}",
        kind.prefix(),
        Base64UrlUnpadded::encode_string(&bytes)
    ))
}
