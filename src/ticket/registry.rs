//! Ticket registry and its backing-store contract.
//!
//! The [`TicketStore`] trait is the only point of cross-node shared mutable
//! state. Every mutation the registry needs is a single atomic store
//! operation (put-if-absent, remove, mark-consumed, touch), so overlapping
//! sweeps and concurrent validators are safe without coordination. The
//! bundled [`InMemoryTicketStore`] backs a single node; a distributed
//! key-value grid can implement the same contract for a cluster.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::{generate_ticket_id, Ticket, TicketError, TicketKind, TicketPolicy};
use crate::authn::principal::Principal;

/// Attempts to generate a non-colliding ticket id before giving up.
///
/// Collisions are cryptographically improbable; the retry loop is the only
/// automatic retry in the system.
const MAX_ID_ATTEMPTS: usize = 3;

/// Outcome of an atomic consume attempt on a service ticket.
#[derive(Clone, Debug)]
pub enum ConsumeAttempt {
    /// This caller won; the returned snapshot has `consumed` set.
    Consumed(Ticket),
    /// Another caller consumed the ticket first.
    AlreadyConsumed,
    /// No entry under that id.
    Missing,
}

/// Backing store contract: a concurrent map with atomic per-entry updates.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Atomic put-if-absent. `Err(Collision)` when the id already exists;
    /// the existing entry is never overwritten.
    async fn put_if_absent(&self, ticket: Ticket) -> Result<(), TicketError>;

    /// Plain read; expiry is the caller's concern.
    async fn get(&self, id: &str) -> Result<Option<Ticket>, TicketError>;

    /// Atomic remove. `Ok(Some)` only for the caller that actually removed
    /// the entry, which makes deletion idempotent and race-free.
    async fn remove(&self, id: &str) -> Result<Option<Ticket>, TicketError>;

    /// Atomically flip the consumed flag; exactly one caller ever observes
    /// [`ConsumeAttempt::Consumed`] for a given entry.
    async fn mark_consumed(&self, id: &str) -> Result<ConsumeAttempt, TicketError>;

    /// Renew the sliding idle window. Returns whether the entry existed.
    async fn touch(&self, id: &str, now: SystemTime) -> Result<bool, TicketError>;

    /// Drop entries expired at `now`; returns how many were evicted.
    async fn evict_expired(&self, now: SystemTime) -> Result<usize, TicketError>;
}

/// Single-node store over a concurrent hash map.
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    entries: DashMap<String, Ticket>,
}

impl InMemoryTicketStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn put_if_absent(&self, ticket: Ticket) -> Result<(), TicketError> {
        match self.entries.entry(ticket.id.clone()) {
            Entry::Occupied(_) => Err(TicketError::Collision),
            Entry::Vacant(slot) => {
                slot.insert(ticket);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Ticket>, TicketError> {
        Ok(self.entries.get(id).map(|entry| entry.value().clone()))
    }

    async fn remove(&self, id: &str) -> Result<Option<Ticket>, TicketError> {
        Ok(self.entries.remove(id).map(|(_, ticket)| ticket))
    }

    async fn mark_consumed(&self, id: &str) -> Result<ConsumeAttempt, TicketError> {
        match self.entries.get_mut(id) {
            None => Ok(ConsumeAttempt::Missing),
            Some(mut entry) => {
                if entry.consumed {
                    Ok(ConsumeAttempt::AlreadyConsumed)
                } else {
                    entry.consumed = true;
                    Ok(ConsumeAttempt::Consumed(entry.value().clone()))
                }
            }
        }
    }

    async fn touch(&self, id: &str, now: SystemTime) -> Result<bool, TicketError> {
        match self.entries.get_mut(id) {
            None => Ok(false),
            Some(mut entry) => {
                entry.last_used_at = now;
                Ok(true)
            }
        }
    }

    async fn evict_expired(&self, now: SystemTime) -> Result<usize, TicketError> {
        let mut evicted = 0;
        self.entries.retain(|_, ticket| {
            if ticket.is_expired(now) {
                evicted += 1;
                false
            } else {
                true
            }
        });
        Ok(evicted)
    }
}

/// The sole owner of ticket state.
///
/// Issues granting tickets after authentication, chains service tickets to
/// them, and validates service tickets exactly once.
pub struct TicketRegistry {
    store: Arc<dyn TicketStore>,
    policy: TicketPolicy,
    services: Vec<String>,
}

impl TicketRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn TicketStore>, policy: TicketPolicy, services: Vec<String>) -> Self {
        Self {
            store,
            policy,
            services,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &TicketPolicy {
        &self.policy
    }

    /// Mint and store a granting ticket for an authenticated principal.
    pub async fn issue_granting_ticket(&self, principal: Principal) -> Result<Ticket, TicketError> {
        let now = SystemTime::now();
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = generate_ticket_id(TicketKind::Granting)?;
            let ticket = Ticket::granting(id, principal.clone(), now, &self.policy);
            match self.store.put_if_absent(ticket.clone()).await {
                Ok(()) => return Ok(ticket),
                Err(TicketError::Collision) => {}
                Err(err) => return Err(err),
            }
        }
        Err(TicketError::Collision)
    }

    /// Mint a service ticket chained to an unexpired granting ticket and
    /// renew the granting ticket's idle window.
    pub async fn grant_service_ticket(
        &self,
        granting_id: &str,
        service: &str,
    ) -> Result<Ticket, TicketError> {
        if !self.services.iter().any(|rule| rule == service) {
            return Err(TicketError::ServiceNotRegistered(service.to_string()));
        }

        let now = SystemTime::now();
        let parent = self.get_ticket(granting_id, TicketKind::Granting).await?;

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = generate_ticket_id(TicketKind::Service)?;
            let ticket = Ticket::service(id, &parent, service.to_string(), now, &self.policy);
            match self.store.put_if_absent(ticket.clone()).await {
                Ok(()) => {
                    // Successful issuance renews the sign-on session's idle
                    // window. The parent may have been destroyed concurrently;
                    // the touch is best effort.
                    if !self.store.touch(granting_id, now).await? {
                        debug!(ticket = granting_id, "granting ticket vanished before touch");
                    }
                    return Ok(ticket);
                }
                Err(TicketError::Collision) => {}
                Err(err) => return Err(err),
            }
        }
        Err(TicketError::Collision)
    }

    /// Fetch a ticket of the expected kind, applying the lazy expiry check
    /// every read performs. Expired entries are dropped on sight; the sweep
    /// is only a backstop.
    pub async fn get_ticket(&self, id: &str, kind: TicketKind) -> Result<Ticket, TicketError> {
        let ticket = self.store.get(id).await?.ok_or(TicketError::NotFound)?;
        if ticket.kind != kind {
            return Err(TicketError::NotFound);
        }
        if ticket.is_expired(SystemTime::now()) {
            let _ = self.store.remove(id).await?;
            return Err(TicketError::Expired);
        }
        Ok(ticket)
    }

    /// Validate and consume a service ticket, returning the principal behind
    /// the parent granting ticket.
    ///
    /// Exactly one concurrent caller succeeds for a given ticket; the rest
    /// observe `AlreadyConsumed` or `NotFound`. The service comparison is an
    /// exact, case-sensitive string match.
    pub async fn validate_service_ticket(
        &self,
        id: &str,
        service: &str,
    ) -> Result<Principal, TicketError> {
        let now = SystemTime::now();
        let ticket = self.store.get(id).await?.ok_or(TicketError::NotFound)?;
        if ticket.kind != TicketKind::Service {
            return Err(TicketError::NotFound);
        }
        if ticket.is_expired(now) {
            let _ = self.store.remove(id).await?;
            return Err(TicketError::Expired);
        }
        if ticket.consumed {
            return Err(TicketError::AlreadyConsumed);
        }
        if ticket.service.as_deref() != Some(service) {
            // A validation attempt spends the ticket even when the service
            // does not match; later validators see AlreadyConsumed.
            let _ = self.store.mark_consumed(id).await?;
            return Err(TicketError::ServiceMismatch);
        }

        let winner = match self.store.mark_consumed(id).await? {
            ConsumeAttempt::Consumed(ticket) => ticket,
            ConsumeAttempt::AlreadyConsumed => return Err(TicketError::AlreadyConsumed),
            ConsumeAttempt::Missing => return Err(TicketError::NotFound),
        };
        if winner.is_expired(SystemTime::now()) {
            let _ = self.store.remove(id).await?;
            return Err(TicketError::Expired);
        }

        let parent_id = winner.parent_id.as_deref().ok_or(TicketError::Expired)?;
        let parent = match self.get_ticket(parent_id, TicketKind::Granting).await {
            Ok(parent) => parent,
            // The sign-on session ended between issuance and validation.
            Err(TicketError::NotFound | TicketError::Expired) => return Err(TicketError::Expired),
            Err(err) => return Err(err),
        };
        parent.principal.ok_or(TicketError::Expired)
    }

    /// Destroy a granting ticket (logout). Idempotent: returns whether an
    /// entry was actually removed.
    pub async fn destroy_granting_ticket(&self, id: &str) -> Result<bool, TicketError> {
        Ok(self.store.remove(id).await?.is_some())
    }

    /// One eviction pass over the backing store.
    pub async fn evict_expired(&self, now: SystemTime) -> Result<usize, TicketError> {
        self.store.evict_expired(now).await
    }
}
