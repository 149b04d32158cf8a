use thiserror::Error;

/// Failure taxonomy for ticket lookup, issuance, and validation.
///
/// Validation callers get the precise reason (`NotFound` vs `Expired` vs
/// `AlreadyConsumed` vs `ServiceMismatch`) so audits can tell a replayed
/// ticket from a stale one.
#[derive(Debug, Error)]
pub enum TicketError {
    #[error("ticket not found")]
    NotFound,
    #[error("ticket expired")]
    Expired,
    #[error("ticket already consumed")]
    AlreadyConsumed,
    #[error("ticket is bound to a different service")]
    ServiceMismatch,
    #[error("ticket id already exists")]
    Collision,
    #[error("service is not registered: {0}")]
    ServiceNotRegistered(String),
    #[error("ticket store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("ticket id generation failed")]
    IdGeneration(#[source] rand::Error),
}

impl TicketError {
    /// Stable machine-readable code used in validation failure payloads.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "TICKET_NOT_FOUND",
            Self::Expired => "TICKET_EXPIRED",
            Self::AlreadyConsumed => "TICKET_ALREADY_CONSUMED",
            Self::ServiceMismatch => "SERVICE_MISMATCH",
            Self::Collision => "TICKET_COLLISION",
            Self::ServiceNotRegistered(_) => "SERVICE_NOT_REGISTERED",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::IdGeneration(_) => "ID_GENERATION",
        }
    }
}
