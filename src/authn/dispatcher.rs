//! Ordered authentication dispatch.
//!
//! Pairs run strictly sequentially in configuration order. Sequential
//! execution is what makes first-success short-circuiting deterministic and
//! keeps a single credential from triggering duplicate side effects against
//! shared external systems.

use std::sync::Arc;

use tracing::{debug, warn};

use super::error::{AuthnError, HandlerFailure};
use super::handlers::AuthenticationHandler;
use super::principal::{Principal, PrincipalResolver};
use super::{Credential, HandlerOutcome};

/// One configured handler with its paired resolver.
pub struct AuthnPair {
    pub handler: Arc<dyn AuthenticationHandler>,
    pub resolver: Arc<dyn PrincipalResolver>,
}

impl AuthnPair {
    #[must_use]
    pub fn new(handler: Arc<dyn AuthenticationHandler>, resolver: Arc<dyn PrincipalResolver>) -> Self {
        Self { handler, resolver }
    }
}

/// A successful authentication: the resolved principal and which handler
/// produced it.
#[derive(Clone, Debug)]
pub struct Authentication {
    pub principal: Principal,
    pub handler: String,
}

/// Tries configured (handler, resolver) pairs in priority order and returns
/// the first success, or the aggregated failure.
pub struct AuthenticationDispatcher {
    pairs: Vec<AuthnPair>,
}

impl AuthenticationDispatcher {
    #[must_use]
    pub fn new(pairs: Vec<AuthnPair>) -> Self {
        Self { pairs }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Authenticate one credential.
    ///
    /// Only handlers whose `supports` accepts the credential kind are
    /// invoked. The first success stops the chain; every failure before that
    /// is recorded with its handler identity and whether it was prevented.
    pub async fn authenticate(&self, credential: &Credential) -> Result<Authentication, AuthnError> {
        let mut attempts: Vec<HandlerFailure> = Vec::new();
        let mut supported = false;

        for pair in &self.pairs {
            if !pair.handler.supports(credential) {
                continue;
            }
            supported = true;
            let handler = pair.handler.name();

            match pair.handler.authenticate(credential).await {
                HandlerOutcome::Success => {
                    let Some(principal) = pair.resolver.resolve(credential) else {
                        warn!(handler, "handler succeeded but resolver produced no principal");
                        return Err(AuthnError::PrincipalUnresolved {
                            handler: handler.to_string(),
                        });
                    };
                    debug!(handler, principal = %principal.id, "authentication succeeded");
                    return Ok(Authentication {
                        principal,
                        handler: handler.to_string(),
                    });
                }
                HandlerOutcome::HandledFailure { reason } => {
                    debug!(handler, reason = %reason, "handler rejected credential");
                    attempts.push(HandlerFailure {
                        handler: handler.to_string(),
                        reason,
                        prevented: false,
                    });
                }
                HandlerOutcome::Prevented { reason } => {
                    warn!(handler, reason = %reason, "handler prevented from authenticating");
                    attempts.push(HandlerFailure {
                        handler: handler.to_string(),
                        reason,
                        prevented: true,
                    });
                }
            }
        }

        if !supported {
            return Err(AuthnError::UnsupportedCredentials {
                kind: credential.kind(),
            });
        }
        Err(AuthnError::Failed { attempts })
    }
}
