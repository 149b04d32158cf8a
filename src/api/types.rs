//! Request/response types for the SSO endpoints.

use std::collections::HashMap;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::authn::error::{AuthnError, HandlerFailure};
use crate::authn::Credential;

/// Credential as posted by a client, tagged by kind.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialPayload {
    Password { username: String, password: String },
    Otp { username: String, token: String },
    Delegated { assertion: String },
}

impl CredentialPayload {
    /// Wrap the secret material before it travels any further.
    #[must_use]
    pub fn into_credential(self) -> Credential {
        match self {
            Self::Password { username, password } => Credential::UsernamePassword {
                username,
                password: SecretString::from(password),
            },
            Self::Otp { username, token } => Credential::OneTimePassword {
                username,
                token: SecretString::from(token),
            },
            Self::Delegated { assertion } => Credential::DelegatedAssertion {
                assertion: SecretString::from(assertion),
            },
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub ticket: String,
    /// Which handler produced the authentication.
    pub handler: String,
    pub expires_at: u64,
}

/// One failed handler attempt, as reported to the caller.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AttemptReport {
    pub handler: String,
    pub reason: String,
    pub prevented: bool,
}

impl From<&HandlerFailure> for AttemptReport {
    fn from(failure: &HandlerFailure) -> Self {
        Self {
            handler: failure.handler.clone(),
            reason: failure.reason.clone(),
            prevented: failure.prevented,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginFailure {
    pub error: String,
    pub attempts: Vec<AttemptReport>,
}

impl From<&AuthnError> for LoginFailure {
    fn from(err: &AuthnError) -> Self {
        let attempts = match err {
            AuthnError::Failed { attempts } => attempts.iter().map(AttemptReport::from).collect(),
            _ => Vec::new(),
        };
        Self {
            error: err.to_string(),
            attempts,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ServiceTicketRequest {
    pub service: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ServiceTicketResponse {
    pub ticket: String,
    pub expires_at: u64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ValidateRequest {
    pub ticket: String,
    pub service: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ValidateResponse {
    pub principal: String,
    pub attributes: HashMap<String, Vec<String>>,
}

/// Machine-readable validation failure: stable code plus description.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ValidationFailure {
    pub code: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn credential_payload_round_trips_tagged() -> Result<()> {
        let value = serde_json::json!({
            "kind": "password",
            "username": "alice",
            "password": "hunter2",
        });
        let payload: CredentialPayload = serde_json::from_value(value)?;
        let credential = payload.into_credential();
        assert_eq!(credential.kind(), "username_password");
        assert_eq!(credential.username(), Some("alice"));
        Ok(())
    }

    #[test]
    fn otp_payload_converts_to_one_time_password() -> Result<()> {
        let value = serde_json::json!({
            "kind": "otp",
            "username": "alice",
            "token": "cccccc",
        });
        let payload: CredentialPayload = serde_json::from_value(value)?;
        assert_eq!(payload.into_credential().kind(), "one_time_password");
        Ok(())
    }

    #[test]
    fn validation_failure_serializes_code_and_description() -> Result<()> {
        let failure = ValidationFailure {
            code: "TICKET_EXPIRED".to_string(),
            description: "ticket expired".to_string(),
        };
        let value = serde_json::to_value(&failure)?;
        let code = value
            .get("code")
            .and_then(serde_json::Value::as_str)
            .context("missing code")?;
        assert_eq!(code, "TICKET_EXPIRED");
        Ok(())
    }

    #[test]
    fn login_failure_carries_attempts() {
        let err = AuthnError::Failed {
            attempts: vec![HandlerFailure {
                handler: "directory-bind".to_string(),
                reason: "directory bind timed out".to_string(),
                prevented: true,
            }],
        };
        let failure = LoginFailure::from(&err);
        assert_eq!(failure.attempts.len(), 1);
        assert!(failure.attempts[0].prevented);
        assert!(failure.error.contains("directory-bind"));
    }

    #[test]
    fn unsupported_kind_has_empty_attempts() {
        let err = AuthnError::UnsupportedCredentials { kind: "delegated" };
        let failure = LoginFailure::from(&err);
        assert!(failure.attempts.is_empty());
    }
}
