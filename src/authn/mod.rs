//! Authentication dispatch: credential kinds, handler outcomes, and the
//! ordered handler/resolver chain.
//!
//! Handlers never return raw transport errors. Every attempt collapses into
//! one of three terminal outcomes, and the dispatcher aggregates them so the
//! caller can tell bad credentials apart from an unreachable backend.

pub mod account;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod principal;

pub use dispatcher::{Authentication, AuthenticationDispatcher, AuthnPair};
pub use error::{AuthnError, HandlerFailure};

use secrecy::SecretString;

/// A credential as presented by the caller. Secret material is wrapped so it
/// never shows up in logs or debug output.
#[derive(Clone, Debug)]
pub enum Credential {
    UsernamePassword {
        username: String,
        password: SecretString,
    },
    OneTimePassword {
        username: String,
        token: SecretString,
    },
    DelegatedAssertion {
        assertion: SecretString,
    },
}

impl Credential {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UsernamePassword { .. } => "username_password",
            Self::OneTimePassword { .. } => "one_time_password",
            Self::DelegatedAssertion { .. } => "delegated_assertion",
        }
    }

    /// The account identifier carried by the credential, where one exists.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::UsernamePassword { username, .. } | Self::OneTimePassword { username, .. } => {
                Some(username)
            }
            Self::DelegatedAssertion { .. } => None,
        }
    }
}

/// Terminal classification of a single handler invocation.
///
/// `HandledFailure` means the backend answered and said no;
/// `Prevented` means the backend could not be asked (unreachable, timeout).
#[derive(Clone, Debug)]
pub enum HandlerOutcome {
    Success,
    HandledFailure { reason: String },
    Prevented { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_kind_names() {
        let credential = Credential::UsernamePassword {
            username: "alice".to_string(),
            password: SecretString::from("hunter2".to_string()),
        };
        assert_eq!(credential.kind(), "username_password");
        assert_eq!(credential.username(), Some("alice"));

        let credential = Credential::DelegatedAssertion {
            assertion: SecretString::from("alice:blob".to_string()),
        };
        assert_eq!(credential.kind(), "delegated_assertion");
        assert_eq!(credential.username(), None);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let credential = Credential::UsernamePassword {
            username: "alice".to_string(),
            password: SecretString::from("hunter2".to_string()),
        };
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("alice"));
    }
}
