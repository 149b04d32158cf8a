//! Directory bind: one LDAP simple bind per attempt.
//!
//! Bind rejections and directory-side errors are handled failures with a
//! single shared reason, so the trace never reveals whether the identity
//! exists. Only connectivity and timeout problems surface as prevented.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings};
use secrecy::ExposeSecret;
use tracing::debug;

use super::AuthenticationHandler;
use crate::authn::{Credential, HandlerOutcome};

const REJECT_REASON: &str = "directory rejected the credentials";

/// Placeholder in the bind-DN template replaced with the account id.
const USER_PLACEHOLDER: &str = "{user}";

/// What the directory said, given that it answered at all.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BindOutcome {
    Bound,
    Rejected,
}

/// A single simple bind. `Err` means the directory was unreachable; every
/// in-protocol failure is `Rejected`.
#[async_trait]
pub trait DirectoryBinder: Send + Sync {
    async fn simple_bind(&self, bind_dn: &str, password: &str) -> Result<BindOutcome>;
}

/// Binder over a real LDAP endpoint.
pub struct LdapDirectoryBinder {
    url: String,
    conn_timeout: Duration,
}

impl LdapDirectoryBinder {
    #[must_use]
    pub fn new(url: String, conn_timeout: Duration) -> Self {
        Self { url, conn_timeout }
    }
}

#[async_trait]
impl DirectoryBinder for LdapDirectoryBinder {
    async fn simple_bind(&self, bind_dn: &str, password: &str) -> Result<BindOutcome> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.conn_timeout);
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.url)
            .await
            .context("failed to reach directory")?;
        ldap3::drive!(conn);

        let outcome = match ldap.simple_bind(bind_dn, password).await {
            Ok(result) if result.rc == 0 => BindOutcome::Bound,
            Ok(result) => {
                debug!(rc = result.rc, "directory refused bind");
                BindOutcome::Rejected
            }
            // The connection was answered; an errored bind operation counts
            // as a rejection, not an outage.
            Err(err) => {
                debug!(error = %err, "directory bind operation failed");
                BindOutcome::Rejected
            }
        };
        let _ = ldap.unbind().await;
        Ok(outcome)
    }
}

/// Handler that authenticates username/password credentials by binding as
/// the user against the configured directory.
pub struct DirectoryBindHandler {
    binder: Arc<dyn DirectoryBinder>,
    bind_dn_template: String,
    timeout: Duration,
}

impl DirectoryBindHandler {
    /// `bind_dn_template` must contain `{user}`, e.g.
    /// `uid={user},ou=people,dc=example,dc=org`.
    pub fn new(
        binder: Arc<dyn DirectoryBinder>,
        bind_dn_template: String,
        timeout: Duration,
    ) -> Result<Self> {
        ensure!(
            bind_dn_template.contains(USER_PLACEHOLDER),
            "bind DN template must contain {USER_PLACEHOLDER}"
        );
        Ok(Self {
            binder,
            bind_dn_template,
            timeout,
        })
    }

    /// Compose the bind DN. Usernames outside a conservative character set
    /// are refused outright, which keeps DN injection impossible without an
    /// escaping pass.
    fn bind_dn(&self, username: &str) -> Option<String> {
        if username.is_empty()
            || !username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@'))
        {
            return None;
        }
        Some(self.bind_dn_template.replace(USER_PLACEHOLDER, username))
    }
}

#[async_trait]
impl AuthenticationHandler for DirectoryBindHandler {
    fn name(&self) -> &'static str {
        "directory-bind"
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

        let Some(bind_dn) = self.bind_dn(username) else {
            return HandlerOutcome::HandledFailure {
                reason: REJECT_REASON.to_string(),
            };
        };

        let bind = self.binder.simple_bind(&bind_dn, password.expose_secret());
        match tokio::time::timeout(self.timeout, bind).await {
            Err(_) => HandlerOutcome::Prevented {
                reason: "directory bind timed out".to_string(),
            },
            Ok(Err(err)) => HandlerOutcome::Prevented {
                reason: format!("directory unreachable: {err}"),
            },
            Ok(Ok(BindOutcome::Bound)) => HandlerOutcome::Success,
            Ok(Ok(BindOutcome::Rejected)) => HandlerOutcome::HandledFailure {
                reason: REJECT_REASON.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Bound,
        Rejected,
        Unreachable,
        Hang,
    }

    struct FakeBinder {
        behavior: Behavior,
        calls: AtomicUsize,
        last_dn: std::sync::Mutex<Option<String>>,
    }

    impl FakeBinder {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                calls: AtomicUsize::new(0),
                last_dn: std::sync::Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl DirectoryBinder for FakeBinder {
        async fn simple_bind(&self, bind_dn: &str, _password: &str) -> Result<BindOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_dn.lock().expect("lock") = Some(bind_dn.to_string());
            match self.behavior {
                Behavior::Bound => Ok(BindOutcome::Bound),
                Behavior::Rejected => Ok(BindOutcome::Rejected),
                Behavior::Unreachable => Err(anyhow!("connection refused")),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(BindOutcome::Bound)
                }
            }
        }
    }

    fn handler(binder: Arc<FakeBinder>) -> DirectoryBindHandler {
        DirectoryBindHandler::new(
            binder,
            "uid={user},ou=people,dc=example,dc=org".to_string(),
            Duration::from_millis(50),
        )
        .expect("handler")
    }

    fn credential(username: &str) -> Credential {
        Credential::UsernamePassword {
            username: username.to_string(),
            password: SecretString::from("hunter2".to_string()),
        }
    }

    #[tokio::test]
    async fn bound_is_success_with_expanded_dn() {
        let binder = Arc::new(FakeBinder::new(Behavior::Bound));
        let outcome = handler(Arc::clone(&binder))
            .authenticate(&credential("alice"))
            .await;
        assert!(matches!(outcome, HandlerOutcome::Success));
        assert_eq!(
            binder.last_dn.lock().expect("lock").as_deref(),
            Some("uid=alice,ou=people,dc=example,dc=org")
        );
    }

    #[tokio::test]
    async fn rejection_is_handled_failure() {
        let binder = Arc::new(FakeBinder::new(Behavior::Rejected));
        let outcome = handler(binder).authenticate(&credential("alice")).await;
        assert!(matches!(outcome, HandlerOutcome::HandledFailure { .. }));
    }

    #[tokio::test]
    async fn unreachable_directory_is_prevented() {
        let binder = Arc::new(FakeBinder::new(Behavior::Unreachable));
        let outcome = handler(binder).authenticate(&credential("alice")).await;
        assert!(matches!(outcome, HandlerOutcome::Prevented { .. }));
    }

    #[tokio::test]
    async fn slow_directory_is_prevented_by_timeout() {
        let binder = Arc::new(FakeBinder::new(Behavior::Hang));
        let outcome = handler(binder).authenticate(&credential("alice")).await;
        assert!(matches!(outcome, HandlerOutcome::Prevented { .. }));
    }

    #[tokio::test]
    async fn hostile_username_never_reaches_the_directory() {
        let binder = Arc::new(FakeBinder::new(Behavior::Bound));
        let outcome = handler(Arc::clone(&binder))
            .authenticate(&credential("alice,ou=admins"))
            .await;
        assert!(matches!(outcome, HandlerOutcome::HandledFailure { .. }));
        assert_eq!(binder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn template_without_placeholder_is_refused() {
        let binder: Arc<dyn DirectoryBinder> = Arc::new(FakeBinder::new(Behavior::Bound));
        assert!(DirectoryBindHandler::new(
            binder,
            "uid=fixed,ou=people".to_string(),
            Duration::from_secs(1),
        )
        .is_err());
    }
}
