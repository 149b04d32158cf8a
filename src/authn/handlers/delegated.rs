//! Delegated authentication: a single remote call validates an externally
//! issued assertion token.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::json;
use url::Url;

use super::AuthenticationHandler;
use crate::authn::{Credential, HandlerOutcome};

/// `Ok(true)` accepted, `Ok(false)` rejected, `Err` when the validator could
/// not be asked.
#[async_trait]
pub trait AssertionValidator: Send + Sync {
    async fn validate(&self, assertion: &str) -> Result<bool>;
}

/// Validator posting the assertion to a remote endpoint.
pub struct HttpAssertionValidator {
    http: reqwest::Client,
    validate_url: Url,
}

impl HttpAssertionValidator {
    pub fn new(validate_url: Url, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build assertion validator client")?;
        Ok(Self { http, validate_url })
    }
}

#[async_trait]
impl AssertionValidator for HttpAssertionValidator {
    async fn validate(&self, assertion: &str) -> Result<bool> {
        let response = self
            .http
            .post(self.validate_url.clone())
            .json(&json!({ "assertion": assertion }))
            .send()
            .await
            .context("failed to call assertion validator")?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status.is_client_error() {
            Ok(false)
        } else {
            bail!("assertion validator returned {status}");
        }
    }
}

/// Handler for assertions issued by an external identity provider.
pub struct DelegatedRemoteHandler {
    validator: Arc<dyn AssertionValidator>,
}

impl DelegatedRemoteHandler {
    #[must_use]
    pub fn new(validator: Arc<dyn AssertionValidator>) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl AuthenticationHandler for DelegatedRemoteHandler {
    fn name(&self) -> &'static str {
        "delegated-remote"
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::DelegatedAssertion { .. })
    }

    async fn authenticate(&self, credential: &Credential) -> HandlerOutcome {
        let Credential::DelegatedAssertion { assertion } = credential else {
            return HandlerOutcome::HandledFailure {
                reason: format!("credential kind {} not supported", credential.kind()),
            };
        };

        match self.validator.validate(assertion.expose_secret()).await {
            Err(err) => HandlerOutcome::Prevented {
                reason: format!("assertion validator unreachable: {err}"),
            },
            Ok(true) => HandlerOutcome::Success,
            Ok(false) => HandlerOutcome::HandledFailure {
                reason: "assertion rejected by remote validator".to_string(),
            },
        }
    }
}
