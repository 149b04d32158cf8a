//! One-time-password device handler (YubiKey-style tokens).
//!
//! Two gates run before any network traffic: the modhex format check and the
//! device account registry lookup. Only a well-formed token from a registered
//! device triggers the single remote verification call.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::debug;
use ulid::Ulid;
use url::Url;

use super::AuthenticationHandler;
use crate::authn::account::AccountRegistry;
use crate::authn::{Credential, HandlerOutcome};

/// The modhex alphabet used by the device keyboard layer.
const MODHEX_ALPHABET: &str = "cbdefghijklnrtuv";

/// A token is the device public id (0–16 chars) followed by a 32-char
/// encrypted passcode.
const MIN_TOKEN_LENGTH: usize = 32;
const MAX_TOKEN_LENGTH: usize = 48;
const PASSCODE_LENGTH: usize = 32;

/// Fixed-length modhex check; anything else fails before any lookup.
#[must_use]
pub fn is_valid_token_format(token: &str) -> bool {
    (MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH).contains(&token.len())
        && token.chars().all(|c| MODHEX_ALPHABET.contains(c))
}

/// The device public id embedded in a well-formed token.
#[must_use]
pub fn public_device_id(token: &str) -> &str {
    &token[..token.len() - PASSCODE_LENGTH]
}

/// Verifier status values the handler understands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VerificationStatus {
    Ok,
    Replayed,
    BadOtp,
    BackendError,
    Unknown,
}

impl VerificationStatus {
    fn parse(raw: &str) -> Self {
        match raw {
            "OK" => Self::Ok,
            "REPLAYED_OTP" | "REPLAYED_REQUEST" => Self::Replayed,
            "BAD_OTP" => Self::BadOtp,
            "BACKEND_ERROR" | "NOT_ENOUGH_ANSWERS" => Self::BackendError,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Replayed => "REPLAYED",
            Self::BadOtp => "BAD_OTP",
            Self::BackendError => "BACKEND_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status plus the verifier's timestamp, when it sent one.
#[derive(Clone, Debug)]
pub struct VerificationResponse {
    pub status: VerificationStatus,
    pub timestamp: Option<String>,
}

/// The single remote verification call. `Err` means the verifier was
/// unreachable; any answered request yields a status.
#[async_trait]
pub trait OtpVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerificationResponse>;
}

/// Verifier over the cloud validation endpoint
/// (`GET …/verify?id=…&otp=…&nonce=…`, `key=value` response lines).
pub struct CloudOtpVerifier {
    http: reqwest::Client,
    verify_url: Url,
    client_id: String,
}

impl CloudOtpVerifier {
    pub fn new(verify_url: Url, client_id: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build OTP verifier client")?;
        Ok(Self {
            http,
            verify_url,
            client_id,
        })
    }
}

#[async_trait]
impl OtpVerifier for CloudOtpVerifier {
    async fn verify(&self, token: &str) -> Result<VerificationResponse> {
        let nonce = Ulid::new().to_string().to_lowercase();
        let response = self
            .http
            .get(self.verify_url.clone())
            .query(&[
                ("id", self.client_id.as_str()),
                ("otp", token),
                ("nonce", nonce.as_str()),
            ])
            .send()
            .await
            .context("failed to call OTP verifier")?;

        if !response.status().is_success() {
            bail!("OTP verifier returned {}", response.status());
        }
        let body = response
            .text()
            .await
            .context("failed to read OTP verifier response")?;
        Ok(parse_verification_response(&body))
    }
}

fn parse_verification_response(body: &str) -> VerificationResponse {
    let mut status = VerificationStatus::Unknown;
    let mut timestamp = None;
    for line in body.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key.trim() {
            "status" => status = VerificationStatus::parse(value.trim()),
            "t" => timestamp = Some(value.trim().to_string()),
            _ => {}
        }
    }
    VerificationResponse { status, timestamp }
}

/// Strong-factor handler gated by the device account registry.
pub struct OtpDeviceHandler {
    verifier: Arc<dyn OtpVerifier>,
    accounts: Arc<dyn AccountRegistry>,
}

impl OtpDeviceHandler {
    #[must_use]
    pub fn new(verifier: Arc<dyn OtpVerifier>, accounts: Arc<dyn AccountRegistry>) -> Self {
        Self { verifier, accounts }
    }
}

#[async_trait]
impl AuthenticationHandler for OtpDeviceHandler {
    fn name(&self) -> &'static str {
        "otp-device"
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::OneTimePassword { .. })
    }

    async fn authenticate(&self, credential: &Credential) -> HandlerOutcome {
        let Credential::OneTimePassword { username, token } = credential else {
            return HandlerOutcome::HandledFailure {
                reason: format!("credential kind {} not supported", credential.kind()),
            };
        };
        let token = token.expose_secret();

        if !is_valid_token_format(token) {
            debug!("one-time password has invalid format");
            return HandlerOutcome::HandledFailure {
                reason: "malformed one-time password".to_string(),
            };
        }

        let public_id = public_device_id(token);
        if !self.accounts.is_registered(username, public_id) {
            debug!(
                public_id,
                account = username.as_str(),
                "device is not registered for account"
            );
            return HandlerOutcome::HandledFailure {
                reason: "device is not registered for this account".to_string(),
            };
        }

        match self.verifier.verify(token).await {
            Err(err) => HandlerOutcome::Prevented {
                reason: format!("otp verifier unreachable: {err}"),
            },
            Ok(response) => {
                debug!(
                    status = %response.status,
                    timestamp = response.timestamp.as_deref().unwrap_or("-"),
                    "otp verifier answered"
                );
                if response.status == VerificationStatus::Ok {
                    HandlerOutcome::Success
                } else {
                    HandlerOutcome::HandledFailure {
                        reason: format!("otp rejected: {}", response.status),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authn::account::{
        AcceptAllAccountRegistry, NonProductionGuard, StaticAccountRegistry,
    };
    use anyhow::anyhow;
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // 12-char public id + 32-char passcode, all modhex.
    const WELL_FORMED: &str = "ccccccbchvthlivuitriujjifivbvtrjkjfirllhhtnc";
    const PUBLIC_ID: &str = "ccccccbchvth";

    struct FakeVerifier {
        status: VerificationStatus,
        unreachable: bool,
        calls: AtomicUsize,
    }

    impl FakeVerifier {
        fn answering(status: VerificationStatus) -> Self {
            Self {
                status,
                unreachable: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn unreachable() -> Self {
            Self {
                status: VerificationStatus::Unknown,
                unreachable: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OtpVerifier for FakeVerifier {
        async fn verify(&self, _token: &str) -> Result<VerificationResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                return Err(anyhow!("connection refused"));
            }
            Ok(VerificationResponse {
                status: self.status,
                timestamp: Some("2024-05-01T10:00:00Z".to_string()),
            })
        }
    }

    fn registry_with_device() -> Arc<StaticAccountRegistry> {
        Arc::new(
            StaticAccountRegistry::from_lines(&format!("alice:{PUBLIC_ID}")).expect("registry"),
        )
    }

    fn credential(username: &str, token: &str) -> Credential {
        Credential::OneTimePassword {
            username: username.to_string(),
            token: SecretString::from(token.to_string()),
        }
    }

    #[test]
    fn token_format_check() {
        assert!(is_valid_token_format(WELL_FORMED));
        assert!(!is_valid_token_format("abc"));
        assert!(!is_valid_token_format(""));
        // Right length, wrong alphabet ('a' is not modhex).
        assert!(!is_valid_token_format(&"a".repeat(44)));
        assert!(!is_valid_token_format(&"c".repeat(49)));
    }

    #[test]
    fn public_id_is_everything_before_the_passcode() {
        assert_eq!(public_device_id(WELL_FORMED), PUBLIC_ID);
        assert_eq!(public_device_id(&"c".repeat(32)), "");
    }

    #[test]
    fn parses_verifier_response_lines() {
        let response =
            parse_verification_response("h=sig=\r\nt=2024-05-01T10:00:00Z0123\r\nstatus=OK\r\n");
        assert_eq!(response.status, VerificationStatus::Ok);
        assert_eq!(
            response.timestamp.as_deref(),
            Some("2024-05-01T10:00:00Z0123")
        );

        let response = parse_verification_response("status=REPLAYED_OTP");
        assert_eq!(response.status, VerificationStatus::Replayed);

        let response = parse_verification_response("nonsense");
        assert_eq!(response.status, VerificationStatus::Unknown);
    }

    #[tokio::test]
    async fn malformed_token_makes_zero_remote_calls() {
        let verifier = Arc::new(FakeVerifier::answering(VerificationStatus::Ok));
        let handler = OtpDeviceHandler::new(Arc::clone(&verifier) as _, registry_with_device());
        let outcome = handler.authenticate(&credential("alice", "abc")).await;
        assert!(matches!(outcome, HandlerOutcome::HandledFailure { .. }));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unregistered_device_makes_zero_remote_calls() {
        let verifier = Arc::new(FakeVerifier::answering(VerificationStatus::Ok));
        let handler = OtpDeviceHandler::new(Arc::clone(&verifier) as _, registry_with_device());
        let outcome = handler.authenticate(&credential("bob", WELL_FORMED)).await;
        assert!(matches!(outcome, HandlerOutcome::HandledFailure { .. }));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn registered_device_with_ok_status_makes_exactly_one_call() {
        let verifier = Arc::new(FakeVerifier::answering(VerificationStatus::Ok));
        let handler = OtpDeviceHandler::new(Arc::clone(&verifier) as _, registry_with_device());
        let outcome = handler.authenticate(&credential("alice", WELL_FORMED)).await;
        assert!(matches!(outcome, HandlerOutcome::Success));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn replayed_status_is_handled_failure() {
        let verifier = Arc::new(FakeVerifier::answering(VerificationStatus::Replayed));
        let handler = OtpDeviceHandler::new(Arc::clone(&verifier) as _, registry_with_device());
        let outcome = handler.authenticate(&credential("alice", WELL_FORMED)).await;
        match outcome {
            HandlerOutcome::HandledFailure { reason } => assert!(reason.contains("REPLAYED")),
            other => panic!("expected handled failure, got {other:?}"),
        }
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_verifier_is_prevented() {
        let verifier = Arc::new(FakeVerifier::unreachable());
        let handler = OtpDeviceHandler::new(Arc::clone(&verifier) as _, registry_with_device());
        let outcome = handler.authenticate(&credential("alice", WELL_FORMED)).await;
        assert!(matches!(outcome, HandlerOutcome::Prevented { .. }));
    }

    #[tokio::test]
    async fn accept_all_registry_skips_the_device_gate() {
        let verifier = Arc::new(FakeVerifier::answering(VerificationStatus::Ok));
        let accounts = Arc::new(AcceptAllAccountRegistry::new(
            NonProductionGuard::i_accept_every_device_is_authorized(),
        ));
        let handler = OtpDeviceHandler::new(Arc::clone(&verifier) as _, accounts);
        let outcome = handler.authenticate(&credential("anyone", WELL_FORMED)).await;
        assert!(matches!(outcome, HandlerOutcome::Success));
    }
}
