//! Pluggable credential validators.
//!
//! Each handler is stateless beyond immutable configuration and the single
//! external call it may issue, and collapses every attempt into one of the
//! three terminal [`HandlerOutcome`] values.

pub mod delegated;
pub mod directory;
pub mod local;
pub mod otp;

pub use delegated::{AssertionValidator, DelegatedRemoteHandler, HttpAssertionValidator};
pub use directory::{BindOutcome, DirectoryBindHandler, DirectoryBinder, LdapDirectoryBinder};
pub use local::LocalTableHandler;
pub use otp::{CloudOtpVerifier, OtpDeviceHandler, OtpVerifier, VerificationResponse, VerificationStatus};

use async_trait::async_trait;

use super::{Credential, HandlerOutcome};

/// Common capability implemented by every handler variant.
#[async_trait]
pub trait AuthenticationHandler: Send + Sync {
    /// Stable identity used in failure traces and success attribution.
    fn name(&self) -> &'static str;

    /// Whether this handler knows what to do with the credential kind.
    fn supports(&self, credential: &Credential) -> bool;

    /// Validate the credential. Implementations must not panic and must not
    /// let raw transport errors escape; classification is the contract.
    async fn authenticate(&self, credential: &Credential) -> HandlerOutcome;
}
