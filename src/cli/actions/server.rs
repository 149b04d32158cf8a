//! Server assembly: build the handler chain and the registry from settings,
//! spawn the eviction sweep, serve until shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::api::{self, SsoState};
use crate::authn::account::StaticAccountRegistry;
use crate::authn::handlers::{
    CloudOtpVerifier, DelegatedRemoteHandler, DirectoryBindHandler, HttpAssertionValidator,
    LdapDirectoryBinder, LocalTableHandler, OtpDeviceHandler,
};
use crate::authn::principal::{AccountIdResolver, DelegatedSubjectResolver, EmailAccountResolver};
use crate::authn::{AuthenticationDispatcher, AuthnPair};
use crate::cli::actions::Action;
use crate::cli::globals::Settings;
use crate::ticket::sweep::run_eviction_sweep;
use crate::ticket::{InMemoryTicketStore, TicketPolicy, TicketRegistry, TicketStore};

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server { settings } = action;

    crate::emit_version_banner();

    let dispatcher = build_dispatcher(&settings)?;
    let registry = Arc::new(build_registry(&settings));
    let state = Arc::new(SsoState::new(dispatcher, Arc::clone(&registry)));

    let cancel_token = CancellationToken::new();
    let sweep = tokio::spawn(run_eviction_sweep(
        registry,
        settings.sweep_interval,
        cancel_token.clone(),
    ));

    // Translate ctrl-c into cancellation so the server and the sweep exit
    // together.
    {
        let cancel_token = cancel_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                cancel_token.cancel();
            }
        });
    }

    let result = api::serve(settings.port, state, cancel_token.clone()).await;
    cancel_token.cancel();
    let _ = sweep.await;
    result
}

fn build_registry(settings: &Settings) -> TicketRegistry {
    if settings.services.is_empty() {
        warn!("no registered services; every service-ticket request will be refused");
    }
    let policy = TicketPolicy::new()
        .with_granting_lifetime(settings.granting_lifetime)
        .with_granting_idle_timeout(settings.granting_idle_timeout)
        .with_service_lifetime(settings.service_lifetime);
    let store: Arc<dyn TicketStore> = Arc::new(InMemoryTicketStore::new());
    TicketRegistry::new(store, policy, settings.services.clone())
}

/// Assemble the ordered (handler, resolver) chain. Order is priority order:
/// local table, directory bind, OTP device, delegated assertions.
fn build_dispatcher(settings: &Settings) -> Result<AuthenticationDispatcher> {
    let mut pairs = Vec::new();

    if let Some(path) = &settings.users_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read users file {}", path.display()))?;
        let handler = LocalTableHandler::from_lines(&text)?;
        pairs.push(AuthnPair::new(
            Arc::new(handler),
            Arc::new(EmailAccountResolver::default()),
        ));
        info!("local account table enabled");
    }

    if let (Some(url), Some(template)) = (
        &settings.directory_url,
        &settings.directory_bind_template,
    ) {
        let binder = LdapDirectoryBinder::new(url.clone(), settings.directory_timeout);
        let handler =
            DirectoryBindHandler::new(Arc::new(binder), template.clone(), settings.directory_timeout)?;
        pairs.push(AuthnPair::new(
            Arc::new(handler),
            Arc::new(EmailAccountResolver::default()),
        ));
        info!(directory = url.as_str(), "directory bind enabled");
    }

    if let (Some(url), Some(client_id), Some(accounts_path)) = (
        &settings.otp_verify_url,
        &settings.otp_client_id,
        &settings.otp_accounts_file,
    ) {
        let text = std::fs::read_to_string(accounts_path).with_context(|| {
            format!(
                "failed to read device account registry {}",
                accounts_path.display()
            )
        })?;
        let accounts = StaticAccountRegistry::from_lines(&text)?;
        let verify_url = Url::parse(url).context("invalid OTP verify URL")?;
        let verifier = CloudOtpVerifier::new(verify_url, client_id.clone(), settings.remote_timeout)?;
        pairs.push(AuthnPair::new(
            Arc::new(OtpDeviceHandler::new(Arc::new(verifier), Arc::new(accounts))),
            Arc::new(AccountIdResolver::default()),
        ));
        info!("one-time-password handler enabled");
    }

    if let Some(url) = &settings.delegation_validate_url {
        let validate_url = Url::parse(url).context("invalid delegation validate URL")?;
        let validator = HttpAssertionValidator::new(validate_url, settings.remote_timeout)?;
        pairs.push(AuthnPair::new(
            Arc::new(DelegatedRemoteHandler::new(Arc::new(validator))),
            Arc::new(DelegatedSubjectResolver),
        ));
        info!("delegated assertion handler enabled");
    }

    if pairs.is_empty() {
        warn!("no authentication handlers configured; every login will be rejected");
    }
    Ok(AuthenticationDispatcher::new(pairs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn settings() -> Settings {
        Settings {
            port: 0,
            granting_lifetime: Duration::from_secs(28800),
            granting_idle_timeout: Duration::from_secs(7200),
            service_lifetime: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(60),
            services: vec!["https://app.example.org/".to_string()],
            users_file: None,
            directory_url: None,
            directory_bind_template: None,
            directory_timeout: Duration::from_secs(5),
            otp_verify_url: None,
            otp_client_id: None,
            otp_accounts_file: None,
            delegation_validate_url: None,
            remote_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn empty_settings_build_an_empty_dispatcher() {
        let dispatcher = build_dispatcher(&settings()).expect("dispatcher");
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn users_file_enables_the_local_table() {
        let file = TempFile::with_content("alice:hunter2\n");
        let mut settings = settings();
        settings.users_file = Some(file.path.clone());

        let dispatcher = build_dispatcher(&settings).expect("dispatcher");
        assert!(!dispatcher.is_empty());
    }

    #[test]
    fn missing_users_file_is_an_error() {
        let mut settings = settings();
        settings.users_file = Some("/nonexistent/bileto-users".into());
        assert!(build_dispatcher(&settings).is_err());
    }

    #[test]
    fn otp_requires_valid_url() {
        let file = TempFile::with_content("alice:ccccccbchvth\n");
        let mut settings = settings();
        settings.otp_verify_url = Some("not a url".to_string());
        settings.otp_client_id = Some("4711".to_string());
        settings.otp_accounts_file = Some(file.path.clone());
        assert!(build_dispatcher(&settings).is_err());
    }

    struct TempFile {
        path: std::path::PathBuf,
    }

    impl TempFile {
        fn with_content(content: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "bileto-test-{}-{}",
                std::process::id(),
                ulid::Ulid::new()
            ));
            let mut file = std::fs::File::create(&path).expect("create temp file");
            file.write_all(content.as_bytes()).expect("write temp file");
            Self { path }
        }
    }

    impl Drop for TempFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
