use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration assembled once from CLI/env at startup.
///
/// Handler sections are optional: a handler joins the dispatch chain only
/// when its configuration is complete (see `actions::server`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub granting_lifetime: Duration,
    pub granting_idle_timeout: Duration,
    pub service_lifetime: Duration,
    pub sweep_interval: Duration,
    /// Exact-match service URL rules; anything else is refused a ticket.
    pub services: Vec<String>,
    pub users_file: Option<PathBuf>,
    pub directory_url: Option<String>,
    pub directory_bind_template: Option<String>,
    pub directory_timeout: Duration,
    pub otp_verify_url: Option<String>,
    pub otp_client_id: Option<String>,
    pub otp_accounts_file: Option<PathBuf>,
    pub delegation_validate_url: Option<String>,
    pub remote_timeout: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_hold_values() {
        let settings = Settings {
            port: 8080,
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
        };
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.services.len(), 1);
    }
}
