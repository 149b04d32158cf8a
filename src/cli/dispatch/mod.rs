use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::cli::{actions::Action, globals::Settings};

fn seconds(matches: &clap::ArgMatches, name: &str, fallback: u64) -> Duration {
    Duration::from_secs(matches.get_one::<u64>(name).copied().unwrap_or(fallback))
}

fn optional_string(matches: &clap::ArgMatches, name: &str) -> Option<String> {
    matches.get_one::<String>(name).cloned()
}

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let settings = Settings {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        granting_lifetime: seconds(matches, "tgt-lifetime", 28800),
        granting_idle_timeout: seconds(matches, "tgt-idle-timeout", 7200),
        service_lifetime: seconds(matches, "st-lifetime", 10),
        sweep_interval: seconds(matches, "sweep-interval", 60),
        services: matches
            .get_many::<String>("service")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
        users_file: matches.get_one::<String>("users-file").map(PathBuf::from),
        directory_url: optional_string(matches, "directory-url"),
        directory_bind_template: optional_string(matches, "directory-bind-template"),
        directory_timeout: seconds(matches, "directory-timeout", 5),
        otp_verify_url: optional_string(matches, "otp-verify-url"),
        otp_client_id: optional_string(matches, "otp-client-id"),
        otp_accounts_file: matches
            .get_one::<String>("otp-accounts-file")
            .map(PathBuf::from),
        delegation_validate_url: optional_string(matches, "delegation-validate-url"),
        remote_timeout: seconds(matches, "remote-timeout", 5),
    };

    Ok(Action::Server { settings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn handler_builds_server_action_from_matches() {
        let matches = commands::new().get_matches_from(vec![
            "bileto",
            "--port",
            "9090",
            "--st-lifetime",
            "15",
            "--service",
            "https://app.example.org/",
            "--otp-verify-url",
            "https://otp.example.org/wsapi/2.0/verify",
            "--otp-client-id",
            "4711",
            "--otp-accounts-file",
            "/etc/bileto/devices",
        ]);

        let Action::Server { settings } = handler(&matches).expect("action");
        assert_eq!(settings.port, 9090);
        assert_eq!(settings.service_lifetime, Duration::from_secs(15));
        assert_eq!(settings.services, vec!["https://app.example.org/".to_string()]);
        assert_eq!(
            settings.otp_verify_url.as_deref(),
            Some("https://otp.example.org/wsapi/2.0/verify")
        );
        assert_eq!(settings.otp_client_id.as_deref(), Some("4711"));
        assert_eq!(
            settings.otp_accounts_file,
            Some(PathBuf::from("/etc/bileto/devices"))
        );
        assert_eq!(settings.users_file, None);
    }
}
