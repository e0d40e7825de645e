// ABOUTME: Integration tests for loading settings from FOREMAN_* environment variables.
// ABOUTME: Uses temp-env so each test sees an isolated environment.

use foreman::config::Settings;
use std::time::Duration;

#[test]
fn defaults_apply_without_variables() {
    temp_env::with_vars_unset(
        [
            "FOREMAN_ENSURE_TIMEOUT",
            "FOREMAN_ENSURE_MAX_POLL",
            "FOREMAN_ENSURE_INITIAL_DELAY",
            "FOREMAN_ORPHANS_PERMITTED",
            "FOREMAN_AUTO_DEPLOY",
            "FOREMAN_SSH_COMMAND_TIMEOUT",
        ],
        || {
            let settings = Settings::from_env().unwrap();
            assert_eq!(settings, Settings::default());
            assert_eq!(settings.ensure.max_duration(), Duration::from_secs(30));
            assert_eq!(settings.ssh_command_timeout, Duration::from_secs(300));
            assert!(settings.builder.auto_deploy);
            assert!(!settings.builder.orphans_permitted);
        },
    );
}

#[test]
fn variables_override_defaults() {
    temp_env::with_vars(
        [
            ("FOREMAN_ENSURE_TIMEOUT", Some("2m")),
            ("FOREMAN_ENSURE_INITIAL_DELAY", Some("100ms")),
            ("FOREMAN_ORPHANS_PERMITTED", Some("true")),
            ("FOREMAN_SSH_COMMAND_TIMEOUT", Some("45s")),
        ],
        || {
            let settings = Settings::from_env().unwrap();
            assert_eq!(settings.ensure.max_duration(), Duration::from_secs(120));
            assert_eq!(settings.ensure.initial_delay(), Duration::from_millis(100));
            assert!(settings.builder.orphans_permitted);
            assert_eq!(settings.ssh_command_timeout, Duration::from_secs(45));
        },
    );
}

#[test]
fn invalid_duration_is_a_config_error() {
    temp_env::with_var("FOREMAN_ENSURE_MAX_POLL", Some("fast"), || {
        let err = Settings::from_env().unwrap_err();
        assert!(err.to_string().starts_with("invalid configuration"));
        assert!(err.to_string().contains("FOREMAN_ENSURE_MAX_POLL"));
    });
}

#[test]
fn session_settings_carry_the_command_timeout() {
    temp_env::with_var("FOREMAN_SSH_COMMAND_TIMEOUT", Some("7s"), || {
        let settings = Settings::from_env().unwrap();
        let config = settings.session(foreman::ssh::SessionConfig::new("db", "deploy"));
        assert_eq!(config.command_timeout, Duration::from_secs(7));
    });
}
