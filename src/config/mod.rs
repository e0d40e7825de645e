// ABOUTME: Runtime settings for foreman: polling bounds, builder defaults and SSH timeouts.
// ABOUTME: Defaults can be overridden from FOREMAN_* environment variables with humantime durations.

use crate::application::BuilderOptions;
use crate::deferred::TimeoutConstraint;
use crate::error::{Error, Result};
use crate::ssh::SessionConfig;
use serde::Deserialize;
use std::time::Duration;

pub const ENV_ENSURE_TIMEOUT: &str = "FOREMAN_ENSURE_TIMEOUT";
pub const ENV_ENSURE_MAX_POLL: &str = "FOREMAN_ENSURE_MAX_POLL";
pub const ENV_ENSURE_INITIAL_DELAY: &str = "FOREMAN_ENSURE_INITIAL_DELAY";
pub const ENV_ORPHANS_PERMITTED: &str = "FOREMAN_ORPHANS_PERMITTED";
pub const ENV_AUTO_DEPLOY: &str = "FOREMAN_AUTO_DEPLOY";
pub const ENV_SSH_COMMAND_TIMEOUT: &str = "FOREMAN_SSH_COMMAND_TIMEOUT";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Bounds for every eventual assertion that does not bring its own.
    pub ensure: TimeoutConstraint,

    pub builder: BuilderOptions,

    #[serde(with = "humantime_serde")]
    pub ssh_command_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ensure: TimeoutConstraint::default(),
            builder: BuilderOptions::default(),
            ssh_command_timeout: Duration::from_secs(300),
        }
    }
}

impl Settings {
    /// Defaults overridden by whatever FOREMAN_* variables are set.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up by variable name.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(timeout) = duration(&lookup, ENV_ENSURE_TIMEOUT)? {
            self.ensure = self.ensure.within(timeout);
        }
        if let Some(max_poll) = duration(&lookup, ENV_ENSURE_MAX_POLL)? {
            self.ensure = self.ensure.with_max_poll_period(max_poll);
        }
        if let Some(delay) = duration(&lookup, ENV_ENSURE_INITIAL_DELAY)? {
            self.ensure = self.ensure.delayed_by(delay);
        }
        if let Some(permitted) = flag(&lookup, ENV_ORPHANS_PERMITTED)? {
            self.builder.orphans_permitted = permitted;
        }
        if let Some(enabled) = flag(&lookup, ENV_AUTO_DEPLOY)? {
            self.builder.auto_deploy = enabled;
        }
        if let Some(timeout) = duration(&lookup, ENV_SSH_COMMAND_TIMEOUT)? {
            self.ssh_command_timeout = timeout;
        }
        Ok(self)
    }

    /// Apply the SSH command timeout to a session config.
    pub fn session(&self, config: SessionConfig) -> SessionConfig {
        config.command_timeout(self.ssh_command_timeout)
    }
}

fn duration<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            humantime::parse_duration(raw.trim())
                .map_err(|e| Error::InvalidConfig(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}

fn flag<F>(lookup: &F, key: &str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::InvalidConfig(format!("{key}={raw:?}: expected a boolean"))),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn no_overrides_keeps_defaults() {
        let settings = Settings::default().with_overrides(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn durations_accept_humantime() {
        let settings = Settings::default()
            .with_overrides(lookup(&[
                (ENV_ENSURE_TIMEOUT, "1m 30s"),
                (ENV_ENSURE_MAX_POLL, "250ms"),
                (ENV_SSH_COMMAND_TIMEOUT, "10s"),
            ]))
            .unwrap();

        assert_eq!(settings.ensure.max_duration(), Duration::from_secs(90));
        assert_eq!(settings.ensure.max_poll_period(), Duration::from_millis(250));
        assert_eq!(settings.ssh_command_timeout, Duration::from_secs(10));
    }

    #[test]
    fn flags_accept_common_spellings() {
        let settings = Settings::default()
            .with_overrides(lookup(&[(ENV_ORPHANS_PERMITTED, "YES"), (ENV_AUTO_DEPLOY, "0")]))
            .unwrap();

        assert!(settings.builder.orphans_permitted);
        assert!(!settings.builder.auto_deploy);
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = Settings::default()
            .with_overrides(lookup(&[(ENV_ENSURE_INITIAL_DELAY, "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_ENSURE_INITIAL_DELAY));

        let err = Settings::default()
            .with_overrides(lookup(&[(ENV_AUTO_DEPLOY, "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("expected a boolean"));
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "ensure": { "max_duration": "2s" },
            "ssh_command_timeout": "1m"
        }))
        .unwrap();

        assert_eq!(settings.ensure.max_duration(), Duration::from_secs(2));
        assert_eq!(settings.ssh_command_timeout, Duration::from_secs(60));
        assert!(settings.builder.auto_deploy);
    }
}
