//! Per-provider synchronization settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sift_core::enums::Provider;

use crate::ConfigError;

const fn default_enabled() -> bool {
    true
}

/// Delay between two reconciliation cycles, in seconds.
const fn default_interval_secs() -> u64 {
    300
}

const fn default_initial_delay_secs() -> u64 {
    5
}

/// Delay after a failed cycle, in seconds.
const fn default_retry_secs() -> u64 {
    60
}

/// Bound on a single provider client call, in seconds.
const fn default_timeout_secs() -> u64 {
    30
}

/// Accounts processed in parallel within one cycle.
const fn default_concurrency() -> usize {
    4
}

/// Result pages followed per list scan.
const fn default_max_pages() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,

    #[serde(default = "default_retry_secs")]
    pub retry_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Override of the service API endpoint. Empty means the public endpoint
    /// (or, for self-hosted services, the URL stored in the account credentials).
    #[serde(default)]
    pub api_base: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
            initial_delay_secs: default_initial_delay_secs(),
            retry_secs: default_retry_secs(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            max_pages: default_max_pages(),
            api_base: String::new(),
        }
    }
}

impl ProviderConfig {
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub const fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub const fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_secs)
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn api_base(&self) -> Option<&str> {
        if self.api_base.is_empty() {
            None
        } else {
            Some(self.api_base.trim_end_matches('/'))
        }
    }

    pub(crate) fn validate(&self, section: &str) -> Result<(), ConfigError> {
        let checks = [
            ("interval_secs", self.interval_secs == 0),
            ("retry_secs", self.retry_secs == 0),
            ("timeout_secs", self.timeout_secs == 0),
            ("concurrency", self.concurrency == 0),
            ("max_pages", self.max_pages == 0),
        ];
        for (field, is_zero) in checks {
            if is_zero {
                return Err(ConfigError::InvalidValue {
                    field: format!("providers.{section}.{field}"),
                    reason: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub bugzilla: ProviderConfig,
    #[serde(default)]
    pub github: ProviderConfig,
    #[serde(default)]
    pub jira: ProviderConfig,
    #[serde(default)]
    pub google: ProviderConfig,
}

impl ProvidersConfig {
    pub const fn get(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Bugzilla => &self.bugzilla,
            Provider::Github => &self.github,
            Provider::Jira => &self.jira,
            Provider::Google => &self.google,
        }
    }

    /// Providers whose cycles should run, in declaration order.
    pub fn enabled(&self) -> Vec<Provider> {
        Provider::ALL
            .iter()
            .copied()
            .filter(|provider| self.get(*provider).enabled)
            .collect()
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for provider in Provider::ALL {
            self.get(*provider).validate(provider.as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = ProviderConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval(), Duration::from_secs(300));
        assert_eq!(config.initial_delay(), Duration::from_secs(5));
        assert_eq!(config.retry_delay(), Duration::from_secs(60));
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.max_pages, 10);
        assert_eq!(config.api_base(), None);
    }

    #[test]
    fn api_base_strips_trailing_slash() {
        let config = ProviderConfig {
            api_base: "http://127.0.0.1:9000/".into(),
            ..Default::default()
        };
        assert_eq!(config.api_base(), Some("http://127.0.0.1:9000"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = ProviderConfig {
            concurrency: 0,
            ..Default::default()
        };
        let err = config.validate("jira").unwrap_err();
        assert!(err.to_string().contains("providers.jira.concurrency"));
    }

    #[test]
    fn zero_max_pages_is_rejected() {
        let config = ProviderConfig {
            max_pages: 0,
            ..Default::default()
        };
        let err = config.validate("github").unwrap_err();
        assert!(err.to_string().contains("providers.github.max_pages"));
    }

    #[test]
    fn enabled_skips_disabled_providers() {
        let mut providers = ProvidersConfig::default();
        providers.google.enabled = false;
        assert_eq!(
            providers.enabled(),
            vec![Provider::Bugzilla, Provider::Github, Provider::Jira]
        );
    }
}
