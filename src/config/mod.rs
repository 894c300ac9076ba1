//! Configuration
//!
//! `ProviderConfig` is constructed once at startup and shared by reference
//! with the reconciler and the provider adapters. Nothing else in the crate
//! reads the environment.

mod settings;

pub use settings::*;

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ChatError;
use crate::providers::ProviderKind;

/// Credentials and endpoint for one provider.
#[derive(Debug)]
pub struct ProviderCredentials {
    pub api_key: Option<SecretString>,
    pub base_url: String,
}

impl ProviderCredentials {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: base_url.into(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key: String = api_key.into();
        self.api_key = if key.trim().is_empty() {
            None
        } else {
            Some(SecretString::from(key))
        };
        self
    }
}

/// HTTP client settings shared by every provider.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Total request timeout; `None` keeps long streams open indefinitely
    pub timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("pharos/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Per-provider credentials plus transport settings.
#[derive(Debug)]
pub struct ProviderConfig {
    providers: HashMap<ProviderKind, ProviderCredentials>,
    pub http: HttpConfig,
}

impl ProviderConfig {
    /// Every provider at its default base URL, without credentials.
    pub fn new() -> Self {
        let providers = ProviderKind::ALL
            .iter()
            .map(|kind| (*kind, ProviderCredentials::new(kind.default_base_url())))
            .collect();
        Self {
            providers,
            http: HttpConfig::default(),
        }
    }

    /// Read credentials from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, settings file, tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();
        for kind in ProviderKind::ALL {
            let (key_var, url_var) = kind.env_vars();
            let base_url = lookup(url_var)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| kind.default_base_url().to_string());
            let mut credentials = ProviderCredentials::new(base_url);
            if let Some(key) = lookup(key_var) {
                credentials = credentials.with_api_key(key);
            }
            config.providers.insert(*kind, credentials);
        }
        let configured = config.configured_providers();
        tracing::debug!(providers = ?configured, "Loaded provider configuration");
        config
    }

    pub fn with_provider(mut self, kind: ProviderKind, credentials: ProviderCredentials) -> Self {
        self.providers.insert(kind, credentials);
        self
    }

    pub fn with_http_config(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    pub fn credentials(&self, kind: ProviderKind) -> Option<&ProviderCredentials> {
        self.providers.get(&kind)
    }

    pub fn base_url(&self, kind: ProviderKind) -> String {
        self.providers
            .get(&kind)
            .map(|c| c.base_url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| kind.default_base_url().to_string())
    }

    /// The API key for `kind`, or a configuration error when none is set.
    pub fn api_key(&self, kind: ProviderKind) -> Result<String, ChatError> {
        self.providers
            .get(&kind)
            .and_then(|c| c.api_key.as_ref())
            .map(|k| k.expose_secret().to_string())
            .ok_or_else(|| {
                let (key_var, _) = kind.env_vars();
                ChatError::ConfigurationError(format!(
                    "No API key configured for {} (set {key_var})",
                    kind.display_name()
                ))
            })
    }

    pub fn has_credentials(&self, kind: ProviderKind) -> bool {
        self.providers
            .get(&kind)
            .map(|c| c.api_key.is_some())
            .unwrap_or(false)
    }

    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.has_credentials(*kind))
            .collect()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new()
    }
}
