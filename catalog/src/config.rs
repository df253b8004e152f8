use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the client authenticates against the catalog server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthProvider {
    #[default]
    NoAuth,
    /// Bearer JWT issued by the catalog itself.
    Openmetadata,
}

/// Where service connection secrets are resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecretsManagerProvider {
    /// Connections are stored in clear on the service entity.
    #[default]
    Noop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogConfig {
    pub host_port: String,
    pub auth_provider: AuthProvider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_token: Option<String>,
    pub secrets_manager_provider: SecretsManagerProvider,
    pub timeout_secs: u64,
    pub page_size: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            host_port: "http://localhost:8585/api".to_string(),
            auth_provider: AuthProvider::NoAuth,
            jwt_token: None,
            secrets_manager_provider: SecretsManagerProvider::Noop,
            timeout_secs: 30,
            page_size: 100,
        }
    }
}

impl CatalogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host_port(mut self, host_port: impl Into<String>) -> Self {
        self.host_port = host_port.into();
        self
    }

    pub fn with_jwt_token(mut self, token: impl Into<String>) -> Self {
        self.auth_provider = AuthProvider::Openmetadata;
        self.jwt_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.host_port.is_empty() {
            return Err("Host port cannot be empty".to_string());
        }

        if !self.host_port.starts_with("http://") && !self.host_port.starts_with("https://") {
            return Err("Host port must start with http:// or https://".to_string());
        }

        if self.auth_provider == AuthProvider::Openmetadata
            && self.jwt_token.as_deref().map_or(true, str::is_empty)
        {
            return Err("JWT token is required for the openmetadata auth provider".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        if self.page_size == 0 {
            return Err("Page size must be greater than 0".to_string());
        }

        Ok(())
    }
}
