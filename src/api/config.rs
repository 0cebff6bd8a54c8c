//! Purpose: Connection settings for the HTTP transport.
//! Exports: `ClientConfig`, `DEFAULT_API_ROOT`, `DEFAULT_TIMEOUT`.
//! Role: Environment-driven defaults with builder overrides; consumed by `Connection` and `Client`.
//! Invariants: Reading the environment never fails; invalid values surface when the connection is built.
use std::time::Duration;

pub const DEFAULT_API_ROOT: &str = "https://api.syncano.io/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_API_ROOT: &str = "SYNCANO_APIROOT";
pub const ENV_API_KEY: &str = "SYNCANO_APIKEY";
pub const ENV_EMAIL: &str = "SYNCANO_EMAIL";
pub const ENV_PASSWORD: &str = "SYNCANO_PASSWORD";
pub const ENV_INSTANCE: &str = "SYNCANO_INSTANCE";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientConfig {
    pub api_root: String,
    pub api_key: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub instance_name: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
            api_key: None,
            email: None,
            password: None,
            instance_name: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            api_root: non_empty(ENV_API_ROOT).unwrap_or_else(|| DEFAULT_API_ROOT.to_string()),
            api_key: non_empty(ENV_API_KEY),
            email: non_empty(ENV_EMAIL),
            password: non_empty(ENV_PASSWORD),
            instance_name: non_empty(ENV_INSTANCE),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_credentials(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_instance(mut self, instance_name: impl Into<String>) -> Self {
        self.instance_name = Some(instance_name.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
