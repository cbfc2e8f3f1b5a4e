//! Settings file management
//!
//! The settings file names the environment variables that hold credentials;
//! the values themselves are read from the environment at startup and are
//! never written to disk or compiled in.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::deploy::connector::DeviceConnector;
use crate::errors::AgentError;
use crate::logs::LogLevel;
use crate::platform::client::PlatformClient;
use crate::utils::CooldownOptions;

/// Agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Graph platform configuration
    #[serde(default)]
    pub platform: PlatformSettings,

    /// Device access configuration
    #[serde(default)]
    pub device: DeviceSettings,

    /// Directory for declaration snapshots
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            platform: PlatformSettings::default(),
            device: DeviceSettings::default(),
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

fn default_snapshot_dir() -> String {
    "/var/lib/netauto/snapshots".to_string()
}

/// Graph platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    /// Base URL of the platform API
    #[serde(default = "default_platform_url")]
    pub base_url: String,

    /// Name of the environment variable holding the API token
    #[serde(default = "default_platform_token_env")]
    pub api_token_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_platform_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_platform_token_env() -> String {
    "INFRAHUB_API_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            base_url: default_platform_url(),
            api_token_env: default_platform_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl PlatformSettings {
    /// Build a platform client, pulling the API token from the environment.
    pub fn client(&self) -> Result<PlatformClient, AgentError> {
        let token = read_env_secret(&self.api_token_env)?;
        PlatformClient::new(&self.base_url, token, Duration::from_secs(self.timeout_secs))
    }
}

/// Device access settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Name of the environment variable holding the admin username
    #[serde(default = "default_device_user_env")]
    pub username_env: String,

    /// Name of the environment variable holding the admin password
    #[serde(default = "default_device_password_env")]
    pub password_env: String,

    /// Verify the device TLS certificate
    #[serde(default)]
    pub verify_tls: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Login attempts before a run gives up on the device
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

fn default_device_user_env() -> String {
    "BIGIP_USERNAME".to_string()
}

fn default_device_password_env() -> String {
    "BIGIP_PASSWORD".to_string()
}

fn default_connect_attempts() -> u32 {
    3
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            username_env: default_device_user_env(),
            password_env: default_device_password_env(),
            verify_tls: false,
            timeout_secs: default_timeout_secs(),
            connect_attempts: default_connect_attempts(),
        }
    }
}

impl DeviceSettings {
    /// Build a device connector, pulling credentials from the environment.
    pub fn connector(&self) -> Result<DeviceConnector, AgentError> {
        Ok(DeviceConnector {
            username: read_env(&self.username_env)?,
            password: read_env_secret(&self.password_env)?,
            verify_tls: self.verify_tls,
            timeout: Duration::from_secs(self.timeout_secs),
            connect_attempts: self.connect_attempts,
            cooldown: CooldownOptions::default(),
        })
    }
}

fn read_env(name: &str) -> Result<String, AgentError> {
    std::env::var(name)
        .map_err(|_| AgentError::ConfigError(format!("environment variable {} is not set", name)))
}

fn read_env_secret(name: &str) -> Result<SecretString, AgentError> {
    read_env(name).map(SecretString::from)
}
