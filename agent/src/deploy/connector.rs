//! Device connection with bounded retry
//!
//! Retries wrap the whole client construction; a retried attempt
//! re-authenticates from scratch.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use bigip_client::{DeviceClient, DeviceConfig};

use crate::errors::AgentError;
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Factory for authenticated device clients.
#[derive(Debug)]
pub struct DeviceConnector {
    /// Administrative username
    pub username: String,

    /// Administrative password
    pub password: SecretString,

    /// Verify the device TLS certificate
    pub verify_tls: bool,

    /// Per-request timeout
    pub timeout: Duration,

    /// Attempts for client construction before giving up
    pub connect_attempts: u32,

    /// Backoff between attempts
    pub cooldown: CooldownOptions,
}

impl DeviceConnector {
    /// Connect to the device at `address`, retrying login up to the
    /// configured attempt count.
    pub async fn connect(&self, address: &str) -> Result<DeviceClient, AgentError> {
        let password = SecretString::from(self.password.expose_secret().to_string());
        let mut config = DeviceConfig::new(address, self.username.clone(), password);
        config.verify_tls = self.verify_tls;
        config.timeout = self.timeout;

        let mut attempt: u32 = 0;
        loop {
            match DeviceClient::connect(&config).await {
                Ok(client) => return Ok(client),
                Err(e) if attempt + 1 < self.connect_attempts.max(1) => {
                    warn!(
                        "Device connect attempt {}/{} failed: {}",
                        attempt + 1,
                        self.connect_attempts,
                        e
                    );
                    tokio::time::sleep(calc_exp_backoff(&self.cooldown, attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
