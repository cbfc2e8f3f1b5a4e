//! Device session and login exchange

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::BigipError;

/// Connection parameters for one appliance.
///
/// Credentials are injected by the caller; nothing here carries a default
/// username or password.
#[derive(Debug)]
pub struct DeviceConfig {
    /// Management address (host or host:port)
    pub address: String,

    /// Administrative username
    pub username: String,

    /// Administrative password
    pub password: SecretString,

    /// Verify the device TLS certificate. Appliances commonly present
    /// self-signed certificates, so this defaults to off; it stays a
    /// configuration decision.
    pub verify_tls: bool,

    /// Request timeout applied to every call
    pub timeout: Duration,

    /// Login provider passed to the auth endpoint
    pub login_provider: String,
}

impl DeviceConfig {
    pub fn new(address: impl Into<String>, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            password,
            verify_tls: false,
            timeout: Duration::from_secs(30),
            login_provider: "tmos".to_string(),
        }
    }

    /// Base URL for the management interface.
    ///
    /// A bare host gets the https scheme; an explicit scheme is kept as-is.
    pub fn base_url(&self) -> Result<Url, BigipError> {
        let addr = if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("https://{}", self.address)
        };
        Url::parse(&addr)
            .map_err(|e| BigipError::Config(format!("invalid device address {}: {}", self.address, e)))
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: LoginToken,
}

#[derive(Debug, Deserialize)]
struct LoginToken {
    token: String,
}

/// An authenticated connection descriptor for one appliance.
///
/// Owned exclusively by one client instance; concurrent runs against the
/// same device each log in for themselves.
#[derive(Debug, Clone)]
pub struct DeviceSession {
    address: Url,
    token: String,
    issued_at: DateTime<Utc>,
}

impl DeviceSession {
    /// Perform the login exchange and return an authenticated session.
    ///
    /// Fails with [`BigipError::Auth`] when the device rejects the
    /// credentials or is unreachable.
    pub async fn login(http: &Client, config: &DeviceConfig) -> Result<Self, BigipError> {
        let base = config.base_url()?;
        let url = base
            .join("/mgmt/shared/authn/login")
            .map_err(|e| BigipError::Config(e.to_string()))?;
        debug!("POST {} (login)", url);

        let body = serde_json::json!({
            "username": config.username,
            "password": config.password.expose_secret(),
            "loginProviderName": config.login_provider,
        });

        let response = http
            .post(url)
            .basic_auth(&config.username, Some(config.password.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(|e| BigipError::Auth(format!("device unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BigipError::Auth(format!("login rejected: {} - {}", status, body)));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| BigipError::Auth(format!("unexpected login response: {}", e)))?;

        info!("Authenticated to device {}", config.address);
        Ok(Self {
            address: base,
            token: login.token.token,
            issued_at: Utc::now(),
        })
    }

    /// Management base URL of the device
    pub fn address(&self) -> &Url {
        &self.address
    }

    /// The auth token issued at login
    pub fn token(&self) -> &str {
        &self.token
    }

    /// When the login exchange completed
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Best-effort extension of the token lifetime.
    ///
    /// Not required for correctness of a request sequence; callers that run
    /// long may invoke it once after login.
    pub async fn prolong(&self, http: &Client, timeout_secs: u64) -> Result<(), BigipError> {
        let url = self
            .address
            .join(&format!("/mgmt/shared/authz/tokens/{}", self.token))
            .map_err(|e| BigipError::Config(e.to_string()))?;
        debug!("PATCH {} (token prolong)", url);

        let body = serde_json::json!({ "timeout": timeout_secs.to_string() });
        let response = http
            .patch(url)
            .header("Content-Type", "application/json")
            .header("X-F5-Auth-Token", &self.token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Token prolong failed: {} - {}", status, body);
            return Err(BigipError::device(status, body));
        }

        Ok(())
    }
}

/// Build the reqwest client used for every call toward the device,
/// honoring the configured timeout and TLS policy.
pub fn build_http_client(config: &DeviceConfig) -> Result<Client, BigipError> {
    let client = Client::builder()
        .timeout(config.timeout)
        .danger_accept_invalid_certs(!config.verify_tls)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        let config = DeviceConfig::new("10.0.0.1", "admin", SecretString::from("x".to_string()));
        assert_eq!(config.base_url().unwrap().as_str(), "https://10.0.0.1/");
    }

    #[test]
    fn test_base_url_rejects_garbage() {
        let config = DeviceConfig::new("not a host", "admin", SecretString::from("x".to_string()));
        assert!(config.base_url().is_err());
    }
}
