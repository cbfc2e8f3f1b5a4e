//! Device REST client core

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, error};

use crate::errors::{BigipError, DeleteOutcome};
use crate::session::{build_http_client, DeviceConfig, DeviceSession};

/// REST client for one appliance.
///
/// Construction performs the login exchange; every request carries the
/// session token and the client-wide timeout. One instance per deployment
/// run; instances are not shared across runs targeting other devices.
#[derive(Debug)]
pub struct DeviceClient {
    http: Client,
    session: DeviceSession,
    pub(crate) per_app_checked: OnceCell<()>,
}

impl DeviceClient {
    /// Log in to the device and return a ready client.
    pub async fn connect(config: &DeviceConfig) -> Result<Self, BigipError> {
        let http = build_http_client(config)?;
        let session = DeviceSession::login(&http, config).await?;
        Ok(Self {
            http,
            session,
            per_app_checked: OnceCell::new(),
        })
    }

    /// The session backing this client
    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn url(&self, path: &str) -> Result<url::Url, BigipError> {
        self.session
            .address()
            .join(path)
            .map_err(|e| BigipError::Config(format!("invalid path {}: {}", path, e)))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Content-Type", "application/json")
            .header("X-F5-Auth-Token", self.session.token())
    }

    /// GET a JSON resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BigipError> {
        let url = self.url(path)?;
        debug!("GET {}", url);

        let response = self.authed(self.http.get(url)).send().await?;
        let response = into_success(response).await?;
        let body = response.json().await?;
        Ok(body)
    }

    /// POST a JSON body.
    ///
    /// Returns the decoded response body, or `None` when the device answers
    /// with an empty or non-JSON body.
    pub async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<serde_json::Value>, BigipError> {
        let url = self.url(path)?;
        debug!("POST {}", url);

        let response = self.authed(self.http.post(url)).json(body).send().await?;
        let response = into_success(response).await?;
        Ok(decode_lenient(response).await)
    }

    /// DELETE a resource.
    ///
    /// 404 means the object is already gone and is reported as
    /// [`DeleteOutcome::AlreadyAbsent`], never as an error.
    pub async fn delete(&self, path: &str) -> Result<DeleteOutcome, BigipError> {
        let url = self.url(path)?;
        debug!("DELETE {}", url);

        let response = self.authed(self.http.delete(url)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("Object {} not found, nothing to delete", path);
            return Ok(DeleteOutcome::AlreadyAbsent);
        }

        let response = into_success(response).await?;
        Ok(DeleteOutcome::Deleted(decode_lenient(response).await))
    }
}

/// Classify a response, turning any non-2xx into a device error carrying
/// the status and body.
async fn into_success(response: Response) -> Result<Response, BigipError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!("Device request failed: {} - {}", status, body);
    Err(BigipError::device(status, body))
}

/// Decode a JSON body if there is one; empty and non-JSON bodies are `None`.
async fn decode_lenient(response: Response) -> Option<serde_json::Value> {
    let text = response.text().await.ok()?;
    if text.is_empty() {
        return None;
    }
    serde_json::from_str(&text).ok()
}
