//! Certificate issuance pipeline
//!
//! Drives the certificate lifecycle on the device: CSR key object creation,
//! CSR text retrieval, external signing, upload + atomic install, and
//! deletion of the cert/key/CSR objects.

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::DeviceClient;
use crate::errors::BigipError;

/// Marker the device prints after the CSR body in `list sys crypto csr`
/// output. The output format is undocumented; [`extract_csr_text`] is the
/// only place that knows about it.
const CSR_OUTPUT_MARKER: &str = "\nsys crypto";

/// Subject data for a CSR key object.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrSpec {
    /// Object name; also names the loose `.csr` artifact file the device
    /// writes under /config/ssl/ssl.csr/
    pub name: String,

    pub common_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    pub key_size: u32,

    pub key_type: String,
}

impl CsrSpec {
    pub fn new(name: impl Into<String>, common_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            common_name: common_name.into(),
            organization: None,
            city: None,
            state: None,
            country: None,
            key_size: 2048,
            key_type: "rsa-private".to_string(),
        }
    }
}

/// Lifecycle of one certificate request, pipeline-driven only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertLifecycle {
    Requested,
    CsrIssued,
    Signed,
    Installed,
    Deleted,
}

/// A certificate request tracked through the pipeline.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    name: String,
    subject: CsrSpec,
    state: CertLifecycle,
}

impl CertificateRequest {
    fn new(subject: CsrSpec) -> Self {
        Self {
            name: subject.name.clone(),
            subject,
            state: CertLifecycle::Requested,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subject(&self) -> &CsrSpec {
        &self.subject
    }

    pub fn state(&self) -> CertLifecycle {
        self.state
    }
}

/// External certificate authority collaborator.
///
/// The pipeline hands over the CSR text and expects a PEM certificate back;
/// everything about the CA itself lives outside this crate.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    async fn sign(&self, csr_pem: &str) -> Result<String, BigipError>;
}

impl DeviceClient {
    /// Create a CSR key object on the device.
    ///
    /// The device also writes a loose `.csr` file which is removed here via
    /// the command channel; the key object itself persists.
    pub async fn create_csr(&self, spec: CsrSpec) -> Result<CertificateRequest, BigipError> {
        let mut request = CertificateRequest::new(spec);
        self.post("/mgmt/tm/sys/crypto/key", &request.subject).await?;
        self.run_command(&format!("rm -f /config/ssl/ssl.csr/{}", request.name))
            .await?;
        request.state = CertLifecycle::CsrIssued;
        Ok(request)
    }

    /// Retrieve the CSR text for a CSR object.
    pub async fn fetch_csr_text(&self, csr_name: &str) -> Result<String, BigipError> {
        let result = self
            .run_command(&format!("tmsh list sys crypto csr {}", csr_name))
            .await?;
        extract_csr_text(&result.raw_output)
    }

    /// Upload a certificate file and install it on the device.
    ///
    /// The temporary uploaded file is removed on both the success and the
    /// failure path of the install. A failed cleanup surfaces as
    /// [`BigipError::CleanupFailed`], carrying the install error alongside
    /// when the install also failed; neither outcome masks the other.
    pub async fn push_certificate(
        &self,
        local_cert: &Path,
        cert_name: &str,
    ) -> Result<(), BigipError> {
        let remote = self.upload_file(local_cert).await?;

        let body = serde_json::json!({
            "name": cert_name,
            "fromLocalFile": remote,
            "command": "install",
        });
        let install = self.post("/mgmt/tm/sys/crypto/cert", &body).await;
        let cleanup = self.run_command(&format!("rm -f {}", remote)).await;

        match (install, cleanup) {
            (Ok(_), Ok(_)) => {
                info!("Installed certificate {}", cert_name);
                Ok(())
            }
            (Err(install_err), Ok(_)) => Err(install_err),
            (install, Err(cleanup_err)) => Err(BigipError::CleanupFailed {
                cleanup: Box::new(cleanup_err),
                install_error: install.err().map(Box::new),
            }),
        }
    }

    /// Run the whole issuance pipeline: CSR on device, CSR text out,
    /// external signing, upload + install.
    pub async fn issue_certificate<C: CertificateAuthority>(
        &self,
        spec: CsrSpec,
        ca: &C,
    ) -> Result<CertificateRequest, BigipError> {
        let mut request = self.create_csr(spec).await?;
        let csr_text = self.fetch_csr_text(request.name()).await?;

        let cert_pem = ca.sign(&csr_text).await?;
        request.state = CertLifecycle::Signed;

        // Signed certificate goes through a local scratch file; the upload
        // endpoint only takes files.
        let scratch = std::env::temp_dir().join(format!("{}.crt", request.name()));
        tokio::fs::write(&scratch, cert_pem.as_bytes()).await?;
        let pushed = self.push_certificate(&scratch, request.name()).await;
        if let Err(e) = tokio::fs::remove_file(&scratch).await {
            debug!("Could not remove scratch file {}: {}", scratch.display(), e);
        }
        pushed?;

        request.state = CertLifecycle::Installed;
        Ok(request)
    }

    /// Delete the cert, key and CSR objects for a certificate.
    ///
    /// Each delete is individually idempotent (404 is a no-op), but the
    /// bundle is not transactional: a partial deletion is a legal terminal
    /// state, and retrying the whole call converges.
    pub async fn delete_certificate_bundle(&self, cert_name: &str) -> Result<(), BigipError> {
        for path in [
            format!("/mgmt/tm/sys/crypto/cert/{}.crt", cert_name),
            format!("/mgmt/tm/sys/crypto/key/{}.key", cert_name),
            // CSR objects inherit the key object's name
            format!("/mgmt/tm/sys/crypto/csr/{}.key", cert_name),
        ] {
            let outcome = self.delete(&path).await?;
            if outcome.was_absent() {
                debug!("{} already absent", path);
            }
        }
        info!("Deleted certificate bundle {}", cert_name);
        Ok(())
    }

    /// Generate and install a self-signed certificate/key pair directly on
    /// the device. Bootstrap/demo path only, not production issuance.
    pub async fn create_self_signed(&self, cert_name: &str) -> Result<(), BigipError> {
        self.run_command(&format!(
            "openssl req -x509 -nodes -days 3650 -newkey rsa:2048 \
             -keyout /config/ssl/ssl.key/{name}.key -out /config/ssl/ssl.crt/{name}.crt \
             -subj /CN={name}",
            name = cert_name
        ))
        .await?;

        let cert = serde_json::json!({
            "command": "install",
            "name": format!("{}.crt", cert_name),
            "from-local-file": format!("/config/ssl/ssl.crt/{}.crt", cert_name),
        });
        let key = serde_json::json!({
            "command": "install",
            "name": format!("{}.key", cert_name),
            "from-local-file": format!("/config/ssl/ssl.key/{}.key", cert_name),
        });
        self.post("/mgmt/tm/sys/crypto/cert", &cert).await?;
        self.post("/mgmt/tm/sys/crypto/key", &key).await?;

        // The plaintext files must not stay on disk after install.
        self.run_command(&format!("rm -f /config/ssl/ssl.crt/{}.crt", cert_name))
            .await?;
        self.run_command(&format!("rm -f /config/ssl/ssl.key/{}.key", cert_name))
            .await?;

        warn!("Installed self-signed placeholder certificate {}", cert_name);
        Ok(())
    }
}

/// Extract the CSR body from `list sys crypto csr` output.
///
/// The body is everything before the first `"\nsys crypto"` marker. A
/// missing marker or an empty body means the device output format changed
/// and is a typed error, never a silent truncation.
pub(crate) fn extract_csr_text(raw: &str) -> Result<String, BigipError> {
    let Some(index) = raw.find(CSR_OUTPUT_MARKER) else {
        return Err(BigipError::CommandOutput(format!(
            "csr listing missing '{}' marker: {:?}",
            CSR_OUTPUT_MARKER.trim(),
            truncate_for_log(raw)
        )));
    };

    let body = raw[..index].trim();
    if body.is_empty() {
        return Err(BigipError::CommandOutput(
            "csr listing contained no text before the object dump".to_string(),
        ));
    }
    Ok(body.to_string())
}

fn truncate_for_log(raw: &str) -> &str {
    let end = raw
        .char_indices()
        .nth(120)
        .map(|(i, _)| i)
        .unwrap_or(raw.len());
    &raw[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_csr_text() {
        let raw = "-----BEGIN CERTIFICATE REQUEST-----\nabc\n-----END CERTIFICATE REQUEST-----\nsys crypto csr app1 {\n}\n";
        let text = extract_csr_text(raw).unwrap();
        assert!(text.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
        assert!(text.ends_with("-----END CERTIFICATE REQUEST-----"));
    }

    #[test]
    fn test_extract_csr_text_missing_marker() {
        let err = extract_csr_text("some unrelated output").unwrap_err();
        assert!(matches!(err, BigipError::CommandOutput(_)));
    }

    #[test]
    fn test_extract_csr_text_empty_body() {
        let err = extract_csr_text("\nsys crypto csr app1 {\n}\n").unwrap_err();
        assert!(matches!(err, BigipError::CommandOutput(_)));
    }

    #[test]
    fn test_csr_spec_wire_names() {
        let spec = CsrSpec::new("app1", "app1.example.com");
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["name"], "app1");
        assert_eq!(value["commonName"], "app1.example.com");
        assert_eq!(value["keySize"], 2048);
        assert_eq!(value["keyType"], "rsa-private");
    }
}
