//! AS3 application declaration client
//!
//! Declarations are posted whole to a tenant/application scope and replace
//! whatever the device holds for that identity. There is no patch semantics
//! and no client-side versioning beyond the on-disk snapshot.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::client::DeviceClient;
use crate::errors::{BigipError, DeleteOutcome};

#[derive(Debug, Deserialize)]
struct As3Settings {
    #[serde(rename = "perAppDeploymentAllowed")]
    per_app_deployment_allowed: bool,
}

/// Factory default profile names, per profile type, that inventory listings
/// filter out.
fn default_profiles(profile_type: &str) -> &'static [&'static str] {
    match profile_type {
        "tcp" => &[
            "apm-forwarding-client-tcp",
            "apm-forwarding-server-tcp",
            "f5-tcp-lan",
            "f5-tcp-mobile",
            "f5-tcp-progressive",
            "f5-tcp-wan",
            "mptcp-mobile-optimized",
            "splitsession-default-tcp",
            "tcp",
            "tcp-lan-optimized",
            "tcp-legacy",
            "tcp-mobile-optimized",
            "tcp-wan-optimized",
            "wom-tcp-lan-optimized",
            "wom-tcp-wan-optimized",
        ],
        "http" => &["http", "http-explicit", "http-transparent"],
        "client-ssl" => &[
            "clientssl",
            "clientssl-insecure-compatible",
            "clientssl-quic",
            "clientssl-secure",
            "crypto-server-default-clientssl",
            "splitsession-default-clientssl",
            "wom-default-clientssl",
        ],
        "server-ssl" => &[
            "apm-default-serverssl",
            "cloud-service-default-ssl",
            "crypto-client-default-serverssl",
            "do-not-remove-without-replacement",
            "f5aas-default-ssl",
            "pcoip-default-serverssl",
            "serverssl",
            "serverssl-insecure-compatible",
            "serverssl-secure",
            "shape-api-ssl",
            "splitsession-default-serverssl",
            "wom-default-serverssl",
        ],
        _ => &[],
    }
}

#[derive(Debug, Deserialize)]
struct ProfileListing {
    #[serde(default)]
    items: Vec<ProfileItem>,
}

#[derive(Debug, Deserialize)]
struct ProfileItem {
    name: String,
}

impl DeviceClient {
    /// Make sure per-application deployment is enabled on the device.
    ///
    /// Idempotent: the flag is read first and only written when off. Runs at
    /// most once per client instance and always before the first per-app
    /// declaration post.
    pub async fn ensure_per_app_deployment(&self) -> Result<(), BigipError> {
        self.per_app_checked
            .get_or_try_init(|| async {
                let settings: As3Settings = self.get("/mgmt/shared/appsvcs/settings").await?;
                if !settings.per_app_deployment_allowed {
                    info!("Enabling per-application deployment");
                    self.post(
                        "/mgmt/shared/appsvcs/settings",
                        &serde_json::json!({ "perAppDeploymentAllowed": true }),
                    )
                    .await?;
                }
                Ok::<(), BigipError>(())
            })
            .await?;
        Ok(())
    }

    /// Post an application declaration to a tenant. Replace semantics:
    /// the same (tenant, app) identity overwrites server state.
    pub async fn post_application(
        &self,
        tenant: &str,
        declaration: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>, BigipError> {
        self.ensure_per_app_deployment().await?;
        debug!("Posting declaration to tenant {}", tenant);
        self.post(
            &format!("/mgmt/shared/appsvcs/declare/{}/applications", tenant),
            declaration,
        )
        .await
    }

    /// Fetch the declaration for one application.
    pub async fn get_application(
        &self,
        tenant: &str,
        app_name: &str,
    ) -> Result<serde_json::Value, BigipError> {
        self.get(&format!(
            "/mgmt/shared/appsvcs/declare/{}/applications/{}",
            tenant, app_name
        ))
        .await
    }

    /// Delete one application declaration. Idempotent.
    pub async fn delete_application(
        &self,
        tenant: &str,
        app_name: &str,
    ) -> Result<DeleteOutcome, BigipError> {
        self.delete(&format!(
            "/mgmt/shared/appsvcs/declare/{}/applications/{}",
            tenant, app_name
        ))
        .await
    }

    /// Write a pretty-printed snapshot of a fetched declaration to
    /// `{app_name}_saved.json` under `dir`. Debugging/audit artifact, not a
    /// primary data path.
    pub async fn snapshot_application(
        &self,
        tenant: &str,
        app_name: &str,
        dir: &Path,
    ) -> Result<PathBuf, BigipError> {
        let declaration = self.get_application(tenant, app_name).await?;
        let path = dir.join(format!("{}_saved.json", app_name));
        let contents = serde_json::to_string_pretty(&declaration)?;
        tokio::fs::write(&path, contents).await?;
        info!("Saved declaration snapshot to {}", path.display());
        Ok(path)
    }

    /// List non-factory profiles of one type (tcp, http, client-ssl,
    /// server-ssl).
    pub async fn list_custom_profiles(
        &self,
        profile_type: &str,
    ) -> Result<Vec<String>, BigipError> {
        let listing: ProfileListing = self
            .get(&format!("/mgmt/tm/ltm/profile/{}", profile_type))
            .await?;
        let defaults = default_profiles(profile_type);
        Ok(listing
            .items
            .into_iter()
            .map(|item| item.name)
            .filter(|name| !defaults.contains(&name.as_str()))
            .collect())
    }
}
