//! Probe input and report types.

use std::collections::BTreeMap;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Probe names as they appear in the permissions map and webhook payload.
pub mod probes {
    pub const RESOURCE_GROUP_CREATE: &str = "resource_group_create";
    pub const STORAGE_ACCOUNT_CREATE: &str = "storage_account_create";
    pub const STATIC_WEBSITE_ENABLE: &str = "static_website_enable";
    pub const BLOB_CONTAINER_CREATE: &str = "blob_container_create";
    pub const BLOB_UPLOAD: &str = "blob_upload";
    pub const STORAGE_ACCOUNT_DELETE: &str = "storage_account_delete";
}

/// Service-principal credentials under test.
///
/// The secret is held as a [`SecretString`] so it never appears in logs or
/// debug output; it is exposed only at the token request and in the webhook
/// payload, both deliberate.
#[derive(Clone, Deserialize)]
pub struct ServicePrincipalCredentials {
    /// Azure AD tenant (directory) id.
    pub tenant_id: String,

    /// Application (client) id.
    pub client_id: String,

    /// Client secret.
    pub client_secret: SecretString,

    /// Optional display name, echoed back in notifications.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl std::fmt::Debug for ServicePrincipalCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicePrincipalCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .finish()
    }
}

fn default_resource_group() -> String {
    "validation-rg".to_string()
}

fn default_location() -> String {
    "eastus".to_string()
}

fn default_test_files() -> Vec<String> {
    vec!["index.html".to_string(), "404.html".to_string()]
}

/// Per-request probe parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    /// Resource group created or verified by the mandatory probe.
    #[serde(default = "default_resource_group")]
    pub resource_group: String,

    /// Azure region for created resources.
    #[serde(default = "default_location")]
    pub location: String,

    /// Payload files uploaded by the blob-upload probe.
    #[serde(default = "default_test_files")]
    pub test_files: Vec<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            resource_group: default_resource_group(),
            location: default_location(),
            test_files: default_test_files(),
        }
    }
}

/// Structured outcome of one probe run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeReport {
    /// True iff the required probes (resource group, storage account, blob
    /// container, blob upload) all succeeded.
    pub is_valid: bool,

    /// Probe name -> outcome. Empty when the mandatory probe aborted the
    /// run; otherwise every probe in the sequence has an entry, with probes
    /// skipped over a failed dependency (or disabled cleanup) recorded as
    /// `false`.
    pub permissions: BTreeMap<String, bool>,

    /// Ordered, append-only failure descriptions, each prefixed with the
    /// probe that produced it.
    pub errors: Vec<String>,

    /// Name of the storage account created by the run, if any.
    pub storage_account_name: Option<String>,

    /// Static-website endpoint of the created account, trailing `/` trimmed.
    pub website_url: Option<String>,
}

impl ProbeReport {
    /// Minimal report for a mandatory-probe abort: no permissions recorded
    /// beyond the failure, exactly one error entry.
    #[must_use]
    pub fn aborted(error: String) -> Self {
        Self {
            is_valid: false,
            permissions: BTreeMap::new(),
            errors: vec![error],
            storage_account_name: None,
            website_url: None,
        }
    }

    /// Whether a named probe succeeded.
    #[must_use]
    pub fn passed(&self, probe: &str) -> bool {
        self.permissions.get(probe).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let creds = ServicePrincipalCredentials {
            tenant_id: "t".into(),
            client_id: "c".into(),
            client_secret: SecretString::new("super-secret".into()),
            display_name: None,
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_test_config_defaults() {
        let config: TestConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.resource_group, "validation-rg");
        assert_eq!(config.location, "eastus");
        assert_eq!(config.test_files, vec!["index.html", "404.html"]);
    }

    #[test]
    fn test_aborted_report_shape() {
        let report = ProbeReport::aborted("Resource group creation failed: denied".to_string());
        assert!(!report.is_valid);
        assert!(report.permissions.is_empty());
        assert_eq!(report.errors.len(), 1);
    }
}
