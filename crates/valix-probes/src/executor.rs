//! Ordered probe execution.
//!
//! The probe sequence is a data-driven list of descriptors; one loop applies
//! the gating rules (mandatory abort, dependency skip, cleanup gate) and
//! records every outcome, so adding a probe means adding a descriptor and an
//! action arm, not new control flow.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::{info, instrument, warn};

use crate::error::ProviderResult;
use crate::provider::{CloudProvider, CloudProviderFactory, StorageAccount};
use crate::types::{probes, ProbeReport, ServicePrincipalCredentials, TestConfig};

/// Container used for the upload probes. `$web` is where Azure serves static
/// website content from.
const WEB_CONTAINER: &str = "$web";

/// One entry in the probe sequence.
struct ProbeDescriptor {
    name: &'static str,
    /// Prefix for error strings this probe contributes to the report.
    error_prefix: &'static str,
    /// A mandatory probe aborts the whole run when it fails.
    mandatory: bool,
    /// Probe that must have passed for this one to be attempted.
    requires: Option<&'static str>,
    /// Only attempted when cleanup is enabled.
    cleanup_gated: bool,
}

const PROBE_SEQUENCE: &[ProbeDescriptor] = &[
    ProbeDescriptor {
        name: probes::RESOURCE_GROUP_CREATE,
        error_prefix: "Resource group creation failed",
        mandatory: true,
        requires: None,
        cleanup_gated: false,
    },
    ProbeDescriptor {
        name: probes::STORAGE_ACCOUNT_CREATE,
        error_prefix: "Storage account creation failed",
        mandatory: false,
        requires: Some(probes::RESOURCE_GROUP_CREATE),
        cleanup_gated: false,
    },
    ProbeDescriptor {
        name: probes::STATIC_WEBSITE_ENABLE,
        error_prefix: "Static website enable failed",
        mandatory: false,
        requires: Some(probes::STORAGE_ACCOUNT_CREATE),
        cleanup_gated: false,
    },
    ProbeDescriptor {
        name: probes::BLOB_CONTAINER_CREATE,
        error_prefix: "Container creation failed",
        mandatory: false,
        requires: Some(probes::STORAGE_ACCOUNT_CREATE),
        cleanup_gated: false,
    },
    ProbeDescriptor {
        name: probes::BLOB_UPLOAD,
        error_prefix: "File upload failed",
        mandatory: false,
        requires: Some(probes::BLOB_CONTAINER_CREATE),
        cleanup_gated: false,
    },
    // Deletion is probed against a throwaway account, so it runs even when
    // the main account probes failed.
    ProbeDescriptor {
        name: probes::STORAGE_ACCOUNT_DELETE,
        error_prefix: "Storage account deletion test failed",
        mandatory: false,
        requires: Some(probes::RESOURCE_GROUP_CREATE),
        cleanup_gated: true,
    },
];

/// Probes whose success a credential needs to count as valid.
const REQUIRED_FOR_VALIDITY: &[&str] = &[
    probes::RESOURCE_GROUP_CREATE,
    probes::STORAGE_ACCOUNT_CREATE,
    probes::BLOB_CONTAINER_CREATE,
    probes::BLOB_UPLOAD,
];

/// Executor-level settings, fixed at service startup.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Whether the deletion probe runs (and tears down the test account).
    pub cleanup_enabled: bool,

    /// Directory holding the payload files uploaded by the blob probe.
    /// Missing files fall back to a generated HTML page.
    pub test_files_dir: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            cleanup_enabled: true,
            test_files_dir: None,
        }
    }
}

/// Runs the probe sequence for one credential against one subscription.
pub struct ProbeExecutor {
    factory: Arc<dyn CloudProviderFactory>,
    config: ExecutorConfig,
}

/// Mutable state threaded through one run.
struct RunState<'a> {
    provider: Arc<dyn CloudProvider>,
    test_config: &'a TestConfig,
    files_dir: Option<&'a PathBuf>,
    account: Option<StorageAccount>,
    website_url: Option<String>,
}

impl ProbeExecutor {
    pub fn new(factory: Arc<dyn CloudProviderFactory>, config: ExecutorConfig) -> Self {
        Self { factory, config }
    }

    /// Run the full probe sequence. Failures are captured in the report,
    /// never raised: the run itself always completes.
    #[instrument(skip(self, credentials, test_config), fields(client_id = %credentials.client_id))]
    pub async fn run(
        &self,
        credentials: &ServicePrincipalCredentials,
        subscription_id: &str,
        test_config: &TestConfig,
    ) -> ProbeReport {
        let provider = self.factory.connect(credentials, subscription_id);
        let mut state = RunState {
            provider,
            test_config,
            files_dir: self.config.test_files_dir.as_ref(),
            account: None,
            website_url: None,
        };

        let mut report = ProbeReport::default();

        for descriptor in PROBE_SEQUENCE {
            if descriptor.cleanup_gated && !self.config.cleanup_enabled {
                report.permissions.insert(descriptor.name.to_string(), false);
                continue;
            }
            if let Some(required) = descriptor.requires {
                if !report.passed(required) {
                    report.permissions.insert(descriptor.name.to_string(), false);
                    continue;
                }
            }

            match Self::execute(descriptor.name, &mut state).await {
                Ok(()) => {
                    report.permissions.insert(descriptor.name.to_string(), true);
                }
                Err(e) => {
                    let error = format!("{}: {}", descriptor.error_prefix, e);
                    if descriptor.mandatory {
                        warn!(probe = descriptor.name, error = %e, "Mandatory probe failed, aborting run");
                        return ProbeReport::aborted(error);
                    }
                    warn!(probe = descriptor.name, error = %e, "Probe failed");
                    report.permissions.insert(descriptor.name.to_string(), false);
                    report.errors.push(error);
                }
            }
        }

        report.is_valid = REQUIRED_FOR_VALIDITY.iter().all(|p| report.passed(p));
        report.storage_account_name = state.account.as_ref().map(|a| a.name.clone());
        report.website_url = state.website_url;

        // With cleanup enabled the main test account is torn down best-effort;
        // otherwise it is deliberately left in place for inspection.
        if self.config.cleanup_enabled {
            if let Some(account) = &state.account {
                if let Err(e) = state
                    .provider
                    .delete_storage_account(&state.test_config.resource_group, &account.name)
                    .await
                {
                    warn!(account = %account.name, error = %e, "Cleanup of test storage account failed");
                }
            }
        }

        info!(
            is_valid = report.is_valid,
            errors = report.errors.len(),
            "Probe run completed"
        );
        report
    }

    async fn execute(name: &str, state: &mut RunState<'_>) -> ProviderResult<()> {
        match name {
            probes::RESOURCE_GROUP_CREATE => {
                state
                    .provider
                    .create_resource_group(
                        &state.test_config.resource_group,
                        &state.test_config.location,
                    )
                    .await
            }
            probes::STORAGE_ACCOUNT_CREATE => {
                let account_name = generate_storage_account_name();
                let account = state
                    .provider
                    .create_storage_account(
                        &state.test_config.resource_group,
                        &account_name,
                        &state.test_config.location,
                    )
                    .await?;
                // The web endpoint is known as soon as the account exists;
                // the static-website probe only decides whether it serves
                // anything.
                state.website_url = account
                    .web_endpoint
                    .as_ref()
                    .map(|url| url.trim_end_matches('/').to_string());
                state.account = Some(account);
                Ok(())
            }
            probes::STATIC_WEBSITE_ENABLE => {
                let account = state.account.as_ref().expect("gated on account creation");
                state.provider.enable_static_website(account).await
            }
            probes::BLOB_CONTAINER_CREATE => {
                let account = state.account.as_ref().expect("gated on account creation");
                state
                    .provider
                    .create_public_container(account, WEB_CONTAINER)
                    .await
            }
            probes::BLOB_UPLOAD => {
                let account = state.account.as_ref().expect("gated on account creation");
                for file_name in &state.test_config.test_files {
                    let content = load_test_file(state.files_dir, file_name).await;
                    let content_type = mime_guess::from_path(file_name)
                        .first_or_octet_stream()
                        .to_string();
                    state
                        .provider
                        .upload_blob(account, WEB_CONTAINER, file_name, content, &content_type)
                        .await?;
                }
                Ok(())
            }
            probes::STORAGE_ACCOUNT_DELETE => {
                // Create-then-delete a throwaway account; the main account's
                // fate is decided by the cleanup pass, not this probe.
                let throwaway = generate_storage_account_name();
                state
                    .provider
                    .create_storage_account(
                        &state.test_config.resource_group,
                        &throwaway,
                        &state.test_config.location,
                    )
                    .await?;
                state
                    .provider
                    .delete_storage_account(&state.test_config.resource_group, &throwaway)
                    .await
            }
            other => unreachable!("unknown probe {other}"),
        }
    }
}

/// Globally-unique storage account name: `azval` + 6 random lowercase
/// alphanumerics + the last 6 digits of the unix timestamp. Stays within
/// Azure's 3-24 lowercase-alphanumeric limit.
pub fn generate_storage_account_name() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let random: String = (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    let timestamp = Utc::now().timestamp() % 1_000_000;
    format!("azval{random}{timestamp:06}")
}

/// Read a payload file from the configured directory, falling back to a
/// generated page when the directory is unset or the file is missing.
async fn load_test_file(dir: Option<&PathBuf>, file_name: &str) -> Vec<u8> {
    if let Some(dir) = dir {
        let path = dir.join(file_name);
        match tokio::fs::read(&path).await {
            Ok(content) => return content,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Test file unreadable, using generated payload");
            }
        }
    }
    format!("<html><body><h1>{file_name}</h1></body></html>").into_bytes()
}
