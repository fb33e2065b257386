//! Capability provider abstraction.
//!
//! Probes never talk to the cloud SDK surface directly; they go through this
//! narrow trait, which exposes exactly the operations the probe sequence
//! needs. Tests swap in a fake implementation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderResult;
use crate::types::ServicePrincipalCredentials;

/// A storage account created by a probe, with what later probes need to
/// reach its data plane.
#[derive(Clone)]
pub struct StorageAccount {
    /// Globally unique account name.
    pub name: String,

    /// Primary blob endpoint, e.g. `https://{name}.blob.core.windows.net`.
    pub blob_endpoint: String,

    /// Static-website endpoint, when the account exposes one.
    pub web_endpoint: Option<String>,

    /// Shared access key for data-plane requests.
    pub access_key: String,
}

impl std::fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAccount")
            .field("name", &self.name)
            .field("blob_endpoint", &self.blob_endpoint)
            .field("web_endpoint", &self.web_endpoint)
            .field("access_key", &"[REDACTED]")
            .finish()
    }
}

/// The cloud management surface invoked by probes.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Create or verify a resource group.
    async fn create_resource_group(&self, name: &str, location: &str) -> ProviderResult<()>;

    /// Create a storage account and wait for it to be usable.
    async fn create_storage_account(
        &self,
        resource_group: &str,
        name: &str,
        location: &str,
    ) -> ProviderResult<StorageAccount>;

    /// Enable static-website serving on an account.
    async fn enable_static_website(&self, account: &StorageAccount) -> ProviderResult<()>;

    /// Create a blob container with public read access.
    async fn create_public_container(
        &self,
        account: &StorageAccount,
        container: &str,
    ) -> ProviderResult<()>;

    /// Upload one blob.
    async fn upload_blob(
        &self,
        account: &StorageAccount,
        container: &str,
        blob_name: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> ProviderResult<()>;

    /// Delete a storage account.
    async fn delete_storage_account(&self, resource_group: &str, name: &str)
        -> ProviderResult<()>;
}

/// Builds a provider for one credential + subscription pair.
///
/// Construction performs no I/O: authentication is lazy, so a bad secret
/// surfaces on the first probe call, not here.
pub trait CloudProviderFactory: Send + Sync {
    fn connect(
        &self,
        credentials: &ServicePrincipalCredentials,
        subscription_id: &str,
    ) -> Arc<dyn CloudProvider>;
}
