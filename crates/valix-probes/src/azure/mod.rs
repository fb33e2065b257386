//! Azure implementation of the capability provider.
//!
//! Management-plane calls (resource groups, storage accounts, containers) go
//! through ARM with an AAD client-credentials token; data-plane calls
//! (static website properties, blob upload) go to the account's blob
//! endpoint signed with its shared access key.

mod arm;
mod auth;
mod blob;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderResult;
use crate::provider::{CloudProvider, CloudProviderFactory, StorageAccount};
use crate::types::ServicePrincipalCredentials;

pub use arm::ArmClient;
pub use auth::TokenCache;
pub use blob::BlobClient;

/// Index document served by the static website probe.
const INDEX_DOCUMENT: &str = "index.html";

/// 404 document served by the static website probe.
const ERROR_DOCUMENT: &str = "404.html";

/// Azure capability provider for one credential + subscription pair.
pub struct AzureProvider {
    arm: ArmClient,
    http: reqwest::Client,
}

impl AzureProvider {
    #[must_use]
    pub fn new(arm: ArmClient, http: reqwest::Client) -> Self {
        Self { arm, http }
    }

    fn blob_client(&self, account: &StorageAccount) -> BlobClient {
        BlobClient::new(
            self.http.clone(),
            account.name.clone(),
            account.blob_endpoint.clone(),
            account.access_key.clone(),
        )
    }
}

#[async_trait]
impl CloudProvider for AzureProvider {
    async fn create_resource_group(&self, name: &str, location: &str) -> ProviderResult<()> {
        self.arm.create_resource_group(name, location).await
    }

    async fn create_storage_account(
        &self,
        resource_group: &str,
        name: &str,
        location: &str,
    ) -> ProviderResult<StorageAccount> {
        self.arm
            .create_storage_account(resource_group, name, location)
            .await
    }

    async fn enable_static_website(&self, account: &StorageAccount) -> ProviderResult<()> {
        self.blob_client(account)
            .set_static_website(INDEX_DOCUMENT, ERROR_DOCUMENT)
            .await
    }

    async fn create_public_container(
        &self,
        account: &StorageAccount,
        container: &str,
    ) -> ProviderResult<()> {
        self.blob_client(account).create_container(container).await
    }

    async fn upload_blob(
        &self,
        account: &StorageAccount,
        container: &str,
        blob_name: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> ProviderResult<()> {
        self.blob_client(account)
            .put_blob(container, blob_name, content, content_type)
            .await
    }

    async fn delete_storage_account(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<()> {
        self.arm.delete_storage_account(resource_group, name).await
    }
}

/// Factory producing [`AzureProvider`] instances against the public Azure
/// endpoints (or custom ones, for tests).
#[derive(Clone)]
pub struct AzureProviderFactory {
    http: reqwest::Client,
    login_endpoint: String,
    management_endpoint: String,
}

impl AzureProviderFactory {
    /// Factory against the public Azure cloud.
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            login_endpoint: "https://login.microsoftonline.com".to_string(),
            management_endpoint: "https://management.azure.com".to_string(),
        }
    }

    /// Override the AAD and ARM endpoints (sovereign clouds, mock servers).
    #[must_use]
    pub fn with_endpoints(mut self, login: String, management: String) -> Self {
        self.login_endpoint = login;
        self.management_endpoint = management;
        self
    }
}

impl CloudProviderFactory for AzureProviderFactory {
    fn connect(
        &self,
        credentials: &ServicePrincipalCredentials,
        subscription_id: &str,
    ) -> Arc<dyn CloudProvider> {
        let token_cache = Arc::new(TokenCache::new(
            credentials.clone(),
            self.login_endpoint.clone(),
            self.management_endpoint.clone(),
            self.http.clone(),
        ));
        let arm = ArmClient::new(
            self.http.clone(),
            token_cache,
            self.management_endpoint.clone(),
            subscription_id.to_string(),
        );
        Arc::new(AzureProvider::new(arm, self.http.clone()))
    }
}
