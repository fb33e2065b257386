//! Azure Resource Manager client for the management-plane probes.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::StorageAccount;

use super::auth::TokenCache;

const RESOURCE_GROUP_API_VERSION: &str = "2021-04-01";
const STORAGE_API_VERSION: &str = "2023-01-01";

/// How long to wait for a storage account to finish provisioning.
const PROVISION_TIMEOUT: Duration = Duration::from_secs(120);
const PROVISION_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    error: Option<ArmErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ArmErrorDetail {
    #[allow(dead_code)]
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageAccountResource {
    properties: Option<StorageAccountProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageAccountProperties {
    provisioning_state: Option<String>,
    primary_endpoints: Option<PrimaryEndpoints>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrimaryEndpoints {
    blob: Option<String>,
    web: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListKeysResponse {
    keys: Vec<StorageKey>,
}

#[derive(Debug, Deserialize)]
struct StorageKey {
    value: String,
}

/// Thin client over the ARM REST surface, scoped to one subscription.
pub struct ArmClient {
    http: reqwest::Client,
    tokens: Arc<TokenCache>,
    management_endpoint: String,
    subscription_id: String,
}

impl ArmClient {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<TokenCache>,
        management_endpoint: String,
        subscription_id: String,
    ) -> Self {
        Self {
            http,
            tokens,
            management_endpoint,
            subscription_id,
        }
    }

    fn subscription_url(&self, path: &str, api_version: &str) -> String {
        format!(
            "{}/subscriptions/{}{}?api-version={}",
            self.management_endpoint, self.subscription_id, path, api_version
        )
    }

    /// Extract a readable message from an ARM error response.
    async fn api_error(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ArmErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .and_then(|e| e.message)
            .unwrap_or(body);
        ProviderError::Api { status, message }
    }

    #[instrument(skip(self))]
    pub async fn create_resource_group(&self, name: &str, location: &str) -> ProviderResult<()> {
        let token = self.tokens.get_token().await?;
        let url = self.subscription_url(
            &format!("/resourcegroups/{name}"),
            RESOURCE_GROUP_API_VERSION,
        );

        let response = self
            .http
            .put(&url)
            .bearer_auth(&token)
            .json(&json!({ "location": location }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        debug!(resource_group = name, "Resource group ready");
        Ok(())
    }

    /// Create a storage account and wait until it is provisioned, then fetch
    /// its endpoints and an access key.
    #[instrument(skip(self))]
    pub async fn create_storage_account(
        &self,
        resource_group: &str,
        name: &str,
        location: &str,
    ) -> ProviderResult<StorageAccount> {
        let token = self.tokens.get_token().await?;
        let path = format!(
            "/resourceGroups/{resource_group}/providers/Microsoft.Storage/storageAccounts/{name}"
        );
        let url = self.subscription_url(&path, STORAGE_API_VERSION);

        let body = json!({
            "sku": { "name": "Standard_LRS" },
            "kind": "StorageV2",
            "location": location,
            "properties": { "allowBlobPublicAccess": true }
        });

        let response = self
            .http
            .put(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        // PUT returns 202 while the account provisions asynchronously; poll
        // the resource until provisioningState reaches Succeeded.
        let resource = self.wait_for_provisioning(&url).await?;

        let endpoints = resource
            .properties
            .and_then(|p| p.primary_endpoints)
            .ok_or_else(|| {
                ProviderError::InvalidResponse("storage account has no endpoints".to_string())
            })?;
        let blob_endpoint = endpoints.blob.ok_or_else(|| {
            ProviderError::InvalidResponse("storage account has no blob endpoint".to_string())
        })?;

        let access_key = self.list_first_key(&path).await?;

        debug!(account = name, "Storage account provisioned");
        Ok(StorageAccount {
            name: name.to_string(),
            blob_endpoint: blob_endpoint.trim_end_matches('/').to_string(),
            web_endpoint: endpoints.web,
            access_key,
        })
    }

    async fn wait_for_provisioning(&self, url: &str) -> ProviderResult<StorageAccountResource> {
        let deadline = tokio::time::Instant::now() + PROVISION_TIMEOUT;

        loop {
            let token = self.tokens.get_token().await?;
            let response = self.http.get(url).bearer_auth(&token).send().await?;

            if response.status().is_success() {
                let resource: StorageAccountResource = response.json().await.map_err(|e| {
                    ProviderError::InvalidResponse(format!("storage account body: {e}"))
                })?;
                let state = resource
                    .properties
                    .as_ref()
                    .and_then(|p| p.provisioning_state.as_deref());
                match state {
                    Some("Succeeded") => return Ok(resource),
                    Some("Failed") | Some("Canceled") => {
                        return Err(ProviderError::InvalidResponse(format!(
                            "storage account provisioning ended in state {}",
                            state.unwrap_or("unknown")
                        )));
                    }
                    other => {
                        debug!(state = ?other, "Storage account still provisioning");
                    }
                }
            } else if response.status() != reqwest::StatusCode::NOT_FOUND {
                return Err(Self::api_error(response).await);
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(ProviderError::OperationTimeout(
                    "storage account provisioning".to_string(),
                ));
            }
            tokio::time::sleep(PROVISION_POLL_INTERVAL).await;
        }
    }

    async fn list_first_key(&self, account_path: &str) -> ProviderResult<String> {
        let token = self.tokens.get_token().await?;
        let url = self.subscription_url(&format!("{account_path}/listKeys"), STORAGE_API_VERSION);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let keys: ListKeysResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("listKeys body: {e}")))?;
        keys.keys
            .into_iter()
            .next()
            .map(|k| k.value)
            .ok_or_else(|| ProviderError::InvalidResponse("listKeys returned no keys".to_string()))
    }

    #[instrument(skip(self))]
    pub async fn delete_storage_account(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<()> {
        let token = self.tokens.get_token().await?;
        let path = format!(
            "/resourceGroups/{resource_group}/providers/Microsoft.Storage/storageAccounts/{name}"
        );
        let url = self.subscription_url(&path, STORAGE_API_VERSION);

        let response = self.http.delete(&url).bearer_auth(&token).send().await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        debug!(account = name, "Storage account deleted");
        Ok(())
    }
}
