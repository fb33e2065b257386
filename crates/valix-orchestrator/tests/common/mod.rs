//! Shared fixtures for orchestration integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use valix_orchestrator::{JobCredentials, SubmitRequest};
use valix_probes::{
    CloudProvider, CloudProviderFactory, ExecutorConfig, ProbeExecutor, ProviderError,
    ProviderResult, ServicePrincipalCredentials, StorageAccount, TestConfig,
};

pub async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for integration tests");
    let pool = PgPool::connect(&url).await.expect("connect to test db");
    valix_db::migrations::run_migrations(&pool)
        .await
        .expect("run migrations");
    pool
}

/// Provider whose probes all succeed, or all fail at the resource group
/// when `denied` is set.
pub struct StubProvider {
    pub denied: bool,
}

#[async_trait]
impl CloudProvider for StubProvider {
    async fn create_resource_group(&self, _name: &str, _location: &str) -> ProviderResult<()> {
        if self.denied {
            return Err(ProviderError::Api {
                status: 403,
                message: "AuthorizationFailed".to_string(),
            });
        }
        Ok(())
    }

    async fn create_storage_account(
        &self,
        _resource_group: &str,
        name: &str,
        _location: &str,
    ) -> ProviderResult<StorageAccount> {
        Ok(StorageAccount {
            name: name.to_string(),
            blob_endpoint: format!("https://{name}.blob.core.windows.net"),
            web_endpoint: Some(format!("https://{name}.z13.web.core.windows.net/")),
            access_key: "ZmFrZS1rZXk=".to_string(),
        })
    }

    async fn enable_static_website(&self, _account: &StorageAccount) -> ProviderResult<()> {
        Ok(())
    }

    async fn create_public_container(
        &self,
        _account: &StorageAccount,
        _container: &str,
    ) -> ProviderResult<()> {
        Ok(())
    }

    async fn upload_blob(
        &self,
        _account: &StorageAccount,
        _container: &str,
        _blob_name: &str,
        _content: Vec<u8>,
        _content_type: &str,
    ) -> ProviderResult<()> {
        Ok(())
    }

    async fn delete_storage_account(
        &self,
        _resource_group: &str,
        _name: &str,
    ) -> ProviderResult<()> {
        Ok(())
    }
}

pub struct StubFactory {
    pub denied: bool,
}

impl CloudProviderFactory for StubFactory {
    fn connect(
        &self,
        _credentials: &ServicePrincipalCredentials,
        _subscription_id: &str,
    ) -> Arc<dyn CloudProvider> {
        Arc::new(StubProvider {
            denied: self.denied,
        })
    }
}

pub fn stub_executor(denied: bool) -> Arc<ProbeExecutor> {
    Arc::new(ProbeExecutor::new(
        Arc::new(StubFactory { denied }),
        ExecutorConfig::default(),
    ))
}

pub fn submit_request(webhook_url: Option<String>) -> SubmitRequest {
    SubmitRequest {
        id: None,
        credentials: JobCredentials {
            tenant_id: "00000000-0000-0000-0000-000000000001".to_string(),
            client_id: "00000000-0000-0000-0000-000000000002".to_string(),
            client_secret: "test-secret".to_string(),
            display_name: Some("Test principal".to_string()),
        },
        subscription_id: "11111111-1111-1111-1111-111111111111".to_string(),
        test_config: TestConfig::default(),
        webhook_url,
    }
}
