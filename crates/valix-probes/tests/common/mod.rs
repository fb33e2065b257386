//! Shared fixtures for probe tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;

use valix_probes::{
    CloudProvider, CloudProviderFactory, ProviderError, ProviderResult, ServicePrincipalCredentials,
    StorageAccount,
};

/// In-memory provider: every operation succeeds unless its probe name is in
/// the failure set. Calls are recorded for assertions.
#[derive(Default)]
pub struct FakeProvider {
    failures: HashSet<&'static str>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(ops: &[&'static str]) -> Self {
        Self {
            failures: ops.iter().copied().collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn check(&self, op: &'static str) -> ProviderResult<()> {
        self.calls.lock().unwrap().push(op.to_string());
        if self.failures.contains(op) {
            return Err(ProviderError::Api {
                status: 403,
                message: format!("{op} denied"),
            });
        }
        Ok(())
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }
}

#[async_trait]
impl CloudProvider for FakeProvider {
    async fn create_resource_group(&self, _name: &str, _location: &str) -> ProviderResult<()> {
        self.check("create_resource_group")
    }

    async fn create_storage_account(
        &self,
        _resource_group: &str,
        name: &str,
        _location: &str,
    ) -> ProviderResult<StorageAccount> {
        self.check("create_storage_account")?;
        Ok(StorageAccount {
            name: name.to_string(),
            blob_endpoint: format!("https://{name}.blob.core.windows.net"),
            web_endpoint: Some(format!("https://{name}.z13.web.core.windows.net/")),
            access_key: "ZmFrZS1rZXk=".to_string(),
        })
    }

    async fn enable_static_website(&self, _account: &StorageAccount) -> ProviderResult<()> {
        self.check("enable_static_website")
    }

    async fn create_public_container(
        &self,
        _account: &StorageAccount,
        _container: &str,
    ) -> ProviderResult<()> {
        self.check("create_public_container")
    }

    async fn upload_blob(
        &self,
        _account: &StorageAccount,
        _container: &str,
        _blob_name: &str,
        _content: Vec<u8>,
        _content_type: &str,
    ) -> ProviderResult<()> {
        self.check("upload_blob")
    }

    async fn delete_storage_account(
        &self,
        _resource_group: &str,
        _name: &str,
    ) -> ProviderResult<()> {
        self.check("delete_storage_account")
    }
}

/// Factory handing out one shared [`FakeProvider`].
pub struct FakeFactory {
    pub provider: Arc<FakeProvider>,
}

impl FakeFactory {
    pub fn new(provider: Arc<FakeProvider>) -> Arc<Self> {
        Arc::new(Self { provider })
    }
}

impl CloudProviderFactory for FakeFactory {
    fn connect(
        &self,
        _credentials: &ServicePrincipalCredentials,
        _subscription_id: &str,
    ) -> Arc<dyn CloudProvider> {
        self.provider.clone()
    }
}

pub fn test_credentials() -> ServicePrincipalCredentials {
    ServicePrincipalCredentials {
        tenant_id: "00000000-0000-0000-0000-000000000001".to_string(),
        client_id: "00000000-0000-0000-0000-000000000002".to_string(),
        client_secret: SecretString::new("test-secret".to_string()),
        display_name: Some("Test principal".to_string()),
    }
}
