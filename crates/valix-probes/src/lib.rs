//! Permission probes for Azure service-principal credentials.
//!
//! A credential is proven by exercising it: the [`ProbeExecutor`] runs an
//! ordered sequence of capability checks (resource group, storage account,
//! static website, blob container, blob upload, optional delete) against the
//! target subscription through a narrow [`CloudProvider`] interface and
//! returns a structured [`ProbeReport`].

pub mod azure;
pub mod error;
pub mod executor;
pub mod provider;
pub mod types;

pub use azure::{AzureProvider, AzureProviderFactory};
pub use error::{ProviderError, ProviderResult};
pub use executor::{ExecutorConfig, ProbeExecutor};
pub use provider::{CloudProvider, CloudProviderFactory, StorageAccount};
pub use types::{probes, ProbeReport, ServicePrincipalCredentials, TestConfig};
