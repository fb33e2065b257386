//! Queued job payload shapes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use valix_probes::TestConfig;

/// Credential fields carried inside a validation job payload.
///
/// The secret rides in clear here because the job row is the only place it
/// lives between submission and probe execution; it never lands in the
/// validations table. Debug output redacts it.
#[derive(Clone, Serialize, Deserialize)]
pub struct JobCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl std::fmt::Debug for JobCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Work order for one probe run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationJobPayload {
    pub validation_id: Uuid,
    pub credentials: JobCredentials,
    pub subscription_id: String,
    #[serde(default)]
    pub test_config: TestConfig,
    pub webhook_url: Option<String>,
}

/// Work order for one webhook delivery group. The delivery row (payload
/// snapshot included) is created before the job is enqueued, so a
/// redelivered job replays the identical notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookJobPayload {
    pub delivery_id: Uuid,
    pub validation_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_credentials_debug_redacts_secret() {
        let creds = JobCredentials {
            tenant_id: "t".to_string(),
            client_id: "c".to_string(),
            client_secret: "super-secret".to_string(),
            display_name: None,
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_validation_payload_defaults_test_config() {
        let payload: ValidationJobPayload = serde_json::from_value(serde_json::json!({
            "validation_id": Uuid::nil(),
            "credentials": {
                "tenant_id": "t",
                "client_id": "c",
                "client_secret": "s"
            },
            "subscription_id": "sub",
            "webhook_url": null
        }))
        .unwrap();
        assert_eq!(payload.test_config.resource_group, "validation-rg");
    }
}
