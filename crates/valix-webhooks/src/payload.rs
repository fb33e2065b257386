//! Webhook payload shape and the query-parameter fallback encoding.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Credential fields echoed back to the receiver.
///
/// The secret travels in clear here on purpose: the receiver's job is to
/// persist credentials that just proved themselves. This struct exists only
/// to build the payload snapshot and must never be logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsOut {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub subscription_id: String,
    pub valid: bool,
}

/// The notification body, snapshotted once per delivery group and replayed
/// verbatim on every retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub validation_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub credentials: CredentialsOut,
    pub permissions: BTreeMap<String, bool>,
    pub errors: Vec<String>,
    pub storage_account_created: Option<String>,
    pub website_url: Option<String>,
    pub test_config: serde_json::Value,
}

/// Probe names carried as individual flags in the fallback encoding.
const PERMISSION_PARAMS: &[&str] = &[
    "resource_group_create",
    "storage_account_create",
    "blob_container_create",
    "blob_upload",
    "static_website_enable",
    "storage_account_delete",
];

/// Flatten a payload snapshot into query parameters for the read-style
/// fallback transport.
///
/// Nested objects contribute individual top-level parameters (`credentials`
/// becomes `tenant_id`, `client_secret`, `credentials_valid`, ...); missing
/// values become empty strings and arrays are JSON-stringified inline. This
/// is the shape fallback receivers parse, so every key is always present.
#[must_use]
pub fn flatten_to_query_params(payload: &serde_json::Value) -> Vec<(String, String)> {
    let credentials = &payload["credentials"];
    let test_config = &payload["test_config"];
    let permissions = &payload["permissions"];

    let mut params = vec![
        ("validation_id", text(payload, "validation_id")),
        ("timestamp", text(payload, "timestamp")),
        ("status", text(payload, "status")),
        ("tenant_id", text(credentials, "tenant_id")),
        ("client_id", text(credentials, "client_id")),
        ("client_secret", text(credentials, "client_secret")),
        ("display_name", text(credentials, "display_name")),
        ("subscription_id", text(credentials, "subscription_id")),
        ("credentials_valid", flag(credentials, "valid")),
    ];
    for probe in PERMISSION_PARAMS.iter().copied() {
        params.push((probe, flag(permissions, probe)));
    }
    params.extend([
        (
            "storage_account_created",
            text(payload, "storage_account_created"),
        ),
        ("website_url", text(payload, "website_url")),
        ("resource_group", text(test_config, "resource_group")),
        ("location", text(test_config, "location")),
        ("test_files", inline_json(test_config, "test_files")),
        ("errors", inline_json(payload, "errors")),
    ]);

    params
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn text(object: &serde_json::Value, key: &str) -> String {
    match object.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn flag(object: &serde_json::Value, key: &str) -> String {
    object
        .get(key)
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
        .to_string()
}

fn inline_json(object: &serde_json::Value, key: &str) -> String {
    match object.get(key) {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(value) => value.to_string(),
    }
}
