//! Blob storage data-plane client with Shared Key Lite request signing.
//!
//! Only the three operations the probes need: enable static website, create
//! a public container, put a blob.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, instrument};

use crate::error::{ProviderError, ProviderResult};

type HmacSha256 = Hmac<Sha256>;

const STORAGE_API_VERSION: &str = "2021-08-06";

/// Data-plane client bound to one storage account and its shared key.
pub struct BlobClient {
    http: reqwest::Client,
    account: String,
    endpoint: String,
    access_key: String,
}

impl BlobClient {
    pub fn new(
        http: reqwest::Client,
        account: String,
        endpoint: String,
        access_key: String,
    ) -> Self {
        Self {
            http,
            account,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_key,
        }
    }

    /// Shared Key Lite string-to-sign for the blob service:
    /// verb, Content-MD5, Content-Type, Date, canonicalized x-ms headers,
    /// canonicalized resource (`/account/path`, plus `comp` if present).
    fn sign(
        &self,
        verb: &str,
        content_type: &str,
        ms_headers: &[(String, String)],
        path: &str,
        comp: Option<&str>,
    ) -> ProviderResult<String> {
        let mut canonical_headers: Vec<(String, String)> = ms_headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        canonical_headers.sort();
        let canonical_headers: String = canonical_headers
            .iter()
            .map(|(k, v)| format!("{k}:{v}\n"))
            .collect();

        let mut canonical_resource = format!("/{}{}", self.account, path);
        if let Some(comp) = comp {
            canonical_resource.push_str("?comp=");
            canonical_resource.push_str(comp);
        }

        let string_to_sign =
            format!("{verb}\n\n{content_type}\n\n{canonical_headers}{canonical_resource}");

        let key = BASE64.decode(&self.access_key).map_err(|e| {
            ProviderError::InvalidResponse(format!("access key is not valid base64: {e}"))
        })?;
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&key)
            .map_err(|e| ProviderError::InvalidResponse(format!("HMAC init: {e}")))?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());

        Ok(format!("SharedKeyLite {}:{}", self.account, signature))
    }

    async fn signed_put(
        &self,
        path: &str,
        query: &str,
        comp: Option<&str>,
        content_type: &str,
        extra_headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> ProviderResult<()> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();

        let mut ms_headers = vec![
            ("x-ms-date".to_string(), date),
            ("x-ms-version".to_string(), STORAGE_API_VERSION.to_string()),
        ];
        ms_headers.extend(extra_headers);

        let authorization = self.sign("PUT", content_type, &ms_headers, path, comp)?;

        let url = format!("{}{}{}", self.endpoint, path, query);
        let mut request = self
            .http
            .put(&url)
            .header(reqwest::header::AUTHORIZATION, authorization);
        if !content_type.is_empty() {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        for (name, value) in &ms_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.body(body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message });
        }
        Ok(())
    }

    /// Turn on static-website serving for the account.
    #[instrument(skip(self))]
    pub async fn set_static_website(
        &self,
        index_document: &str,
        error_document: &str,
    ) -> ProviderResult<()> {
        let body = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
             <StorageServiceProperties>\
             <StaticWebsite>\
             <Enabled>true</Enabled>\
             <IndexDocument>{index_document}</IndexDocument>\
             <ErrorDocument404Path>{error_document}</ErrorDocument404Path>\
             </StaticWebsite>\
             </StorageServiceProperties>"
        );

        self.signed_put(
            "/",
            "?restype=service&comp=properties",
            Some("properties"),
            "application/xml",
            vec![],
            body.into_bytes(),
        )
        .await?;

        debug!(account = %self.account, "Static website enabled");
        Ok(())
    }

    /// Create a container with container-level public read access.
    #[instrument(skip(self))]
    pub async fn create_container(&self, container: &str) -> ProviderResult<()> {
        self.signed_put(
            &format!("/{container}"),
            "?restype=container",
            None,
            "",
            vec![(
                "x-ms-blob-public-access".to_string(),
                "container".to_string(),
            )],
            Vec::new(),
        )
        .await?;

        debug!(account = %self.account, container, "Container created");
        Ok(())
    }

    /// Upload one block blob.
    #[instrument(skip(self, content))]
    pub async fn put_blob(
        &self,
        container: &str,
        blob_name: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> ProviderResult<()> {
        self.signed_put(
            &format!("/{container}/{blob_name}"),
            "",
            None,
            content_type,
            vec![("x-ms-blob-type".to_string(), "BlockBlob".to_string())],
            content,
        )
        .await?;

        debug!(account = %self.account, container, blob = blob_name, "Blob uploaded");
        Ok(())
    }
}
