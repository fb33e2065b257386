//! Destination URL validation.
//!
//! The destination is a trust boundary validated only for well-formedness:
//! the payload deliberately carries the tested secret, so where it goes is
//! the caller's decision, not ours.

use url::Url;

use crate::error::WebhookError;

/// Check that a webhook destination is a parseable http(s) URL.
pub fn validate_webhook_url(raw: &str) -> Result<Url, WebhookError> {
    let url =
        Url::parse(raw).map_err(|e| WebhookError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(WebhookError::InvalidUrl(format!(
            "unsupported scheme {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_and_https() {
        assert!(validate_webhook_url("https://example.com/hook").is_ok());
        assert!(validate_webhook_url("http://10.0.0.5:8080/notify").is_ok());
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(validate_webhook_url("ftp://example.com/hook").is_err());
        assert!(validate_webhook_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(validate_webhook_url("not a url").is_err());
        assert!(validate_webhook_url("").is_err());
    }
}
