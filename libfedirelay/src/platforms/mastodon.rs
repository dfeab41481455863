//! Mastodon destination implementation
//!
//! This module provides integration with Mastodon and other Fediverse servers
//! using the megalodon library. Any server implementing the Mastodon client
//! API (Pleroma, Akkoma, GoToSocial, ...) works.

use std::path::Path;

use async_trait::async_trait;
use megalodon::entities::{StatusVisibility, UploadMedia};
use megalodon::megalodon::{PostStatusInputOptions, PostStatusOutput};
use megalodon::{Megalodon, SNS};

use crate::config::{read_secret, MastodonAccountConfig};
use crate::error::{PlatformError, Result};
use crate::platforms::Destination;
use crate::types::Visibility;

/// Mastodon account client
pub struct MastodonClient {
    /// Account name from the configuration
    name: String,

    /// The megalodon client for API interactions
    client: Box<dyn Megalodon + Send + Sync>,

    /// The instance URL (e.g., "https://mastodon.social")
    instance_url: String,
}

impl MastodonClient {
    /// Create a new Mastodon client
    ///
    /// # Arguments
    ///
    /// * `name` - Account name used by the channel mappings
    /// * `instance_url` - The base URL of the instance (e.g., "https://mastodon.social")
    /// * `access_token` - OAuth access token for authentication
    pub fn new(name: &str, instance_url: String, access_token: String) -> Result<Self> {
        let instance_url = normalize_instance_url(&instance_url);

        let client = megalodon::generator(
            SNS::Mastodon,
            instance_url.clone(),
            Some(access_token),
            None,
        )
        .map_err(|e| {
            PlatformError::Authentication(format!("Failed to create Mastodon client: {:?}", e))
        })?;

        Ok(Self {
            name: name.to_string(),
            client,
            instance_url,
        })
    }

    /// Create a Mastodon client from an account configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Neither `access_token` nor `token_file` is set
    /// - The token file cannot be read or is empty
    pub fn from_config(config: &MastodonAccountConfig) -> Result<Self> {
        let label = format!("mastodon.accounts.{}.access_token", config.name);
        let token = read_secret(
            config.access_token.as_deref(),
            config.token_file.as_deref(),
            &label,
        )
        .map_err(|e| {
            PlatformError::Authentication(format!(
                "Mastodon credentials for '{}' unavailable: {}",
                config.name, e
            ))
        })?;

        Self::new(&config.name, config.instance.clone(), token)
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }
}

#[async_trait]
impl Destination for MastodonClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authenticate(&self) -> Result<()> {
        self.client
            .verify_account_credentials()
            .await
            .map_err(|e| map_megalodon_error(e, "authenticate"))?;

        Ok(())
    }

    async fn upload_media(&self, path: &Path) -> Result<String> {
        let response = self
            .client
            .upload_media(path.to_string_lossy().to_string(), None)
            .await
            .map_err(|e| match map_megalodon_error(e, "upload media") {
                auth @ PlatformError::Authentication(_) => auth,
                other => PlatformError::Media(other.to_string()),
            })?;

        let media_id = match response.json {
            UploadMedia::Attachment(attachment) => attachment.id,
            UploadMedia::AsyncAttachment(attachment) => attachment.id,
        };

        Ok(media_id)
    }

    async fn create_post(
        &self,
        text: &str,
        media_id: Option<&str>,
        visibility: Option<Visibility>,
    ) -> Result<String> {
        let options = PostStatusInputOptions {
            media_ids: media_id.map(|id| vec![id.to_string()]),
            visibility: visibility.map(status_visibility),
            ..Default::default()
        };

        self.post_status(text, options, "post status").await
    }

    async fn create_reply(
        &self,
        text: &str,
        in_reply_to: &str,
        visibility: Option<Visibility>,
    ) -> Result<String> {
        let options = PostStatusInputOptions {
            in_reply_to_id: Some(in_reply_to.to_string()),
            visibility: visibility.map(status_visibility),
            ..Default::default()
        };

        self.post_status(text, options, "post reply").await
    }
}

impl MastodonClient {
    async fn post_status(
        &self,
        text: &str,
        options: PostStatusInputOptions,
        context: &str,
    ) -> Result<String> {
        let response = self
            .client
            .post_status(text.to_string(), Some(&options))
            .await
            .map_err(|e| map_megalodon_error(e, context))?;

        // PostStatusOutput is an enum, we need to match on it
        let post_id = match response.json {
            PostStatusOutput::Status(status) => status.id,
            PostStatusOutput::ScheduledStatus(scheduled) => scheduled.id,
        };

        Ok(post_id)
    }
}

/// Ensure the instance URL carries a scheme, defaulting to https
fn normalize_instance_url(instance: &str) -> String {
    let trimmed = instance.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

fn status_visibility(visibility: Visibility) -> StatusVisibility {
    match visibility {
        Visibility::Public => StatusVisibility::Public,
        Visibility::Unlisted => StatusVisibility::Unlisted,
        Visibility::Private => StatusVisibility::Private,
        Visibility::Direct => StatusVisibility::Direct,
    }
}

/// Map megalodon errors to PlatformError
///
/// # Error Mapping
///
/// - HTTP 401/403 → `PlatformError::Authentication` (OAuth token issues)
/// - HTTP 422 → `PlatformError::Validation` (e.g. post longer than the instance allows)
/// - HTTP 429 → `PlatformError::RateLimit`
/// - HTTP 5xx → `PlatformError::Network` (server errors)
/// - Parse errors → `PlatformError::Posting`
/// - Other errors → `PlatformError::Network` (network/connection issues)
fn map_megalodon_error(error: megalodon::error::Error, context: &str) -> PlatformError {
    classify_error(&error.to_string(), context)
}

fn classify_error(error_str: &str, context: &str) -> PlatformError {
    let error_lower = error_str.to_lowercase();

    match extract_http_status(error_str) {
        Some(401) | Some(403) => PlatformError::Authentication(format!(
            "Mastodon authentication failed ({}): {}. \
                    Suggestion: Verify the access token is valid and has not been revoked.",
            context, error_str
        )),
        Some(422) => PlatformError::Validation(format!(
            "Mastodon validation failed ({}): {}. \
                    Suggestion: Check post_size_limit against the instance's character limit.",
            context, error_str
        )),
        Some(429) => PlatformError::RateLimit(format!(
            "Mastodon rate limit exceeded ({}): {}",
            context, error_str
        )),
        Some(500..=599) => PlatformError::Network(format!(
            "Mastodon server error ({}): {}",
            context, error_str
        )),
        Some(_) => {
            PlatformError::Network(format!("Mastodon HTTP error ({}): {}", context, error_str))
        }
        None => {
            if error_lower.contains("unauthorized")
                || error_lower.contains("forbidden")
                || error_lower.contains("authentication")
                || error_lower.contains("token")
            {
                PlatformError::Authentication(format!(
                    "Mastodon authentication failed ({}): {}",
                    context, error_str
                ))
            } else if error_lower.contains("parse")
                || error_lower.contains("json")
                || error_lower.contains("deserialize")
            {
                PlatformError::Posting(format!(
                    "Mastodon response parse error ({}): {}",
                    context, error_str
                ))
            } else if error_lower.contains("rate limit")
                || error_lower.contains("too many requests")
            {
                PlatformError::RateLimit(format!(
                    "Mastodon rate limit exceeded ({}): {}",
                    context, error_str
                ))
            } else if error_lower.contains("validation") || error_lower.contains("unprocessable") {
                PlatformError::Validation(format!(
                    "Mastodon validation failed ({}): {}",
                    context, error_str
                ))
            } else {
                PlatformError::Network(format!("Mastodon error ({}): {}", context, error_str))
            }
        }
    }
}

/// Extract HTTP status code from error message
///
/// Looks for patterns like "HTTP 401", "status 403", "401:", etc.
fn extract_http_status(error_str: &str) -> Option<u16> {
    let prefixes = ["HTTP ", "status ", "code: ", "status_code: "];

    for prefix in &prefixes {
        if let Some(pos) = error_str.find(prefix) {
            let after_prefix = &error_str[pos + prefix.len()..];
            if let Some(code) = after_prefix.get(0..3).and_then(|s| s.parse::<u16>().ok()) {
                if (100..=599).contains(&code) {
                    return Some(code);
                }
            }
        }
    }

    // Standalone 3-digit codes followed by colon or space
    let bytes = error_str.as_bytes();
    for (i, window) in bytes.windows(4).enumerate() {
        let is_code = window[..3].iter().all(u8::is_ascii_digit)
            && (window[3] == b':' || window[3] == b' ')
            && (i == 0 || !bytes[i - 1].is_ascii_digit());
        if !is_code {
            continue;
        }
        if let Some(code) = std::str::from_utf8(&window[..3])
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
        {
            if (100..=599).contains(&code) {
                return Some(code);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn account_config(
        token_file: Option<String>,
        access_token: Option<&str>,
    ) -> MastodonAccountConfig {
        MastodonAccountConfig {
            name: "main".to_string(),
            instance: "mastodon.social".to_string(),
            access_token: access_token.map(str::to_string),
            token_file,
            visibility: None,
            post_size_limit: 500,
        }
    }

    #[test]
    fn test_mastodon_client_creation() {
        let client = MastodonClient::new(
            "main",
            "https://mastodon.social".to_string(),
            "test-token".to_string(),
        )
        .expect("Failed to create client");

        assert_eq!(client.name(), "main");
        assert_eq!(client.instance_url(), "https://mastodon.social");
    }

    #[test]
    fn test_instance_url_normalization() {
        assert_eq!(normalize_instance_url("mastodon.social"), "https://mastodon.social");
        assert_eq!(normalize_instance_url("https://mastodon.social/"), "https://mastodon.social");
        assert_eq!(normalize_instance_url("http://localhost:3000"), "http://localhost:3000");
    }

    #[test]
    fn test_from_config_inline_token() {
        let client = MastodonClient::from_config(&account_config(None, Some("inline-token")))
            .expect("Failed to create client");
        assert_eq!(client.instance_url(), "https://mastodon.social");
    }

    #[test]
    fn test_from_config_token_file() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        temp_file
            .write_all(b"  test-token-123  \n")
            .expect("Failed to write to temp file");
        temp_file.flush().expect("Failed to flush");
        let temp_path = temp_file.path().to_str().unwrap().to_string();

        let result = MastodonClient::from_config(&account_config(Some(temp_path), None));
        assert!(result.is_ok());
    }

    #[test]
    fn test_from_config_empty_token_file() {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let temp_path = temp_file.path().to_str().unwrap().to_string();

        let result = MastodonClient::from_config(&account_config(Some(temp_path), None));
        match result {
            Err(RelayError::Platform(PlatformError::Authentication(msg))) => {
                assert!(msg.contains("empty"));
                assert!(msg.contains("main"));
            }
            _ => panic!("Expected authentication error for empty token file"),
        }
    }

    #[test]
    fn test_from_config_missing_token_file() {
        let result = MastodonClient::from_config(&account_config(
            Some("/nonexistent/mastodon.token".to_string()),
            None,
        ));
        assert!(matches!(
            result,
            Err(RelayError::Platform(PlatformError::Authentication(_)))
        ));
    }

    #[test]
    fn test_status_visibility_mapping() {
        assert!(matches!(status_visibility(Visibility::Public), StatusVisibility::Public));
        assert!(matches!(status_visibility(Visibility::Unlisted), StatusVisibility::Unlisted));
        assert!(matches!(status_visibility(Visibility::Private), StatusVisibility::Private));
        assert!(matches!(status_visibility(Visibility::Direct), StatusVisibility::Direct));
    }

    #[test]
    fn test_extract_http_status_with_http_prefix() {
        assert_eq!(extract_http_status("HTTP 401 Unauthorized"), Some(401));
        assert_eq!(extract_http_status("HTTP 422 Unprocessable Entity"), Some(422));
        assert_eq!(extract_http_status("HTTP 500 Internal Server Error"), Some(500));
    }

    #[test]
    fn test_extract_http_status_with_status_prefix() {
        assert_eq!(extract_http_status("status 401"), Some(401));
        assert_eq!(extract_http_status("Received status 429 from server"), Some(429));
    }

    #[test]
    fn test_extract_http_status_with_colon() {
        assert_eq!(extract_http_status("Error: 401: Unauthorized"), Some(401));
        assert_eq!(extract_http_status("Failed with 422: validation error"), Some(422));
    }

    #[test]
    fn test_extract_http_status_no_code() {
        assert_eq!(extract_http_status("Network error"), None);
        assert_eq!(extract_http_status("HTTP 999"), None);
        assert_eq!(extract_http_status("1234"), None);
    }

    #[test]
    fn test_classify_error_by_status() {
        assert!(matches!(
            classify_error("HTTP 401 Unauthorized", "post status"),
            PlatformError::Authentication(_)
        ));
        assert!(matches!(
            classify_error("HTTP 422 Unprocessable Entity", "post reply"),
            PlatformError::Validation(_)
        ));
        assert!(matches!(
            classify_error("HTTP 429 Too Many Requests", "post status"),
            PlatformError::RateLimit(_)
        ));
        assert!(matches!(
            classify_error("HTTP 503 Service Unavailable", "upload media"),
            PlatformError::Network(_)
        ));
    }

    #[test]
    fn test_classify_error_by_message() {
        assert!(matches!(
            classify_error("invalid token supplied", "authenticate"),
            PlatformError::Authentication(_)
        ));
        assert!(matches!(
            classify_error("failed to parse json body", "post status"),
            PlatformError::Posting(_)
        ));
        assert!(matches!(
            classify_error("connection reset by peer", "post status"),
            PlatformError::Network(_)
        ));
    }

    #[test]
    fn test_classify_error_includes_context() {
        let error = classify_error("HTTP 422 Unprocessable Entity", "post reply");
        let message = error.to_string();
        assert!(message.contains("post reply"));
        assert!(message.contains("post_size_limit"));
    }
}
