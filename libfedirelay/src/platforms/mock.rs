//! Mock destination implementation for testing
//!
//! This module provides a configurable mock account that records every call
//! and can fail uploads or a specific post of a chain. It's designed for
//! integration tests of the relay pipeline without network access.

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::platforms::Destination;
use crate::types::Visibility;

/// A call received by a [`MockDestination`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Upload {
        /// File contents at upload time
        content: Vec<u8>,
    },
    Post {
        id: String,
        text: String,
        media_id: Option<String>,
        visibility: Option<Visibility>,
    },
    Reply {
        id: String,
        text: String,
        in_reply_to: String,
        visibility: Option<Visibility>,
    },
}

/// Configuration for mock destination behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Account name
    pub name: String,

    /// Whether authentication should succeed
    pub auth_succeeds: bool,

    /// Error to return from media uploads
    pub upload_error: Option<String>,

    /// Fail the n-th post of a chain (0 = root post), counted across calls
    pub fail_post_at: Option<usize>,

    /// Error to return on posting failure
    pub post_error: String,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,

    /// Calls that have been made (for verification)
    pub calls: Arc<Mutex<Vec<MockCall>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            auth_succeeds: true,
            upload_error: None,
            fail_post_at: None,
            post_error: "Mock posting failed".to_string(),
            delay: Duration::from_millis(0),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock destination for testing
pub struct MockDestination {
    config: MockConfig,
}

impl MockDestination {
    /// Create a new mock destination with the given configuration
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Create a mock destination that always succeeds
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Create a mock destination whose n-th post (0 = root) fails
    pub fn post_failure_at(name: &str, index: usize, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            fail_post_at: Some(index),
            post_error: error.to_string(),
            ..Default::default()
        })
    }

    /// Create a mock destination that fails media uploads
    pub fn upload_failure(name: &str, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            upload_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// Create a mock destination that rejects its credentials
    pub fn auth_failure(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            auth_succeeds: false,
            ..Default::default()
        })
    }

    /// Create a mock destination with a delay before every call
    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            delay,
            ..Default::default()
        })
    }

    /// All calls received so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.config
            .calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Texts of created posts and replies, in order
    pub fn posted_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::Post { text, .. } | MockCall::Reply { text, .. } => Some(text),
                MockCall::Upload { .. } => None,
            })
            .collect()
    }

    /// Number of media uploads received
    pub fn upload_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, MockCall::Upload { .. }))
            .count()
    }

    fn record(&self, call: MockCall) {
        if let Ok(mut calls) = self.config.calls.lock() {
            calls.push(call);
        }
    }

    /// Index of the next post or reply
    fn next_post_index(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| !matches!(call, MockCall::Upload { .. }))
            .count()
    }

    async fn simulate_latency(&self) {
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }
    }

    fn check_post_failure(&self, index: usize) -> Result<()> {
        if self.config.fail_post_at == Some(index) {
            return Err(PlatformError::Posting(self.config.post_error.clone()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl Destination for MockDestination {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn authenticate(&self) -> Result<()> {
        self.simulate_latency().await;

        if self.config.auth_succeeds {
            Ok(())
        } else {
            Err(PlatformError::Authentication("Mock authentication failed".to_string()).into())
        }
    }

    async fn upload_media(&self, path: &Path) -> Result<String> {
        self.simulate_latency().await;

        if let Some(error) = &self.config.upload_error {
            return Err(PlatformError::Media(error.clone()).into());
        }

        let content = tokio::fs::read(path)
            .await
            .map_err(|e| PlatformError::Media(format!("Cannot read {}: {}", path.display(), e)))?;
        self.record(MockCall::Upload { content });

        Ok(format!("{}-media-{}", self.config.name, self.upload_count()))
    }

    async fn create_post(
        &self,
        text: &str,
        media_id: Option<&str>,
        visibility: Option<Visibility>,
    ) -> Result<String> {
        self.simulate_latency().await;

        let index = self.next_post_index();
        self.check_post_failure(index)?;

        let id = format!("{}-{}", self.config.name, index + 1);
        self.record(MockCall::Post {
            id: id.clone(),
            text: text.to_string(),
            media_id: media_id.map(str::to_string),
            visibility,
        });
        Ok(id)
    }

    async fn create_reply(
        &self,
        text: &str,
        in_reply_to: &str,
        visibility: Option<Visibility>,
    ) -> Result<String> {
        self.simulate_latency().await;

        let index = self.next_post_index();
        self.check_post_failure(index)?;

        let id = format!("{}-{}", self.config.name, index + 1);
        self.record(MockCall::Reply {
            id: id.clone(),
            text: text.to_string(),
            in_reply_to: in_reply_to.to_string(),
            visibility,
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_mock_success() {
        let destination = MockDestination::success("test");
        assert_eq!(destination.name(), "test");

        destination.authenticate().await.unwrap();

        let root = destination.create_post("root", None, None).await.unwrap();
        let reply = destination
            .create_reply("reply", &root, Some(Visibility::Unlisted))
            .await
            .unwrap();

        assert_eq!(root, "test-1");
        assert_eq!(reply, "test-2");
        assert_eq!(destination.posted_texts(), vec!["root", "reply"]);
        assert_eq!(
            destination.calls()[1],
            MockCall::Reply {
                id: "test-2".to_string(),
                text: "reply".to_string(),
                in_reply_to: "test-1".to_string(),
                visibility: Some(Visibility::Unlisted),
            }
        );
    }

    #[tokio::test]
    async fn test_mock_post_failure_at_index() {
        let destination = MockDestination::post_failure_at("test", 1, "Network error");

        let root = destination.create_post("root", None, None).await.unwrap();
        let result = destination.create_reply("reply", &root, None).await;

        assert!(result.unwrap_err().to_string().contains("Network error"));
        assert_eq!(destination.posted_texts(), vec!["root"]);
    }

    #[tokio::test]
    async fn test_mock_upload() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"image").unwrap();

        let destination = MockDestination::success("test");
        let media_id = destination.upload_media(file.path()).await.unwrap();

        assert_eq!(media_id, "test-media-1");
        assert_eq!(destination.upload_count(), 1);
        assert_eq!(
            destination.calls()[0],
            MockCall::Upload {
                content: b"image".to_vec()
            }
        );
    }

    #[tokio::test]
    async fn test_mock_upload_failure() {
        let file = NamedTempFile::new().unwrap();
        let destination = MockDestination::upload_failure("test", "too large");

        let result = destination.upload_media(file.path()).await;
        assert!(result.unwrap_err().to_string().contains("too large"));
        assert_eq!(destination.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_auth_failure() {
        let destination = MockDestination::auth_failure("test");
        assert!(destination.authenticate().await.is_err());
    }

    #[tokio::test]
    async fn test_mock_with_delay() {
        let destination = MockDestination::with_delay("test", Duration::from_millis(50));

        let start = std::time::Instant::now();
        destination.create_post("slow", None, None).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
