//! Media publisher abstraction
//!
//! The publish orchestrator drives Instagram's two-phase protocol through
//! this trait: create a media container, wait for the platform to process
//! it, then publish. The real client talks to the Graph API; the mock is
//! used by tests to script outcomes.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Credential;

pub mod graph;
pub mod mock;

pub use graph::GraphApiPublisher;
pub use mock::MockPublisher;

/// Processing state of a media container, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    /// Media processed; ready to publish.
    Finished,
    /// Still processing; poll again.
    InProgress,
    /// Platform rejected the media.
    Error,
}

/// Remote publish operations against the target platform.
///
/// Every method maps onto a single remote call and fails with
/// `PublishError::Transient` (network, 5xx, rate limit) or
/// `PublishError::Terminal` (platform rejected the request).
#[async_trait]
pub trait MediaPublisher: Send + Sync {
    /// Create a media container for the given slides and caption.
    ///
    /// A single URL creates an image container; multiple URLs create
    /// per-slide child containers plus a carousel parent. Returns the
    /// creation id used for status polling and publishing.
    async fn create_container(
        &self,
        credential: &Credential,
        image_urls: &[String],
        caption: &str,
    ) -> Result<String>;

    /// Check whether a container has finished processing.
    async fn container_status(
        &self,
        credential: &Credential,
        creation_id: &str,
    ) -> Result<ContainerStatus>;

    /// Publish a processed container. Returns the final media id.
    ///
    /// This call is authoritative: it rejects containers that are not
    /// actually ready, which is why status polling is best-effort.
    async fn publish(&self, credential: &Credential, creation_id: &str) -> Result<String>;
}
