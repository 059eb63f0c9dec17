//! Publish orchestrator
//!
//! Drives exactly one claimed post through the two-phase publish protocol
//! and always resolves to a post store write, whatever fails along the way.
//! State machine for a post:
//!
//! ```text
//! pending --(claim)--> in_progress --(success)--> published   [terminal]
//! in_progress --(failure, retry_count < max)--> pending       [retry_count += 1]
//! in_progress --(failure, retry_count >= max)--> failed       [terminal]
//! in_progress --(token expired)--> pending                    [unchanged]
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::PublisherConfig;
use crate::db::Database;
use crate::error::{AutogramError, PublishError, Result};
use crate::publisher::{ContainerStatus, MediaPublisher};
use crate::types::{Credential, Post};

/// How a single publish attempt resolved. The post store has already been
/// updated accordingly by the time this is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { media_id: String },
    /// Attempt failed; retry budget remains, post is pending again.
    Retrying { error: String },
    /// Attempt failed and exhausted the retry budget.
    Failed { error: String },
    /// Token expired; no remote call made, no budget consumed.
    SkippedTokenExpired,
}

/// Optional pre-flight check that an image URL is reachable and actually
/// serves an image.
#[async_trait]
pub trait ImageProber: Send + Sync {
    async fn probe(&self, url: &str) -> Result<()>;
}

pub struct HttpImageProber {
    client: reqwest::Client,
}

impl HttpImageProber {
    pub fn new(timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Transient(format!("HTTP client init failed: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageProber for HttpImageProber {
    async fn probe(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| PublishError::Content(format!("image unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(PublishError::Content(format!(
                "image URL returned {}: {}",
                response.status(),
                url
            ))
            .into());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !content_type.starts_with("image/") {
            return Err(PublishError::Content(format!(
                "URL does not serve an image (content-type {}): {}",
                content_type, url
            ))
            .into());
        }

        Ok(())
    }
}

pub struct Orchestrator {
    db: Database,
    publisher: Arc<dyn MediaPublisher>,
    config: PublisherConfig,
    prober: Option<Arc<dyn ImageProber>>,
}

impl Orchestrator {
    pub fn new(
        db: Database,
        publisher: Arc<dyn MediaPublisher>,
        config: PublisherConfig,
    ) -> Result<Self> {
        let prober: Option<Arc<dyn ImageProber>> = if config.verify_images {
            Some(Arc::new(HttpImageProber::new(config.request_timeout())?))
        } else {
            None
        };

        Ok(Self {
            db,
            publisher,
            config,
            prober,
        })
    }

    /// Replace the image prober (tests).
    pub fn with_prober(mut self, prober: Arc<dyn ImageProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    /// Process one post that has already been claimed (`in_progress`).
    ///
    /// Never leaves the post in `in_progress`: every path ends in a status
    /// write. Errors returned from here are post store failures only.
    pub async fn process(&self, post: &Post, now: i64) -> Result<PublishOutcome> {
        // Precondition: credential exists
        let credential = match self.db.get_credential(&post.user_id).await? {
            Some(c) => c,
            None => {
                let error = PublishError::CredentialsNotFound(post.user_id.clone());
                return self.resolve_failure(post, &error).await;
            }
        };

        // Precondition: token not expired. An external token problem, not a
        // content problem: refresh happens out-of-band.
        if credential.is_expired(now) {
            warn!(
                post_id = %post.id,
                user_id = %post.user_id,
                expires_at = credential.token_expires_at,
                "access token expired; skipping publish until refreshed"
            );
            let error = PublishError::TokenExpired(post.user_id.clone());
            return self.resolve_failure(post, &error).await;
        }

        match self.attempt(post, &credential).await {
            Ok((creation_id, media_id)) => {
                let published_at = chrono::Utc::now().timestamp();
                self.db
                    .record_publish_success(&post.id, &media_id, &creation_id, published_at)
                    .await?;
                info!(post_id = %post.id, media_id = %media_id, "published post");
                Ok(PublishOutcome::Published { media_id })
            }
            Err(e) => match &e {
                AutogramError::Publish(error) => self.resolve_failure(post, error).await,
                other => self.fail_attempt(post, &other.to_string()).await,
            },
        }
    }

    /// Resolve a publish error against the post store. Errors that consume
    /// retry budget are recorded as a failed attempt; the rest release the
    /// claim with retry state untouched, leaving the post to wait for
    /// external recovery.
    async fn resolve_failure(&self, post: &Post, error: &PublishError) -> Result<PublishOutcome> {
        if !error.consumes_retry_budget() {
            self.db.release_claim(&post.id).await?;
            return Ok(PublishOutcome::SkippedTokenExpired);
        }
        self.fail_attempt(post, &error.to_string()).await
    }

    /// One pass of the two-phase protocol. Returns (creation_id, media_id).
    async fn attempt(&self, post: &Post, credential: &Credential) -> Result<(String, String)> {
        let caption = post
            .caption
            .clone()
            .unwrap_or_else(|| post.topic.clone());

        let image_urls = match &post.image_urls {
            Some(urls) if !urls.is_empty() => urls.clone(),
            _ => return Err(PublishError::Content("post has no image URLs".to_string()).into()),
        };

        if let Some(prober) = &self.prober {
            for url in &image_urls {
                prober.probe(url).await?;
            }
        }

        // Phase 1: create the media container
        let creation_id = self
            .publisher
            .create_container(credential, &image_urls, &caption)
            .await?;
        debug!(post_id = %post.id, creation_id = %creation_id, "created media container");

        // Phase 2: wait for the platform to process the media. Best-effort:
        // if the bound is exhausted we proceed anyway and let the publish
        // call be the judge.
        self.await_container(credential, &creation_id, &post.id).await?;

        // Phase 3: publish
        let media_id = self.publisher.publish(credential, &creation_id).await?;
        Ok((creation_id, media_id))
    }

    async fn await_container(
        &self,
        credential: &Credential,
        creation_id: &str,
        post_id: &str,
    ) -> Result<()> {
        for attempt in 1..=self.config.status_poll_attempts {
            match self.publisher.container_status(credential, creation_id).await {
                Ok(ContainerStatus::Finished) => {
                    debug!(post_id = %post_id, attempt, "container finished processing");
                    return Ok(());
                }
                Ok(ContainerStatus::Error) => {
                    return Err(PublishError::Terminal(format!(
                        "container {} failed processing",
                        creation_id
                    ))
                    .into());
                }
                Ok(ContainerStatus::InProgress) => {}
                // A failed poll burns one attempt but is not fatal: the
                // publish call authoritatively rejects unready containers.
                Err(e) => debug!(post_id = %post_id, attempt, error = %e, "status poll failed"),
            }

            if attempt < self.config.status_poll_attempts {
                sleep(self.config.status_poll_interval()).await;
            }
        }

        warn!(
            post_id = %post_id,
            creation_id = %creation_id,
            attempts = self.config.status_poll_attempts,
            "container not confirmed ready; publishing anyway"
        );
        Ok(())
    }

    /// Record a failed attempt: status and retry count move together in a
    /// single write.
    async fn fail_attempt(&self, post: &Post, error: &str) -> Result<PublishOutcome> {
        self.db
            .record_publish_failure(&post.id, error, self.config.max_retries)
            .await?;

        let attempts = post.retry_count + 1;
        if attempts >= self.config.max_retries {
            warn!(
                post_id = %post.id,
                attempts,
                error,
                "publish failed; retry budget exhausted"
            );
            Ok(PublishOutcome::Failed {
                error: error.to_string(),
            })
        } else {
            warn!(post_id = %post.id, attempts, error, "publish failed; will retry");
            Ok(PublishOutcome::Retrying {
                error: error.to_string(),
            })
        }
    }
}
