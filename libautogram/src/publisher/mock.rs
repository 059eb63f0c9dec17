//! Mock publisher for testing
//!
//! Scriptable implementation of `MediaPublisher` used by unit and
//! integration tests to exercise the orchestrator without network access.
//! Outcomes for create and publish calls are queued per call; the status
//! poll replays a fixed sequence, repeating its last entry.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::{PublishError, Result};
use crate::publisher::{ContainerStatus, MediaPublisher};
use crate::types::Credential;

#[derive(Default)]
struct Inner {
    create_outcomes: VecDeque<std::result::Result<String, PublishError>>,
    publish_outcomes: VecDeque<std::result::Result<String, PublishError>>,
    status_sequence: Vec<ContainerStatus>,

    create_calls: usize,
    status_calls: usize,
    publish_calls: usize,

    /// (image_urls, caption) per create call
    created: Vec<(Vec<String>, String)>,
    /// creation ids passed to publish
    published: Vec<String>,

    next_id: usize,
}

/// Mock publisher; cloning shares state so tests can inspect call history
/// while the orchestrator owns another handle.
#[derive(Clone, Default)]
pub struct MockPublisher {
    inner: Arc<Mutex<Inner>>,
}

impl MockPublisher {
    /// A publisher where every call succeeds: create returns
    /// "container-N", status reports FINISHED, publish returns "media-N".
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Queue an explicit result for the next create call.
    pub fn push_create_outcome(&self, outcome: std::result::Result<String, PublishError>) {
        self.inner.lock().unwrap().create_outcomes.push_back(outcome);
    }

    /// Queue an explicit result for the next publish call.
    pub fn push_publish_outcome(&self, outcome: std::result::Result<String, PublishError>) {
        self.inner.lock().unwrap().publish_outcomes.push_back(outcome);
    }

    /// Replace the status poll sequence. The last entry repeats once the
    /// sequence is exhausted; an empty sequence reports FINISHED.
    pub fn set_status_sequence(&self, sequence: Vec<ContainerStatus>) {
        self.inner.lock().unwrap().status_sequence = sequence;
    }

    pub fn create_calls(&self) -> usize {
        self.inner.lock().unwrap().create_calls
    }

    pub fn status_calls(&self) -> usize {
        self.inner.lock().unwrap().status_calls
    }

    pub fn publish_calls(&self) -> usize {
        self.inner.lock().unwrap().publish_calls
    }

    pub fn created(&self) -> Vec<(Vec<String>, String)> {
        self.inner.lock().unwrap().created.clone()
    }

    pub fn published(&self) -> Vec<String> {
        self.inner.lock().unwrap().published.clone()
    }
}

#[async_trait]
impl MediaPublisher for MockPublisher {
    async fn create_container(
        &self,
        _credential: &Credential,
        image_urls: &[String],
        caption: &str,
    ) -> Result<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.create_calls += 1;
        inner
            .created
            .push((image_urls.to_vec(), caption.to_string()));

        match inner.create_outcomes.pop_front() {
            Some(Ok(id)) => Ok(id),
            Some(Err(e)) => Err(e.into()),
            None => {
                inner.next_id += 1;
                Ok(format!("container-{}", inner.next_id))
            }
        }
    }

    async fn container_status(
        &self,
        _credential: &Credential,
        _creation_id: &str,
    ) -> Result<ContainerStatus> {
        let mut inner = self.inner.lock().unwrap();
        let index = inner.status_calls;
        inner.status_calls += 1;

        if inner.status_sequence.is_empty() {
            return Ok(ContainerStatus::Finished);
        }
        let clamped = index.min(inner.status_sequence.len() - 1);
        Ok(inner.status_sequence[clamped])
    }

    async fn publish(&self, _credential: &Credential, creation_id: &str) -> Result<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.publish_calls += 1;
        inner.published.push(creation_id.to_string());

        match inner.publish_outcomes.pop_front() {
            Some(Ok(id)) => Ok(id),
            Some(Err(e)) => Err(e.into()),
            None => {
                inner.next_id += 1;
                Ok(format!("media-{}", inner.next_id))
            }
        }
    }
}
