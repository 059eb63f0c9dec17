//! Core types for Autogram

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of content to be published to Instagram.
///
/// Posts are created in `Pending` by the generation workflow (or ad hoc via
/// the queue), and from then on are mutated exclusively by the publish
/// orchestrator. `Published` and `Failed` are terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub schedule_id: Option<String>,
    pub user_id: String,
    pub topic: String,
    pub caption: Option<String>,
    /// Ordered slide URLs; more than one makes a carousel.
    pub image_urls: Option<Vec<String>>,
    pub scheduled_at: i64,
    pub created_at: i64,
    pub status: PostStatus,
    pub claimed_at: Option<i64>,
    pub retry_count: i64,
    pub error_message: Option<String>,
    pub media_id: Option<String>,
    pub container_id: Option<String>,
    pub published_at: Option<i64>,
}

impl Post {
    pub fn new(user_id: String, topic: String, scheduled_at: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            schedule_id: None,
            user_id,
            topic,
            caption: None,
            image_urls: None,
            scheduled_at,
            created_at: chrono::Utc::now().timestamp(),
            status: PostStatus::Pending,
            claimed_at: None,
            retry_count: 0,
            error_message: None,
            media_id: None,
            container_id: None,
            published_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PostStatus {
    Pending,
    /// Transient claimed state while a worker drives the publish protocol.
    InProgress,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::InProgress => "in_progress",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "in_progress" => PostStatus::InProgress,
            "published" => PostStatus::Published,
            "failed" => PostStatus::Failed,
            _ => PostStatus::Pending,
        }
    }

    /// Terminal states are never transitioned out of.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PostStatus::Published | PostStatus::Failed)
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recurring posting schedule owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub user_id: String,
    pub topic: String,
    /// Local wall-clock time of day, "HH:MM".
    pub time_of_day: String,
    pub slide_count: i64,
    pub active: bool,
    pub created_at: i64,
}

impl Schedule {
    pub fn new(user_id: String, topic: String, time_of_day: String, slide_count: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            topic,
            time_of_day,
            slide_count,
            active: true,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Per-user Instagram identity, read by the publisher.
///
/// Token refresh happens out-of-band; the orchestrator only checks expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: String,
    pub ig_user_id: String,
    pub access_token: String,
    pub token_expires_at: i64,
}

impl Credential {
    pub fn is_expired(&self, now: i64) -> bool {
        self.token_expires_at <= now
    }
}

/// Caption and slide URLs produced by the content generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub caption: String,
    pub image_urls: Vec<String>,
}
