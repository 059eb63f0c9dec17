//! Database operations for Autogram
//!
//! SQLite via sqlx. The posts table is the only shared mutable state in the
//! system; every status transition here is a single atomic statement so a
//! post is never left half-updated.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::types::{Credential, Post, PostStatus, Schedule};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

/// Per-status post counts for the queue CLI.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct QueueStats {
    pub pending: i64,
    pub in_progress: i64,
    pub published: i64,
    pub failed: i64,
}

impl Database {
    /// Open (creating if necessary) the database at the given path and run
    /// migrations.
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Forward slashes keep the SQLite URL valid on Windows too;
        // mode=rwc creates the file on first run.
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool (used by tests with sqlite::memory:).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ========================================================================
    // Posts
    // ========================================================================

    pub async fn create_post(&self, post: &Post) -> Result<()> {
        let image_urls = match &post.image_urls {
            Some(urls) => Some(serde_json::to_string(urls).map_err(|e| {
                crate::error::AutogramError::InvalidInput(format!("bad image_urls: {}", e))
            })?),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO posts (
                id, schedule_id, user_id, topic, caption, image_urls,
                scheduled_at, created_at, status, claimed_at, retry_count,
                error_message, media_id, container_id, published_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.schedule_id)
        .bind(&post.user_id)
        .bind(&post.topic)
        .bind(&post.caption)
        .bind(image_urls)
        .bind(post.scheduled_at)
        .bind(post.created_at)
        .bind(post.status.as_str())
        .bind(post.claimed_at)
        .bind(post.retry_count)
        .bind(&post.error_message)
        .bind(&post.media_id)
        .bind(&post.container_id)
        .bind(post.published_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, schedule_id, user_id, topic, caption, image_urls,
                   scheduled_at, created_at, status, claimed_at, retry_count,
                   error_message, media_id, container_id, published_at
            FROM posts WHERE id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| row_to_post(&r)))
    }

    /// Posts eligible for a publish attempt: pending, due, and with retry
    /// budget left. Ordered by scheduled_at then id so ticks are fair and
    /// reproducible.
    pub async fn find_eligible(&self, now: i64, max_retries: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT id, schedule_id, user_id, topic, caption, image_urls,
                   scheduled_at, created_at, status, claimed_at, retry_count,
                   error_message, media_id, container_id, published_at
            FROM posts
            WHERE status = 'pending' AND scheduled_at <= ? AND retry_count < ?
            ORDER BY scheduled_at ASC, id ASC
            "#,
        )
        .bind(now)
        .bind(max_retries)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(row_to_post).collect())
    }

    /// Atomically claim a pending post for publishing.
    ///
    /// Returns false when the post is no longer pending, meaning another
    /// worker (or an overlapping tick) got there first.
    pub async fn claim_post(&self, post_id: &str, now: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts SET status = 'in_progress', claimed_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Return a claimed post to pending without touching its retry count or
    /// error message. Used when the attempt is skipped (expired token).
    pub async fn release_claim(&self, post_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE posts SET status = 'pending', claimed_at = NULL
            WHERE id = ? AND status = 'in_progress'
            "#,
        )
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Sweep claims older than the cutoff back to pending. Recovers posts
    /// abandoned by a worker that died mid-protocol.
    pub async fn reclaim_stale(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE posts SET status = 'pending', claimed_at = NULL
            WHERE status = 'in_progress' AND claimed_at < ?
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected())
    }

    /// Record a successful publish. Terminal; nothing transitions out of
    /// published.
    pub async fn record_publish_success(
        &self,
        post_id: &str,
        media_id: &str,
        container_id: &str,
        published_at: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE posts SET
                status = 'published',
                media_id = ?,
                container_id = ?,
                published_at = ?,
                claimed_at = NULL,
                error_message = NULL
            WHERE id = ? AND status = 'in_progress'
            "#,
        )
        .bind(media_id)
        .bind(container_id)
        .bind(published_at)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Record a failed publish attempt: bump the retry count and move the
    /// post to failed once the budget is exhausted, otherwise back to
    /// pending for the next tick. Status and retry_count change together in
    /// one statement.
    pub async fn record_publish_failure(
        &self,
        post_id: &str,
        error_message: &str,
        max_retries: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE posts SET
                retry_count = retry_count + 1,
                status = CASE WHEN retry_count + 1 >= ? THEN 'failed' ELSE 'pending' END,
                error_message = ?,
                claimed_at = NULL
            WHERE id = ? AND status = 'in_progress'
            "#,
        )
        .bind(max_retries)
        .bind(error_message)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Store generated caption and slide URLs on a post.
    pub async fn set_post_content(
        &self,
        post_id: &str,
        caption: &str,
        image_urls: &[String],
    ) -> Result<()> {
        let urls = serde_json::to_string(image_urls).map_err(|e| {
            crate::error::AutogramError::InvalidInput(format!("bad image_urls: {}", e))
        })?;

        sqlx::query(
            r#"
            UPDATE posts SET caption = ?, image_urls = ? WHERE id = ?
            "#,
        )
        .bind(caption)
        .bind(urls)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// List posts for the queue CLI, newest scheduled first.
    pub async fn list_posts(
        &self,
        status: Option<PostStatus>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let base = r#"
            SELECT id, schedule_id, user_id, topic, caption, image_urls,
                   scheduled_at, created_at, status, claimed_at, retry_count,
                   error_message, media_id, container_id, published_at
            FROM posts
        "#;

        let rows = match status {
            Some(s) => {
                sqlx::query(&format!(
                    "{} WHERE status = ? ORDER BY scheduled_at DESC LIMIT ?",
                    base
                ))
                .bind(s.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!("{} ORDER BY scheduled_at DESC LIMIT ?", base))
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(row_to_post).collect())
    }

    /// Remove a pending post from the queue. Administrative action; the
    /// publishing core itself never deletes posts.
    pub async fn cancel_post(&self, post_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM posts WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Put a failed post back in the queue with a fresh retry budget.
    pub async fn retry_post(&self, post_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts SET status = 'pending', retry_count = 0, error_message = NULL
            WHERE id = ? AND status = 'failed'
            "#,
        )
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn queue_stats(&self) -> Result<QueueStats> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS count FROM posts GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let mut stats = QueueStats::default();
        for row in rows {
            let status: String = row.get("status");
            let count: i64 = row.get("count");
            match status.as_str() {
                "pending" => stats.pending = count,
                "in_progress" => stats.in_progress = count,
                "published" => stats.published = count,
                "failed" => stats.failed = count,
                _ => {}
            }
        }
        Ok(stats)
    }

    // ========================================================================
    // Credentials
    // ========================================================================

    pub async fn create_user(
        &self,
        user_id: &str,
        ig_user_id: Option<&str>,
        access_token: Option<&str>,
        token_expires_at: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, ig_user_id, ig_access_token, ig_token_expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(ig_user_id)
        .bind(access_token)
        .bind(token_expires_at)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Fetch a user's Instagram credential. Returns None when the user does
    /// not exist or has not linked an account yet.
    pub async fn get_credential(&self, user_id: &str) -> Result<Option<Credential>> {
        let row = sqlx::query(
            r#"
            SELECT id, ig_user_id, ig_access_token, ig_token_expires_at
            FROM users WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let ig_user_id: Option<String> = row.get("ig_user_id");
        let access_token: Option<String> = row.get("ig_access_token");
        let token_expires_at: Option<i64> = row.get("ig_token_expires_at");

        Ok(
            match (ig_user_id, access_token, token_expires_at) {
                (Some(ig_user_id), Some(access_token), Some(token_expires_at)) => {
                    Some(Credential {
                        user_id: row.get("id"),
                        ig_user_id,
                        access_token,
                        token_expires_at,
                    })
                }
                _ => None,
            },
        )
    }

    // ========================================================================
    // Schedules
    // ========================================================================

    pub async fn create_schedule(&self, schedule: &Schedule) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO schedules (id, user_id, topic, time_of_day, slide_count, active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&schedule.id)
        .bind(&schedule.user_id)
        .bind(&schedule.topic)
        .bind(&schedule.time_of_day)
        .bind(schedule.slide_count)
        .bind(schedule.active)
        .bind(schedule.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn list_active_schedules(&self) -> Result<Vec<Schedule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, topic, time_of_day, slide_count, active, created_at
            FROM schedules WHERE active = 1
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| Schedule {
                id: r.get("id"),
                user_id: r.get("user_id"),
                topic: r.get("topic"),
                time_of_day: r.get("time_of_day"),
                slide_count: r.get("slide_count"),
                active: r.get::<i64, _>("active") != 0,
                created_at: r.get("created_at"),
            })
            .collect())
    }

    /// Whether a schedule already has a post scheduled inside [from, to).
    /// Keeps the generation pass from producing duplicates for a day.
    pub async fn has_post_in_window(
        &self,
        schedule_id: &str,
        from: i64,
        to: i64,
    ) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count FROM posts
            WHERE schedule_id = ? AND scheduled_at >= ? AND scheduled_at < ?
            "#,
        )
        .bind(schedule_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.get::<i64, _>("count") > 0)
    }
}

fn row_to_post(row: &sqlx::sqlite::SqliteRow) -> Post {
    let image_urls: Option<String> = row.get("image_urls");
    Post {
        id: row.get("id"),
        schedule_id: row.get("schedule_id"),
        user_id: row.get("user_id"),
        topic: row.get("topic"),
        caption: row.get("caption"),
        image_urls: image_urls.and_then(|s| serde_json::from_str(&s).ok()),
        scheduled_at: row.get("scheduled_at"),
        created_at: row.get("created_at"),
        status: PostStatus::from_str_lossy(&row.get::<String, _>("status")),
        claimed_at: row.get("claimed_at"),
        retry_count: row.get("retry_count"),
        error_message: row.get("error_message"),
        media_id: row.get("media_id"),
        container_id: row.get("container_id"),
        published_at: row.get("published_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Post, PostStatus, Schedule};

    async fn memory_db() -> Database {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        Database::from_pool(pool)
    }

    async fn seed_user(db: &Database, user_id: &str) {
        db.create_user(user_id, Some("ig-123"), Some("token"), Some(i64::MAX))
            .await
            .unwrap();
    }

    fn pending_post(user_id: &str, scheduled_at: i64) -> Post {
        let mut post = Post::new(user_id.to_string(), "test topic".to_string(), scheduled_at);
        post.caption = Some("caption".to_string());
        post.image_urls = Some(vec!["https://cdn.example.com/a.png".to_string()]);
        post
    }

    #[tokio::test]
    async fn test_create_and_get_post() {
        let db = memory_db().await;
        seed_user(&db, "u1").await;

        let post = pending_post("u1", 100);
        db.create_post(&post).await.unwrap();

        let got = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(got.id, post.id);
        assert_eq!(got.topic, "test topic");
        assert_eq!(got.status, PostStatus::Pending);
        assert_eq!(
            got.image_urls,
            Some(vec!["https://cdn.example.com/a.png".to_string()])
        );
    }

    #[tokio::test]
    async fn test_get_nonexistent_post_returns_none() {
        let db = memory_db().await;
        assert!(db.get_post("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_eligible_filters_and_orders() {
        let db = memory_db().await;
        seed_user(&db, "u1").await;

        let due_late = pending_post("u1", 200);
        let due_early = pending_post("u1", 100);
        let not_due = pending_post("u1", 1000);
        let mut exhausted = pending_post("u1", 50);
        exhausted.retry_count = 3;
        let mut published = pending_post("u1", 50);
        published.status = PostStatus::Published;

        for p in [&due_late, &due_early, &not_due, &exhausted, &published] {
            db.create_post(p).await.unwrap();
        }

        let eligible = db.find_eligible(500, 3).await.unwrap();
        assert_eq!(eligible.len(), 2);
        assert_eq!(eligible[0].id, due_early.id);
        assert_eq!(eligible[1].id, due_late.id);
    }

    #[tokio::test]
    async fn test_find_eligible_orders_ties_by_id() {
        let db = memory_db().await;
        seed_user(&db, "u1").await;

        let a = pending_post("u1", 100);
        let b = pending_post("u1", 100);
        db.create_post(&a).await.unwrap();
        db.create_post(&b).await.unwrap();

        let eligible = db.find_eligible(500, 3).await.unwrap();
        let mut ids: Vec<String> = vec![a.id.clone(), b.id.clone()];
        ids.sort();
        assert_eq!(
            eligible.iter().map(|p| p.id.clone()).collect::<Vec<_>>(),
            ids
        );
    }

    #[tokio::test]
    async fn test_claim_post_is_exclusive() {
        let db = memory_db().await;
        seed_user(&db, "u1").await;
        let post = pending_post("u1", 100);
        db.create_post(&post).await.unwrap();

        assert!(db.claim_post(&post.id, 500).await.unwrap());
        // Second claim must lose
        assert!(!db.claim_post(&post.id, 500).await.unwrap());

        let got = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(got.status, PostStatus::InProgress);
        assert_eq!(got.claimed_at, Some(500));
    }

    #[tokio::test]
    async fn test_claim_skips_terminal_posts() {
        let db = memory_db().await;
        seed_user(&db, "u1").await;
        let mut post = pending_post("u1", 100);
        post.status = PostStatus::Published;
        db.create_post(&post).await.unwrap();

        assert!(!db.claim_post(&post.id, 500).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_claim_preserves_retry_state() {
        let db = memory_db().await;
        seed_user(&db, "u1").await;
        let mut post = pending_post("u1", 100);
        post.retry_count = 2;
        post.error_message = Some("previous failure".to_string());
        db.create_post(&post).await.unwrap();

        db.claim_post(&post.id, 500).await.unwrap();
        db.release_claim(&post.id).await.unwrap();

        let got = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(got.status, PostStatus::Pending);
        assert_eq!(got.retry_count, 2);
        assert_eq!(got.error_message, Some("previous failure".to_string()));
        assert_eq!(got.claimed_at, None);
    }

    #[tokio::test]
    async fn test_reclaim_stale_only_touches_old_claims() {
        let db = memory_db().await;
        seed_user(&db, "u1").await;

        let stale = pending_post("u1", 100);
        let fresh = pending_post("u1", 100);
        db.create_post(&stale).await.unwrap();
        db.create_post(&fresh).await.unwrap();

        db.claim_post(&stale.id, 100).await.unwrap();
        db.claim_post(&fresh.id, 900).await.unwrap();

        let reclaimed = db.reclaim_stale(500).await.unwrap();
        assert_eq!(reclaimed, 1);

        assert_eq!(
            db.get_post(&stale.id).await.unwrap().unwrap().status,
            PostStatus::Pending
        );
        assert_eq!(
            db.get_post(&fresh.id).await.unwrap().unwrap().status,
            PostStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_record_publish_success() {
        let db = memory_db().await;
        seed_user(&db, "u1").await;
        let post = pending_post("u1", 100);
        db.create_post(&post).await.unwrap();
        db.claim_post(&post.id, 500).await.unwrap();

        db.record_publish_success(&post.id, "media-9", "container-7", 501)
            .await
            .unwrap();

        let got = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(got.status, PostStatus::Published);
        assert_eq!(got.media_id, Some("media-9".to_string()));
        assert_eq!(got.container_id, Some("container-7".to_string()));
        assert_eq!(got.published_at, Some(501));
        assert_eq!(got.claimed_at, None);
    }

    #[tokio::test]
    async fn test_record_publish_failure_under_budget_stays_pending() {
        let db = memory_db().await;
        seed_user(&db, "u1").await;
        let post = pending_post("u1", 100);
        db.create_post(&post).await.unwrap();
        db.claim_post(&post.id, 500).await.unwrap();

        db.record_publish_failure(&post.id, "502 Bad Gateway", 3)
            .await
            .unwrap();

        let got = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(got.status, PostStatus::Pending);
        assert_eq!(got.retry_count, 1);
        assert_eq!(got.error_message, Some("502 Bad Gateway".to_string()));
    }

    #[tokio::test]
    async fn test_record_publish_failure_exhausts_budget() {
        let db = memory_db().await;
        seed_user(&db, "u1").await;
        let mut post = pending_post("u1", 100);
        post.retry_count = 2;
        db.create_post(&post).await.unwrap();
        db.claim_post(&post.id, 500).await.unwrap();

        db.record_publish_failure(&post.id, "timeout", 3).await.unwrap();

        let got = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(got.status, PostStatus::Failed);
        assert_eq!(got.retry_count, 3);
        assert_eq!(got.error_message, Some("timeout".to_string()));
    }

    #[tokio::test]
    async fn test_terminal_posts_never_mutated_by_attempt_writes() {
        let db = memory_db().await;
        seed_user(&db, "u1").await;
        let mut post = pending_post("u1", 100);
        post.status = PostStatus::Published;
        post.media_id = Some("media-1".to_string());
        post.published_at = Some(400);
        db.create_post(&post).await.unwrap();

        // Attempt writes are guarded on in_progress; none of these may land
        db.record_publish_failure(&post.id, "late error", 3)
            .await
            .unwrap();
        db.record_publish_success(&post.id, "media-2", "c", 999)
            .await
            .unwrap();
        db.release_claim(&post.id).await.unwrap();

        let got = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(got.status, PostStatus::Published);
        assert_eq!(got.media_id, Some("media-1".to_string()));
        assert_eq!(got.published_at, Some(400));
        assert_eq!(got.retry_count, 0);
    }

    #[tokio::test]
    async fn test_get_credential_missing_user() {
        let db = memory_db().await;
        assert!(db.get_credential("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_credential_unlinked_account() {
        let db = memory_db().await;
        db.create_user("u1", None, None, None).await.unwrap();
        assert!(db.get_credential("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_credential_linked_account() {
        let db = memory_db().await;
        db.create_user("u1", Some("ig-55"), Some("tok"), Some(2000))
            .await
            .unwrap();

        let cred = db.get_credential("u1").await.unwrap().unwrap();
        assert_eq!(cred.ig_user_id, "ig-55");
        assert_eq!(cred.access_token, "tok");
        assert_eq!(cred.token_expires_at, 2000);
    }

    #[tokio::test]
    async fn test_cancel_post_only_pending() {
        let db = memory_db().await;
        seed_user(&db, "u1").await;
        let pending = pending_post("u1", 100);
        let mut published = pending_post("u1", 100);
        published.status = PostStatus::Published;
        db.create_post(&pending).await.unwrap();
        db.create_post(&published).await.unwrap();

        assert!(db.cancel_post(&pending.id).await.unwrap());
        assert!(!db.cancel_post(&published.id).await.unwrap());
        assert!(db.get_post(&pending.id).await.unwrap().is_none());
        assert!(db.get_post(&published.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_retry_post_resets_budget() {
        let db = memory_db().await;
        seed_user(&db, "u1").await;
        let mut post = pending_post("u1", 100);
        post.status = PostStatus::Failed;
        post.retry_count = 3;
        post.error_message = Some("gave up".to_string());
        db.create_post(&post).await.unwrap();

        assert!(db.retry_post(&post.id).await.unwrap());

        let got = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(got.status, PostStatus::Pending);
        assert_eq!(got.retry_count, 0);
        assert_eq!(got.error_message, None);

        // Retrying a non-failed post is a no-op
        assert!(!db.retry_post(&post.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_queue_stats() {
        let db = memory_db().await;
        seed_user(&db, "u1").await;

        for status in [
            PostStatus::Pending,
            PostStatus::Pending,
            PostStatus::Published,
            PostStatus::Failed,
        ] {
            let mut post = pending_post("u1", 100);
            post.status = status;
            db.create_post(&post).await.unwrap();
        }

        let stats = db.queue_stats().await.unwrap();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.published, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.in_progress, 0);
    }

    #[tokio::test]
    async fn test_schedule_round_trip_and_window_check() {
        let db = memory_db().await;
        seed_user(&db, "u1").await;

        let schedule = Schedule::new(
            "u1".to_string(),
            "daily recipes".to_string(),
            "09:00".to_string(),
            2,
        );
        db.create_schedule(&schedule).await.unwrap();

        let active = db.list_active_schedules().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].topic, "daily recipes");

        assert!(!db.has_post_in_window(&schedule.id, 0, 1000).await.unwrap());

        let mut post = pending_post("u1", 500);
        post.schedule_id = Some(schedule.id.clone());
        db.create_post(&post).await.unwrap();

        assert!(db.has_post_in_window(&schedule.id, 0, 1000).await.unwrap());
        assert!(!db.has_post_in_window(&schedule.id, 600, 1000).await.unwrap());
    }

    #[tokio::test]
    async fn test_database_initialization_with_invalid_path() {
        let invalid_path = "/tmp/test\0invalid.db";
        let result = Database::new(invalid_path).await;
        assert!(result.is_err(), "Expected error for invalid path");
    }

    #[tokio::test]
    async fn test_database_on_disk_round_trip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("autogram.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();

        db.create_user("u1", Some("ig"), Some("tok"), Some(1)).await.unwrap();
        let post = pending_post("u1", 100);
        db.create_post(&post).await.unwrap();
        assert!(db.get_post(&post.id).await.unwrap().is_some());
    }
}
