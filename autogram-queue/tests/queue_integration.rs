//! Integration tests for the autogram-queue commands

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to escape path for TOML on Windows
fn escape_path_for_toml(path: &str) -> String {
    path.replace('\\', "\\\\")
}

/// Create a test environment with a config file and database path
async fn setup_test_env() -> (TempDir, String, String) {
    let temp_dir = TempDir::new().unwrap();

    let config_dir = temp_dir.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let config_path = config_dir.join("config.toml");
    let db_path = data_dir.join("autogram.db");

    let config_content = format!(
        r#"
[database]
path = "{}"
"#,
        escape_path_for_toml(&db_path.to_string_lossy())
    );
    fs::write(&config_path, config_content).unwrap();

    (
        temp_dir,
        config_path.to_string_lossy().to_string(),
        db_path.to_string_lossy().to_string(),
    )
}

/// Seed a user plus one post per status. Returns (pending_id, failed_id).
async fn seed_posts(db_path: &str) -> (String, String) {
    use libautogram::{Database, Post, PostStatus};

    let db = Database::new(db_path).await.unwrap();
    db.create_user("u1", Some("ig-1"), Some("tok"), Some(i64::MAX))
        .await
        .unwrap();

    let now = chrono::Utc::now().timestamp();

    let pending = Post::new("u1".to_string(), "pending topic".to_string(), now + 3600);
    db.create_post(&pending).await.unwrap();

    let mut failed = Post::new("u1".to_string(), "failed topic".to_string(), now - 3600);
    failed.status = PostStatus::Failed;
    failed.retry_count = 3;
    failed.error_message = Some("Graph API 400: invalid image".to_string());
    db.create_post(&failed).await.unwrap();

    let mut published = Post::new("u1".to_string(), "published topic".to_string(), now - 7200);
    published.status = PostStatus::Published;
    published.media_id = Some("17890000000".to_string());
    published.published_at = Some(now - 7000);
    db.create_post(&published).await.unwrap();

    (pending.id, failed.id)
}

fn queue_cmd(config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("autogram-queue").unwrap();
    cmd.env("AUTOGRAM_CONFIG", config_path);
    cmd
}

#[tokio::test]
async fn test_list_shows_all_posts() {
    let (_tmp, config_path, db_path) = setup_test_env().await;
    seed_posts(&db_path).await;

    queue_cmd(&config_path)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("pending topic"))
        .stdout(predicate::str::contains("failed topic"))
        .stdout(predicate::str::contains("published topic"));
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let (_tmp, config_path, db_path) = setup_test_env().await;
    seed_posts(&db_path).await;

    queue_cmd(&config_path)
        .args(["list", "--status", "failed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("failed topic"))
        .stdout(predicate::str::contains("pending topic").not());
}

#[tokio::test]
async fn test_list_json_output() {
    let (_tmp, config_path, db_path) = setup_test_env().await;
    seed_posts(&db_path).await;

    let output = queue_cmd(&config_path)
        .args(["list", "--status", "failed", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let posts = parsed.as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["status"], "failed");
    assert_eq!(posts[0]["retry_count"], 3);
    assert_eq!(posts[0]["error_message"], "Graph API 400: invalid image");
}

#[tokio::test]
async fn test_list_rejects_bad_arguments() {
    let (_tmp, config_path, db_path) = setup_test_env().await;
    seed_posts(&db_path).await;

    queue_cmd(&config_path)
        .args(["list", "--format", "yaml"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Invalid format"));

    queue_cmd(&config_path)
        .args(["list", "--status", "done"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Invalid status"));
}

#[tokio::test]
async fn test_cancel_pending_post() {
    let (_tmp, config_path, db_path) = setup_test_env().await;
    let (pending_id, _) = seed_posts(&db_path).await;

    queue_cmd(&config_path)
        .args(["cancel", &pending_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cancelled post"));

    // Gone from the queue
    queue_cmd(&config_path)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("pending topic").not());
}

#[tokio::test]
async fn test_cancel_rejects_non_pending_post() {
    let (_tmp, config_path, db_path) = setup_test_env().await;
    let (_, failed_id) = seed_posts(&db_path).await;

    queue_cmd(&config_path)
        .args(["cancel", &failed_id])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("only pending posts"));
}

#[tokio::test]
async fn test_cancel_unknown_post() {
    let (_tmp, config_path, db_path) = setup_test_env().await;
    seed_posts(&db_path).await;

    queue_cmd(&config_path)
        .args(["cancel", "no-such-id"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Post not found"));
}

#[tokio::test]
async fn test_retry_requeues_failed_post() {
    let (_tmp, config_path, db_path) = setup_test_env().await;
    let (_, failed_id) = seed_posts(&db_path).await;

    queue_cmd(&config_path)
        .args(["retry", &failed_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Requeued post"));

    let db = libautogram::Database::new(&db_path).await.unwrap();
    let post = db.get_post(&failed_id).await.unwrap().unwrap();
    assert_eq!(post.status, libautogram::PostStatus::Pending);
    assert_eq!(post.retry_count, 0);
    assert_eq!(post.error_message, None);
}

#[tokio::test]
async fn test_retry_rejects_pending_post() {
    let (_tmp, config_path, db_path) = setup_test_env().await;
    let (pending_id, _) = seed_posts(&db_path).await;

    queue_cmd(&config_path)
        .args(["retry", &pending_id])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("only failed posts"));
}

#[tokio::test]
async fn test_stats_text_and_json() {
    let (_tmp, config_path, db_path) = setup_test_env().await;
    seed_posts(&db_path).await;

    queue_cmd(&config_path)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pending:     1"))
        .stdout(predicate::str::contains("Published:   1"))
        .stdout(predicate::str::contains("Failed:      1"));

    let output = queue_cmd(&config_path)
        .args(["stats", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(parsed["pending"], 1);
    assert_eq!(parsed["in_progress"], 0);
    assert_eq!(parsed["published"], 1);
    assert_eq!(parsed["failed"], 1);
}

#[tokio::test]
async fn test_stats_on_empty_queue() {
    let (_tmp, config_path, _db_path) = setup_test_env().await;

    queue_cmd(&config_path)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pending:     0"));
}
