//! autogram-queue - Manage the Autogram post queue
//!
//! Unix-style tool for inspecting and administering scheduled posts.

use clap::{Parser, Subcommand};
use libautogram::{AutogramError, Config, Database, Post, PostStatus, Result};

#[derive(Parser, Debug)]
#[command(name = "autogram-queue")]
#[command(version)]
#[command(about = "Manage the Autogram post queue")]
#[command(long_about = "\
autogram-queue - Manage the Autogram post queue

DESCRIPTION:
    autogram-queue is a Unix-style tool for managing posts in the Autogram
    queue. Use it to list posts, cancel pending posts, requeue failed
    posts, or view queue statistics.

COMMANDS:
    list        List posts in the queue
    cancel      Cancel a pending post
    retry       Put a failed post back in the queue
    stats       Show queue statistics

USAGE EXAMPLES:
    # List all posts
    autogram-queue list

    # List failed posts in JSON format
    autogram-queue list --status failed --format json

    # Cancel a pending post
    autogram-queue cancel <POST_ID>

    # Requeue a failed post with a fresh retry budget
    autogram-queue retry <POST_ID>

    # View queue statistics
    autogram-queue stats

CONFIGURATION:
    Configuration file: ~/.config/autogram/config.toml
    Database location: ~/.local/share/autogram/autogram.db

    Override with environment variables:
        AUTOGRAM_CONFIG    - Path to config file

EXIT CODES:
    0 - Success
    1 - Database, configuration, or publish error
    2 - Credential error
    3 - Invalid input (bad post ID, status, format)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    #[arg(help = "Enable verbose logging to stderr (useful for debugging)")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List posts in the queue
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Filter by status: pending, in_progress, published, failed
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum number of posts to show
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Cancel a pending post
    Cancel {
        /// Post ID to cancel
        post_id: String,
    },

    /// Put a failed post back in the queue
    Retry {
        /// Post ID to retry
        post_id: String,
    },

    /// Show queue statistics
    Stats {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("error")
            .with_writer(std::io::stderr)
            .init();
    }

    // Run the main logic and handle errors
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;

    match cli.command {
        Commands::List {
            format,
            status,
            limit,
        } => {
            cmd_list(&db, &format, status.as_deref(), limit).await?;
        }
        Commands::Cancel { post_id } => {
            cmd_cancel(&db, &post_id).await?;
        }
        Commands::Retry { post_id } => {
            cmd_retry(&db, &post_id).await?;
        }
        Commands::Stats { format } => {
            cmd_stats(&db, &format).await?;
        }
    }

    Ok(())
}

fn validate_format(format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(AutogramError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }
    Ok(())
}

fn parse_status(status: &str) -> Result<PostStatus> {
    match status {
        "pending" => Ok(PostStatus::Pending),
        "in_progress" => Ok(PostStatus::InProgress),
        "published" => Ok(PostStatus::Published),
        "failed" => Ok(PostStatus::Failed),
        other => Err(AutogramError::InvalidInput(format!(
            "Invalid status '{}'. Must be pending, in_progress, published or failed",
            other
        ))),
    }
}

/// List posts
async fn cmd_list(db: &Database, format: &str, status: Option<&str>, limit: usize) -> Result<()> {
    validate_format(format)?;
    let status = status.map(parse_status).transpose()?;

    let posts = db.list_posts(status, limit).await?;

    if format == "json" {
        output_list_json(&posts);
    } else {
        output_list_text(&posts);
    }

    Ok(())
}

/// Output posts as JSON
fn output_list_json(posts: &[Post]) {
    let json: Vec<serde_json::Value> = posts
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p.id,
                "user_id": p.user_id,
                "topic": p.topic,
                "status": p.status.as_str(),
                "scheduled_at": p.scheduled_at,
                "retry_count": p.retry_count,
                "error_message": p.error_message,
                "media_id": p.media_id,
                "published_at": p.published_at,
            })
        })
        .collect();

    match serde_json::to_string_pretty(&json) {
        Ok(out) => println!("{}", out),
        Err(e) => eprintln!("Error: failed to serialize posts: {}", e),
    }
}

/// Output posts as human-readable text
fn output_list_text(posts: &[Post]) {
    if posts.is_empty() {
        return;
    }

    let now = chrono::Utc::now().timestamp();

    for post in posts {
        let topic_preview = truncate(&post.topic, 40);
        println!(
            "{} | {:11} | {} | {}",
            post.id,
            post.status,
            topic_preview,
            format_time_until(now, post.scheduled_at)
        );
    }
}

/// Truncate text to max length with ellipsis
fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len).collect();
        format!("{}...", truncated)
    }
}

/// Format time until scheduled time in human-readable form
fn format_time_until(now: i64, scheduled_at: i64) -> String {
    let diff = scheduled_at - now;

    if diff < 0 {
        return "overdue".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "in <1 minute".to_string()
    }
}

/// Cancel a pending post
async fn cmd_cancel(db: &Database, post_id: &str) -> Result<()> {
    if db.cancel_post(post_id).await? {
        println!("Cancelled post {}", post_id);
        return Ok(());
    }

    match db.get_post(post_id).await? {
        Some(post) => Err(AutogramError::InvalidInput(format!(
            "Post {} is {}; only pending posts can be cancelled",
            post_id, post.status
        ))),
        None => Err(AutogramError::InvalidInput(format!(
            "Post not found: {}",
            post_id
        ))),
    }
}

/// Requeue a failed post
async fn cmd_retry(db: &Database, post_id: &str) -> Result<()> {
    if db.retry_post(post_id).await? {
        println!("Requeued post {}", post_id);
        return Ok(());
    }

    match db.get_post(post_id).await? {
        Some(post) => Err(AutogramError::InvalidInput(format!(
            "Post {} is {}; only failed posts can be retried",
            post_id, post.status
        ))),
        None => Err(AutogramError::InvalidInput(format!(
            "Post not found: {}",
            post_id
        ))),
    }
}

/// Show queue statistics
async fn cmd_stats(db: &Database, format: &str) -> Result<()> {
    validate_format(format)?;

    let stats = db.queue_stats().await?;

    if format == "json" {
        match serde_json::to_string_pretty(&stats) {
            Ok(out) => println!("{}", out),
            Err(e) => eprintln!("Error: failed to serialize stats: {}", e),
        }
    } else {
        println!("Pending:     {}", stats.pending);
        println!("In progress: {}", stats.in_progress);
        println!("Published:   {}", stats.published);
        println!("Failed:      {}", stats.failed);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 40), "short");
        let long = "a".repeat(50);
        assert_eq!(truncate(&long, 40), format!("{}...", "a".repeat(40)));
    }

    #[test]
    fn test_format_time_until() {
        assert_eq!(format_time_until(100, 50), "overdue");
        assert_eq!(format_time_until(100, 130), "in <1 minute");
        assert_eq!(format_time_until(0, 120), "in 2 minutes");
        assert_eq!(format_time_until(0, 7200), "in 2 hours");
        assert_eq!(format_time_until(0, 86_400), "in 1 day");
        assert_eq!(format_time_until(0, 3 * 86_400), "in 3 days");
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("pending").unwrap(), PostStatus::Pending);
        assert_eq!(parse_status("failed").unwrap(), PostStatus::Failed);
        assert!(parse_status("done").is_err());
    }

    #[test]
    fn test_validate_format() {
        assert!(validate_format("text").is_ok());
        assert!(validate_format("json").is_ok());
        assert!(validate_format("yaml").is_err());
    }
}
