//! Generation pass
//!
//! Walks the active schedules and materializes upcoming posts: one pending
//! post per schedule per day, scheduled at the schedule's wall-clock time
//! (UTC), with caption and slides produced by the content generator. The
//! pass is idempotent; re-running it never duplicates a day's post.

use chrono::{DateTime, Timelike, Utc};
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{AutogramError, Result};
use crate::generator::ContentGenerator;
use crate::types::{Post, Schedule};

const DAY_SECS: i64 = 86_400;

/// Parse "HH:MM" into (hour, minute).
fn parse_time_of_day(time_of_day: &str) -> Result<(u32, u32)> {
    let parse = || -> Option<(u32, u32)> {
        let (h, m) = time_of_day.split_once(':')?;
        let h: u32 = h.parse().ok()?;
        let m: u32 = m.parse().ok()?;
        if h > 23 || m > 59 {
            return None;
        }
        Some((h, m))
    };

    parse().ok_or_else(|| {
        AutogramError::InvalidInput(format!("bad time_of_day {:?}, expected HH:MM", time_of_day))
    })
}

/// Next occurrence of the schedule's time of day strictly after `now`.
fn next_occurrence(now: i64, time_of_day: &str) -> Result<i64> {
    let (hour, minute) = parse_time_of_day(time_of_day)?;

    let now_dt = DateTime::<Utc>::from_timestamp(now, 0)
        .ok_or_else(|| AutogramError::InvalidInput(format!("bad timestamp {}", now)))?;

    let today = now_dt
        .with_hour(hour)
        .and_then(|dt| dt.with_minute(minute))
        .and_then(|dt| dt.with_second(0))
        .ok_or_else(|| {
            AutogramError::InvalidInput(format!("bad time_of_day {:?}", time_of_day))
        })?
        .timestamp();

    if today > now {
        Ok(today)
    } else {
        Ok(today + DAY_SECS)
    }
}

/// Start of the UTC day containing `ts`.
fn day_start(ts: i64) -> i64 {
    ts - ts.rem_euclid(DAY_SECS)
}

async fn generate_for_schedule(
    db: &Database,
    generator: &dyn ContentGenerator,
    schedule: &Schedule,
    now: i64,
) -> Result<Option<Post>> {
    let scheduled_at = next_occurrence(now, &schedule.time_of_day)?;

    // One post per schedule per day
    let window_start = day_start(scheduled_at);
    if db
        .has_post_in_window(&schedule.id, window_start, window_start + DAY_SECS)
        .await?
    {
        debug!(schedule_id = %schedule.id, "post already scheduled for this day");
        return Ok(None);
    }

    let content = generator
        .generate(&schedule.topic, schedule.slide_count)
        .await?;

    let mut post = Post::new(schedule.user_id.clone(), schedule.topic.clone(), scheduled_at);
    post.schedule_id = Some(schedule.id.clone());
    post.caption = Some(content.caption);
    post.image_urls = Some(content.image_urls);
    db.create_post(&post).await?;

    info!(
        schedule_id = %schedule.id,
        post_id = %post.id,
        scheduled_at,
        "generated post"
    );
    Ok(Some(post))
}

/// One generation pass over all active schedules. A failure on one schedule
/// is logged and does not block the rest. Returns the number of posts
/// created.
pub async fn generate_due_posts(
    db: &Database,
    generator: &dyn ContentGenerator,
    now: i64,
) -> Result<usize> {
    let schedules = db.list_active_schedules().await?;
    debug!(count = schedules.len(), "running generation pass");

    let mut created = 0;
    for schedule in &schedules {
        match generate_for_schedule(db, generator, schedule, now).await {
            Ok(Some(_)) => created += 1,
            Ok(None) => {}
            Err(e) => {
                warn!(
                    schedule_id = %schedule.id,
                    topic = %schedule.topic,
                    error = %e,
                    "generation failed for schedule"
                );
            }
        }
    }

    Ok(created)
}
