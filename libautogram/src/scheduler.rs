//! Scheduler loop
//!
//! Periodically sweeps stale claims, finds due posts, and drives each one
//! through the publish orchestrator. Claims are taken one at a time with a
//! compare-and-set so overlapping ticks (or a second daemon pointed at the
//! same database) never double-publish a post.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{PublisherConfig, SchedulerConfig};
use crate::db::Database;
use crate::error::Result;
use crate::generation::generate_due_posts;
use crate::generator::ContentGenerator;
use crate::orchestrator::{Orchestrator, PublishOutcome};

/// What one publish tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub reclaimed: u64,
    pub attempted: usize,
    pub published: usize,
    pub retried: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Post store write failures while processing a post. The affected
    /// claim is recovered later by the stale-claim sweep.
    pub errors: usize,
}

pub struct Scheduler {
    db: Database,
    orchestrator: Orchestrator,
    generator: Option<Arc<dyn ContentGenerator>>,
    publisher: PublisherConfig,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        db: Database,
        orchestrator: Orchestrator,
        publisher: PublisherConfig,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            db,
            orchestrator,
            generator: None,
            publisher,
            config,
        }
    }

    /// Enable the generation pass. Without a generator the loop only
    /// publishes posts that already exist.
    pub fn with_generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// One publish tick: reclaim stale claims, then claim and process every
    /// due post serially. A failed post attempt never blocks the rest of
    /// the batch; post store errors abort the tick.
    pub async fn tick(&self, now: i64) -> Result<TickSummary> {
        let mut summary = TickSummary::default();

        let cutoff = now - self.config.stale_claim_secs;
        summary.reclaimed = self.db.reclaim_stale(cutoff).await?;
        if summary.reclaimed > 0 {
            warn!(
                reclaimed = summary.reclaimed,
                "returned stale claims to the queue"
            );
        }

        let eligible = self.db.find_eligible(now, self.publisher.max_retries).await?;
        if eligible.is_empty() {
            return Ok(summary);
        }
        debug!(count = eligible.len(), "found due posts");

        for (index, post) in eligible.iter().enumerate() {
            if index > 0 {
                sleep(self.publisher.inter_post_delay()).await;
            }

            // A store failure on one claim must not starve the rest of
            // the batch
            let claimed = match self.db.claim_post(&post.id, now).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    error!(post_id = %post.id, error = %e, "failed to claim post");
                    summary.errors += 1;
                    continue;
                }
            };

            // Lost the race to another worker or an overlapping tick
            if !claimed {
                debug!(post_id = %post.id, "post no longer pending; skipping");
                continue;
            }

            summary.attempted += 1;
            match self.orchestrator.process(post, now).await {
                Ok(PublishOutcome::Published { .. }) => summary.published += 1,
                Ok(PublishOutcome::Retrying { .. }) => summary.retried += 1,
                Ok(PublishOutcome::Failed { .. }) => summary.failed += 1,
                Ok(PublishOutcome::SkippedTokenExpired) => summary.skipped += 1,
                // A store write failed mid-attempt; keep going with the
                // rest of the batch
                Err(e) => {
                    error!(post_id = %post.id, error = %e, "failed to record publish outcome");
                    summary.errors += 1;
                }
            }
        }

        Ok(summary)
    }

    /// One generation pass (when enabled) followed by one publish tick.
    pub async fn run_once(&self, now: i64) -> Result<TickSummary> {
        if let Some(generator) = &self.generator {
            let created = generate_due_posts(&self.db, generator.as_ref(), now).await?;
            if created > 0 {
                info!(created, "generation pass created posts");
            }
        }
        self.tick(now).await
    }

    /// Run until the shutdown flag is set. Sleeps in one-second slices so
    /// SIGTERM takes effect promptly.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) -> Result<()> {
        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            generation = self.generator.is_some(),
            "scheduler started"
        );

        let mut next_generation = 0i64;
        while !shutdown.load(Ordering::SeqCst) {
            let now = chrono::Utc::now().timestamp();

            if let Some(generator) = &self.generator {
                if now >= next_generation {
                    match generate_due_posts(&self.db, generator.as_ref(), now).await {
                        Ok(created) if created > 0 => {
                            info!(created, "generation pass created posts")
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "generation pass failed"),
                    }
                    next_generation = now + self.config.generation_interval_secs as i64;
                }
            }

            match self.tick(now).await {
                Ok(summary) if summary.attempted > 0 => {
                    info!(
                        attempted = summary.attempted,
                        published = summary.published,
                        retried = summary.retried,
                        failed = summary.failed,
                        skipped = summary.skipped,
                        "publish tick complete"
                    );
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "publish tick failed"),
            }

            for _ in 0..self.config.poll_interval_secs {
                if shutdown.load(Ordering::SeqCst) {
                    info!("scheduler stopping");
                    return Ok(());
                }
                sleep(Duration::from_secs(1)).await;
            }
        }

        info!("scheduler stopping");
        Ok(())
    }
}
