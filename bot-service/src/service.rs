//! The supervisory loop. One cycle walks discovery, fetch, filter+post
//! and reporting; the loop around it survives any cycle failure and only
//! an explicit shutdown signal ends it.

use crate::discovery::{discover_groups, fetch_eligible_posts};
use crate::notifier::{format_cycle_report, Notifier};
use crate::orchestrator::process_post;
use database::Database;
use filter_engine::FilterEngine;
use repostbot_core::{
    Config, ConfigSource, CoreError, CycleStats, ErrorExt, ProcessOutcome, WallPost,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use vk_client::VkApi;

/// Cool-down after a failed cycle before the next attempt.
const FAILURE_COOLDOWN: Duration = Duration::from_secs(60);

const COMMENT_FETCH_COUNT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Discovering,
    Fetching,
    FilteringAndPosting,
    Reporting,
    Sleeping,
}

pub struct BotService {
    api: Arc<dyn VkApi>,
    db: Database,
    notifier: Notifier,
    config: Arc<Config>,
    filter: Arc<FilterEngine>,
    config_source: Option<ConfigSource>,
    shutdown: watch::Receiver<bool>,
}

impl BotService {
    pub fn new(
        api: Arc<dyn VkApi>,
        db: Database,
        notifier: Notifier,
        config: Config,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, CoreError> {
        let filter = FilterEngine::from_config(&config)?;
        Ok(Self {
            api,
            db,
            notifier,
            config: Arc::new(config),
            filter: Arc::new(filter),
            config_source: None,
            shutdown,
        })
    }

    /// Enables config hot-reload; snapshots are swapped only between
    /// cycles, never while a cycle is running.
    pub fn with_config_source(mut self, source: ConfigSource) -> Self {
        self.config_source = Some(source);
        self
    }

    /// Drives cycles until the shutdown flag flips. Every failure short
    /// of that is logged, reported and absorbed by a cool-down.
    pub async fn run(&mut self) {
        info!("Bot service started");
        while !self.shutdown_requested() {
            match self.run_cycle().await {
                Ok(stats) => {
                    self.report(&stats).await;
                    let interval = Duration::from_secs(self.config.check_interval_seconds);
                    self.sleep(interval).await;
                }
                Err(e) => {
                    e.log_error();
                    self.notifier
                        .send(&format!("Cycle failed: {}", e.user_friendly_message()))
                        .await;
                    self.sleep(FAILURE_COOLDOWN).await;
                }
            }
            self.apply_config_reload();
        }
        info!("Shutdown signal received, bot service stopping");
    }

    /// One full pass. Per-keyword, per-group and per-post failures are
    /// contained inside; an error returned here means the whole cycle is
    /// considered failed and retried after the cool-down.
    pub async fn run_cycle(&self) -> Result<CycleStats, CoreError> {
        let mut stats = CycleStats::default();

        info!("Cycle phase: {:?}", CyclePhase::Discovering);
        let groups = discover_groups(
            self.api.as_ref(),
            &self.config.search_keywords,
            self.config.region_id,
            self.config.max_groups,
        )
        .await?;
        info!("Discovered {} candidate groups", groups.len());

        info!("Cycle phase: {:?}", CyclePhase::Fetching);
        let mut candidates: Vec<WallPost> = Vec::new();
        for group_id in groups {
            if self.shutdown_requested() {
                return Ok(stats);
            }
            if self.filter.is_blacklisted(group_id) {
                debug!("Group {} blacklisted in config, skipping", group_id);
                continue;
            }
            match self.db.is_blacklisted(group_id).await {
                Ok(true) => {
                    debug!("Group {} blacklisted in store, skipping", group_id);
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Blacklist check failed for {}, skipping group: {}", group_id, e);
                    stats.errors += 1;
                    continue;
                }
            }

            let posts =
                fetch_eligible_posts(self.api.as_ref(), &self.filter, group_id, self.config.days_ago)
                    .await;
            debug!("Group {}: {} eligible posts", group_id, posts.len());
            candidates.extend(posts);
        }

        info!("Cycle phase: {:?}", CyclePhase::FilteringAndPosting);
        for post in &candidates {
            if self.shutdown_requested() {
                return Ok(stats);
            }
            let outcome = process_post(
                self.api.as_ref(),
                &self.db,
                &self.filter,
                self.config.target_group_id,
                post,
            )
            .await;
            stats.record(outcome);

            if outcome == ProcessOutcome::Published && self.config.process_comments {
                self.scan_comments(post).await;
            }
        }

        Ok(stats)
    }

    async fn report(&self, stats: &CycleStats) {
        info!(
            "Cycle phase: {:?} ({} seen, {} published, {} errors)",
            CyclePhase::Reporting,
            stats.total_posts,
            stats.published_posts,
            stats.errors
        );
        if let Err(e) = self.db.record_cycle_stats(stats).await {
            warn!("Failed to persist cycle stats: {}", e);
        }
        self.notifier.send(&format_cycle_report(stats)).await;
    }

    /// Opt-in scan of a published post's comments for keyword matches.
    /// Purely informational, so failures are only logged at debug.
    async fn scan_comments(&self, post: &WallPost) {
        match self
            .api
            .fetch_comments(post.owner_id, post.id, COMMENT_FETCH_COUNT)
            .await
        {
            Ok(comments) => {
                let matching = comments
                    .iter()
                    .filter(|c| self.filter.matches_keywords(&c.text))
                    .count();
                if matching > 0 {
                    info!(
                        "Post {} has {} keyword-matching comments",
                        post.key(),
                        matching
                    );
                }
            }
            Err(e) => debug!("Comment fetch for {} failed: {}", post.key(), e),
        }
    }

    /// Interruptible sleep: wakes early when the shutdown flag flips.
    async fn sleep(&self, duration: Duration) {
        info!(
            "Cycle phase: {:?} ({} s)",
            CyclePhase::Sleeping,
            duration.as_secs()
        );
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = shutdown.changed() => {}
        }
    }

    fn apply_config_reload(&mut self) {
        let Some(source) = self.config_source.as_mut() else {
            return;
        };
        if let Some(new_config) = source.reload_if_changed() {
            match FilterEngine::from_config(&new_config) {
                Ok(filter) => {
                    self.filter = Arc::new(filter);
                    self.config = Arc::new(new_config);
                    info!("Applied new configuration snapshot");
                }
                Err(e) => {
                    warn!("Reloaded config rejected, keeping previous snapshot: {}", e);
                }
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }
}
