//! The repost orchestrator: dedup check, spam check, publish, record.
//! Ordering is what makes the dedup store trustworthy: a key is written
//! only after the publish call reports success.

use database::Database;
use filter_engine::FilterEngine;
use repostbot_core::{clip_chars, ProcessOutcome, WallPost};
use tracing::{debug, error, info, warn};
use vk_client::VkApi;

/// VK rejects wall.post messages longer than this many characters.
const VK_MESSAGE_LIMIT: usize = 4000;

pub async fn process_post(
    api: &dyn VkApi,
    db: &Database,
    filter: &FilterEngine,
    target_group_id: i64,
    post: &WallPost,
) -> ProcessOutcome {
    let key = post.key();

    match db.is_posted(&key).await {
        Ok(true) => {
            debug!("Post {} already reposted, skipping", key);
            return ProcessOutcome::Skipped;
        }
        Ok(false) => {}
        Err(e) => {
            // An unreadable dedup store must not lead to a publish: we
            // could be re-posting something already delivered.
            warn!("Dedup check failed for {}, not publishing: {}", key, e);
            return ProcessOutcome::Failed;
        }
    }

    if filter.is_spam(&post.text) {
        debug!("Post {} looks like spam, skipping", key);
        return ProcessOutcome::Skipped;
    }

    let message = clip_chars(&post.text, VK_MESSAGE_LIMIT);
    let attachments = post.attachments_field();

    match api
        .publish_repost(target_group_id, message, &attachments, &post.source_link())
        .await
    {
        Ok(new_post_id) => {
            info!("Reposted {} as post {}", key, new_post_id);
            if let Err(e) = db.mark_posted(&key).await {
                // Published but not recorded: the next cycle may publish
                // it again. At-most-once per recorded key still holds.
                error!("Failed to record dedup entry for {}: {}", key, e);
            }
            ProcessOutcome::Published
        }
        Err(e) => {
            warn!("Repost of {} failed, will retry next cycle: {}", key, e);
            ProcessOutcome::Failed
        }
    }
}
