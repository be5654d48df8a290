//! Discovery and fetch: keywords to candidate groups, groups to recent
//! matching posts. Failures here are contained per keyword and per group
//! so one broken search never starves the rest of the cycle.

use chrono::Utc;
use filter_engine::FilterEngine;
use repostbot_core::{CoreError, WallPost};
use std::collections::HashSet;
use tracing::{debug, warn};
use vk_client::VkApi;

/// How many wall items one fetch pulls; VK caps `wall.get` at 100.
const WALL_FETCH_COUNT: u32 = 100;

/// Searches every keyword and unions the results. Group ids come back
/// already negated into wall-owner convention, and the set strips the
/// overlap between keywords. A single failed search only loses that
/// keyword; when every search fails the whole cycle is failed, since the
/// API is evidently unreachable and continuing would just burn quota.
pub async fn discover_groups(
    api: &dyn VkApi,
    keywords: &[String],
    region_id: i64,
    max_per_keyword: u32,
) -> Result<HashSet<i64>, CoreError> {
    let mut groups = HashSet::new();
    let mut last_error = None;
    for keyword in keywords {
        match api.search_groups(keyword, region_id, max_per_keyword).await {
            Ok(ids) => {
                debug!("Keyword '{}' yielded {} groups", keyword, ids.len());
                groups.extend(ids);
            }
            Err(e) => {
                warn!("Group search failed for '{}', skipping keyword: {}", keyword, e);
                last_error = Some(e);
            }
        }
    }

    if groups.is_empty() {
        if let Some(e) = last_error {
            return Err(e);
        }
    }
    Ok(groups)
}

/// Fetches one group's recent wall and keeps posts that are both inside
/// the trailing `days_ago` window and match a post keyword. A fetch
/// failure yields an empty list for that group only.
pub async fn fetch_eligible_posts(
    api: &dyn VkApi,
    filter: &FilterEngine,
    group_id: i64,
    days_ago: u32,
) -> Vec<WallPost> {
    let threshold = Utc::now().timestamp() - i64::from(days_ago) * 86_400;

    match api.fetch_wall_posts(group_id, WALL_FETCH_COUNT).await {
        Ok(posts) => posts
            .into_iter()
            .filter(|post| post.date >= threshold && filter.matches_keywords(&post.text))
            .collect(),
        Err(e) => {
            warn!("Fetching wall of {} failed, skipping group: {}", group_id, e);
            Vec::new()
        }
    }
}
