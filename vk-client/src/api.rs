use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::retry::{execute_with_retry, RetryConfig};
use async_trait::async_trait;
use repostbot_core::{Attachment, AttachmentKind, Comment, CoreError, VkApiError, WallPost};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const VK_API_BASE: &str = "https://api.vk.com/method";
const VK_API_VERSION: &str = "5.131";

/// API access seam. The production implementation is [`VkClient`]; tests
/// drive the pipeline against a mock implementation instead.
#[async_trait]
pub trait VkApi: Send + Sync {
    /// `groups.search`: returns candidate group ids, already negated into
    /// wall-owner convention (group walls are negative owner ids).
    async fn search_groups(
        &self,
        keyword: &str,
        region_id: i64,
        limit: u32,
    ) -> Result<Vec<i64>, CoreError>;

    /// `wall.get` with the owner filter.
    async fn fetch_wall_posts(&self, group_id: i64, limit: u32)
        -> Result<Vec<WallPost>, CoreError>;

    /// `wall.post` to the target group. Returns the new post id.
    async fn publish_repost(
        &self,
        target_group_id: i64,
        message: &str,
        attachments: &str,
        copyright_link: &str,
    ) -> Result<i64, CoreError>;

    /// `wall.getComments` for one post.
    async fn fetch_comments(
        &self,
        owner_id: i64,
        post_id: i64,
        limit: u32,
    ) -> Result<Vec<Comment>, CoreError>;
}

#[derive(Debug, Clone)]
pub struct VkClientConfig {
    pub access_token: String,
    pub proxy_url: Option<String>,
    /// Overridable for tests; defaults to the public VK endpoint.
    pub base_url: String,
}

impl VkClientConfig {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            proxy_url: None,
            base_url: VK_API_BASE.to_string(),
        }
    }

    pub fn with_proxy(mut self, proxy_url: Option<String>) -> Self {
        self.proxy_url = proxy_url;
        self
    }
}

#[derive(Debug)]
pub struct VkClient {
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    retry: RetryConfig,
    access_token: String,
    base_url: String,
}

impl VkClient {
    pub fn new(config: VkClientConfig) -> Result<Self, CoreError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(30));
        if let Some(proxy_url) = &config.proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }
        let http_client = builder.build()?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::vk_default())),
            retry: RetryConfig::vk(),
            access_token: config.access_token,
            base_url: config.base_url,
        })
    }

    /// Read methods go over GET with query parameters.
    async fn call_method<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, CoreError> {
        let url = format!("{}/{}", self.base_url, method);
        let request = self.http_client.get(&url).query(params);
        self.dispatch(method, request).await
    }

    /// Write methods go over POST with a form body. A full-length message
    /// plus attachments does not fit inside common URL length limits once
    /// percent-encoded.
    async fn call_method_post<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, CoreError> {
        let url = format!("{}/{}", self.base_url, method);
        let request = self.http_client.post(&url).form(params);
        self.dispatch(method, request).await
    }

    /// Single chokepoint for every VK call: rate-limit permit first (so
    /// failed calls spend budget like successful ones), then the request,
    /// then error translation.
    async fn dispatch<T: DeserializeOwned>(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, CoreError> {
        let _permit = self.rate_limiter.acquire_permit().await;
        debug!("Acquired rate limit permit for {}", method);

        let response = request
            .query(&[
                ("access_token", self.access_token.as_str()),
                ("v", VK_API_VERSION),
            ])
            .send()
            .await
            .map_err(|e| {
                error!("Network error for {}: {}", method, e);
                if e.is_timeout() {
                    CoreError::VkApi(VkApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            error!("VK responded with status {} for {}", status, method);
            return Err(CoreError::VkApi(VkApiError::ServerError {
                status_code: status.as_u16(),
            }));
        }

        let envelope: VkEnvelope<T> = response.json().await.map_err(|e| {
            error!("Failed to parse response for {}: {}", method, e);
            CoreError::VkApi(VkApiError::InvalidResponse {
                details: format!("unparseable response for {}", method),
            })
        })?;

        if let Some(err) = envelope.error {
            return Err(CoreError::VkApi(map_vk_error(
                err.error_code,
                err.error_msg,
                method,
            )));
        }

        envelope.response.ok_or_else(|| {
            CoreError::VkApi(VkApiError::InvalidResponse {
                details: format!("{} returned neither response nor error", method),
            })
        })
    }

    async fn call_with_retry<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, CoreError> {
        execute_with_retry(&self.retry, method, || self.call_method(method, params)).await
    }

    async fn post_with_retry<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, CoreError> {
        execute_with_retry(&self.retry, method, || self.call_method_post(method, params)).await
    }
}

#[async_trait]
impl VkApi for VkClient {
    async fn search_groups(
        &self,
        keyword: &str,
        region_id: i64,
        limit: u32,
    ) -> Result<Vec<i64>, CoreError> {
        let params = [
            ("q", keyword.to_string()),
            ("city_id", region_id.to_string()),
            ("type", "group".to_string()),
            ("sort", "6".to_string()), // by member count
            ("count", limit.to_string()),
        ];

        let result: ItemsResponse<RawGroup> =
            self.call_with_retry("groups.search", &params).await?;

        info!(
            "groups.search '{}' returned {} groups",
            keyword,
            result.items.len()
        );
        Ok(result.items.into_iter().map(|g| -g.id).collect())
    }

    async fn fetch_wall_posts(
        &self,
        group_id: i64,
        limit: u32,
    ) -> Result<Vec<WallPost>, CoreError> {
        let params = [
            ("owner_id", group_id.to_string()),
            ("count", limit.to_string()),
            ("filter", "owner".to_string()),
        ];

        let result: ItemsResponse<RawPost> = self.call_with_retry("wall.get", &params).await?;

        debug!("wall.get {} returned {} posts", group_id, result.items.len());
        Ok(result.items.into_iter().map(WallPost::from).collect())
    }

    async fn publish_repost(
        &self,
        target_group_id: i64,
        message: &str,
        attachments: &str,
        copyright_link: &str,
    ) -> Result<i64, CoreError> {
        let mut params = vec![
            ("owner_id", target_group_id.to_string()),
            ("message", message.to_string()),
            ("copyright_link", copyright_link.to_string()),
        ];
        if !attachments.is_empty() {
            params.push(("attachments", attachments.to_string()));
        }

        let result: PostResponse = self.post_with_retry("wall.post", &params).await?;

        info!(
            "wall.post to {} created post {}",
            target_group_id, result.post_id
        );
        Ok(result.post_id)
    }

    async fn fetch_comments(
        &self,
        owner_id: i64,
        post_id: i64,
        limit: u32,
    ) -> Result<Vec<Comment>, CoreError> {
        let params = [
            ("owner_id", owner_id.to_string()),
            ("post_id", post_id.to_string()),
            ("count", limit.to_string()),
        ];

        let result: ItemsResponse<RawComment> =
            self.call_with_retry("wall.getComments", &params).await?;

        Ok(result
            .items
            .into_iter()
            .map(|c| Comment {
                id: c.id,
                from_id: c.from_id,
                date: c.date,
                text: c.text,
            })
            .collect())
    }
}

/// Translates a VK error body into the local taxonomy. Error 6 is the
/// per-second throttle; 9 is the flood guard. 7, 15, 200 and 214 are the
/// permission family; 104 and 113 mean the resource does not exist.
pub(crate) fn map_vk_error(code: i64, message: String, method: &str) -> VkApiError {
    match code {
        6 | 9 => VkApiError::RateLimitExceeded { retry_after: 1 },
        7 | 15 | 200 | 214 => VkApiError::PermissionDenied {
            method: method.to_string(),
        },
        104 | 113 => VkApiError::NotFound { resource: message },
        _ => VkApiError::Api { code, message },
    }
}

#[derive(Debug, Deserialize)]
struct VkEnvelope<T> {
    response: Option<T>,
    error: Option<VkErrorBody>,
}

#[derive(Debug, Deserialize)]
struct VkErrorBody {
    error_code: i64,
    error_msg: String,
}

#[derive(Debug, Deserialize)]
struct ItemsResponse<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    id: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPost {
    id: i64,
    owner_id: i64,
    date: i64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    attachments: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    post_id: i64,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: i64,
    from_id: i64,
    date: i64,
    #[serde(default)]
    text: String,
}

/// VK nests the attachment body under a field named after its type:
/// `{"type": "photo", "photo": {"owner_id": 5, "id": 9}}`. Types the
/// repost call cannot carry are dropped here.
pub(crate) fn parse_attachment(value: &serde_json::Value) -> Option<Attachment> {
    let kind_str = value.get("type")?.as_str()?;
    let kind = AttachmentKind::from_api_type(kind_str)?;
    let body = value.get(kind_str)?;
    Some(Attachment {
        kind,
        owner_id: body.get("owner_id")?.as_i64()?,
        id: body.get("id")?.as_i64()?,
    })
}

impl From<RawPost> for WallPost {
    fn from(raw: RawPost) -> Self {
        let attachments = raw
            .attachments
            .iter()
            .filter_map(parse_attachment)
            .collect();
        Self {
            id: raw.id,
            owner_id: raw.owner_id,
            date: raw.date,
            text: raw.text,
            attachments,
        }
    }
}
