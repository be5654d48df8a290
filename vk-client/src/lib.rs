pub mod api;
pub mod rate_limiter;
pub mod retry;


pub use api::{VkApi, VkClient, VkClientConfig};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use retry::RetryConfig;
