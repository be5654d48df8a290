use repostbot_core::{ConfigError, CoreError, DatabaseError, ErrorExt, VkApiError};
use std::time::Duration;

#[test]
fn test_retryable_errors() {
    let retryable_error = CoreError::VkApi(VkApiError::RateLimitExceeded { retry_after: 60 });
    assert!(retryable_error.is_retryable());

    let timeout = CoreError::VkApi(VkApiError::RequestTimeout);
    assert!(timeout.is_retryable());

    let server_error = CoreError::VkApi(VkApiError::ServerError { status_code: 503 });
    assert!(server_error.is_retryable());

    let permission = CoreError::VkApi(VkApiError::PermissionDenied {
        method: "wall.post".to_string(),
    });
    assert!(!permission.is_retryable());

    let non_retryable_error = CoreError::Config(ConfigError::MissingField {
        field: "access_token".to_string(),
    });
    assert!(!non_retryable_error.is_retryable());
}

#[test]
fn test_retry_after() {
    let rate_limit_error = CoreError::VkApi(VkApiError::RateLimitExceeded { retry_after: 60 });
    assert_eq!(rate_limit_error.retry_after(), Some(Duration::from_secs(60)));

    let locked = CoreError::Database(DatabaseError::DatabaseLocked);
    assert_eq!(locked.retry_after(), Some(Duration::from_millis(100)));

    let permission = CoreError::VkApi(VkApiError::PermissionDenied {
        method: "wall.post".to_string(),
    });
    assert_eq!(permission.retry_after(), None);
}

#[test]
fn test_user_friendly_messages() {
    let api_error = CoreError::VkApi(VkApiError::PermissionDenied {
        method: "wall.post".to_string(),
    });
    let message = api_error.user_friendly_message();
    assert!(message.contains("wall.post"));

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "access_token".to_string(),
    });
    let message = config_error.user_friendly_message();
    assert!(message.contains("access_token"));
}

#[test]
fn test_error_conversions() {
    let api: CoreError = VkApiError::RequestTimeout.into();
    assert!(matches!(api, CoreError::VkApi(_)));

    let db: CoreError = DatabaseError::DatabaseLocked.into();
    assert!(matches!(db, CoreError::Database(_)));

    let config: CoreError = ConfigError::ValidationFailed {
        reason: "empty".to_string(),
    }
    .into();
    assert!(matches!(config, CoreError::Config(_)));
}
