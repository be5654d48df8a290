use bot_service::{BotService, Notifier};
use database::Database;
use repostbot_core::ConfigSource;
use std::sync::Arc;
use tokio::sync::watch;
use vk_client::{VkClient, VkClientConfig};

const DATABASE_URL: &str = "sqlite://posts.db";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "repostbot=info,bot_service=info,vk_client=info,database=info".into()
            }),
        )
        .init();

    tracing::info!("Starting Repostbot - VK keyword repost bot");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    // A broken config at startup is fatal; the loop never starts.
    let (config_source, config) = ConfigSource::open(config_path)?;

    let db = Database::connect(DATABASE_URL).await?;
    db.run_migrations().await?;

    let proxy = if config.use_proxy {
        config.proxy_url.clone()
    } else {
        None
    };
    let api = Arc::new(VkClient::new(
        VkClientConfig::new(config.access_token.clone()).with_proxy(proxy),
    )?);

    let notifier = Notifier::from_config(&config)?;
    if notifier.is_enabled() {
        tracing::info!("Telegram notifications enabled");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut service = BotService::new(api, db.clone(), notifier, config, shutdown_rx)?
        .with_config_source(config_source);
    service.run().await;

    db.close().await;
    tracing::info!("Repostbot stopped");
    Ok(())
}
