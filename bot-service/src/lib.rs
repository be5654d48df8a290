//! The bot's moving parts: group discovery, post fetching, the repost
//! orchestrator, Telegram reporting and the supervisory cycle loop.

pub mod discovery;
pub mod notifier;
pub mod orchestrator;
pub mod service;

pub use notifier::Notifier;
pub use service::BotService;
