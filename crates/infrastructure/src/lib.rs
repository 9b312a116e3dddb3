//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_chat_registry;
mod postgres_chat_registry;
mod postgres_deletion_log;
mod postgres_message_index;
mod postgres_sweep_settings_repository;
mod redis_sweep_lease_coordinator;
mod telegram_bot_client;
mod telegram_operator_alerts;
mod telegram_progress_sink;

pub use in_memory_chat_registry::InMemoryChatRegistry;
pub use postgres_chat_registry::PostgresChatRegistry;
pub use postgres_deletion_log::PostgresDeletionLog;
pub use postgres_message_index::PostgresMessageIndex;
pub use postgres_sweep_settings_repository::PostgresSweepSettingsRepository;
pub use redis_sweep_lease_coordinator::RedisSweepLeaseCoordinator;
pub use telegram_bot_client::TelegramBotClient;
pub use telegram_operator_alerts::TelegramOperatorAlerts;
pub use telegram_progress_sink::TelegramProgressSink;
