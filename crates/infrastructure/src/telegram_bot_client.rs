//! Telegram Bot API adapter for chat metadata, deletion and update polling.

mod wire;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use teleclean_application::{
    BotPermissions, ChatInfoProvider, ChatLookup, DeleteMessageError, MessageDeleter,
    RateLimitGauge, UpdateBatch, UpdateSource,
};
use teleclean_core::{AppError, AppResult, ChatId, MessageId};
use teleclean_domain::{ConversationRef, MembershipStatus};

use wire::{ApiFailure, Envelope, SentMessage, WireChat, WireChatMember, WireUpdate};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_TIMEOUT_SECONDS: u32 = 30;
const MAX_RETRY_AFTER_SECONDS: u64 = 60;

/// HTTP client for the Telegram Bot API.
pub struct TelegramBotClient {
    http_client: reqwest::Client,
    base_url: String,
    bot_token: String,
    bot_user_id: i64,
    max_attempts: u8,
    retry_backoff_ms: u64,
    poll_timeout_seconds: u32,
    throttled_calls: AtomicU64,
}

impl TelegramBotClient {
    /// Creates a client; the bot's own user id is read from the token prefix.
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        bot_token: impl Into<String>,
        max_attempts: u8,
        retry_backoff_ms: u64,
    ) -> AppResult<Self> {
        let bot_token = bot_token.into();
        let bot_user_id = bot_token
            .split_once(':')
            .and_then(|(prefix, _)| prefix.parse::<i64>().ok())
            .ok_or_else(|| {
                AppError::Validation("BOT_TOKEN must look like '<bot id>:<secret>'".to_owned())
            })?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            bot_token,
            bot_user_id,
            max_attempts: max_attempts.max(1),
            retry_backoff_ms: retry_backoff_ms.max(50),
            poll_timeout_seconds: DEFAULT_POLL_TIMEOUT_SECONDS,
            throttled_calls: AtomicU64::new(0),
        })
    }

    /// Sets the long-poll timeout used by `getUpdates`.
    #[must_use]
    pub fn with_poll_timeout(mut self, poll_timeout_seconds: u32) -> Self {
        self.poll_timeout_seconds = poll_timeout_seconds;
        self
    }

    /// Returns the bot's own user id.
    #[must_use]
    pub fn bot_user_id(&self) -> i64 {
        self.bot_user_id
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.bot_token)
    }

    /// Sends an HTML formatted message and returns its id.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> AppResult<i64> {
        let sent: SentMessage = self
            .call(
                "sendMessage",
                &json!({
                    "chat_id": chat_id,
                    "text": text,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }),
                REQUEST_TIMEOUT,
            )
            .await
            .map_err(|failure| failure.into_app_error("sendMessage"))?;

        Ok(sent.message_id)
    }

    /// Replaces the text of a message sent by the bot.
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> AppResult<()> {
        let result = self
            .call::<Value>(
                "editMessageText",
                &json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                    "text": text,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }),
                REQUEST_TIMEOUT,
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(ApiFailure::Rejected { description, .. })
                if description.contains("message is not modified") =>
            {
                Ok(())
            }
            Err(failure) => Err(failure.into_app_error("editMessageText")),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<T, ApiFailure> {
        let mut attempt = 0_u8;
        let mut last_error = String::new();

        while attempt < self.max_attempts {
            attempt = attempt.saturating_add(1);
            let mut delay_ms = self.retry_backoff_ms.saturating_mul(u64::from(attempt));

            let response = self
                .http_client
                .post(self.method_url(method))
                .timeout(timeout)
                .json(body)
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();
                    let envelope = response.json::<Envelope>().await;

                    match envelope {
                        Ok(envelope) if envelope.ok => {
                            let result = envelope.result.unwrap_or(Value::Null);
                            return serde_json::from_value::<T>(result).map_err(|error| {
                                ApiFailure::Rejected {
                                    error_code: i64::from(status.as_u16()),
                                    description: format!("unexpected {method} result: {error}"),
                                    migrate_to: None,
                                }
                            });
                        }
                        Ok(envelope)
                            if status.is_server_error()
                                || status == reqwest::StatusCode::TOO_MANY_REQUESTS =>
                        {
                            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                                self.throttled_calls.fetch_add(1, Ordering::Relaxed);
                            }
                            if let Some(retry_after) = envelope
                                .parameters
                                .as_ref()
                                .and_then(|parameters| parameters.retry_after)
                            {
                                delay_ms = retry_after.min(MAX_RETRY_AFTER_SECONDS).saturating_mul(1000);
                            }
                            last_error = format!(
                                "transient HTTP status {status} for {method}: {}",
                                envelope.description.unwrap_or_default()
                            );
                        }
                        Ok(envelope) => return Err(ApiFailure::from_envelope(envelope)),
                        Err(error) if status.is_success() => {
                            return Err(ApiFailure::Rejected {
                                error_code: i64::from(status.as_u16()),
                                description: format!("malformed {method} response: {error}"),
                                migrate_to: None,
                            });
                        }
                        Err(error) => {
                            last_error = format!("HTTP status {status} for {method}: {error}");
                        }
                    }
                }
                Err(error) => {
                    last_error = format!("{method} transport error: {error}");
                }
            }

            if attempt < self.max_attempts {
                debug!(method, attempt, delay_ms, "retrying bot api call");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }

        warn!(
            method,
            attempts = self.max_attempts,
            error = %last_error,
            "bot api call exhausted retries"
        );
        Err(ApiFailure::Exhausted(last_error))
    }
}

impl RateLimitGauge for TelegramBotClient {
    fn take_throttled_calls(&self) -> u64 {
        self.throttled_calls.swap(0, Ordering::Relaxed)
    }
}

#[async_trait]
impl ChatInfoProvider for TelegramBotClient {
    async fn get_chat(&self, chat_id: ChatId) -> AppResult<ChatLookup> {
        let result = self
            .call::<WireChat>(
                "getChat",
                &json!({ "chat_id": chat_id.as_i64() }),
                REQUEST_TIMEOUT,
            )
            .await;

        match result {
            Ok(chat) => Ok(ChatLookup::Found(ConversationRef::active(
                ChatId::new(chat.id),
                wire::chat_kind(&chat)?,
            ))),
            Err(ApiFailure::Rejected {
                migrate_to: Some(to),
                ..
            }) => Ok(ChatLookup::Migrated {
                to: ChatId::new(to),
            }),
            Err(failure) => Err(failure.into_app_error(&format!("getChat for '{chat_id}'"))),
        }
    }

    async fn get_bot_permissions(&self, chat_id: ChatId) -> AppResult<BotPermissions> {
        let member = self
            .call::<WireChatMember>(
                "getChatMember",
                &json!({ "chat_id": chat_id.as_i64(), "user_id": self.bot_user_id }),
                REQUEST_TIMEOUT,
            )
            .await
            .map_err(|failure| {
                failure.into_app_error(&format!("getChatMember for '{chat_id}'"))
            })?;

        let status = member.status.parse::<MembershipStatus>()?;
        if status.is_gone() {
            return Err(AppError::Forbidden(format!(
                "bot status in chat '{chat_id}' is '{}'",
                status.as_str()
            )));
        }

        Ok(BotPermissions {
            status,
            can_delete: wire::can_delete(&member, status),
        })
    }
}

#[async_trait]
impl MessageDeleter for TelegramBotClient {
    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), DeleteMessageError> {
        self.call::<Value>(
            "deleteMessage",
            &json!({ "chat_id": chat_id.as_i64(), "message_id": message_id.as_i64() }),
            REQUEST_TIMEOUT,
        )
        .await
        .map(|_| ())
        .map_err(ApiFailure::into_delete_error)
    }
}

#[async_trait]
impl UpdateSource for TelegramBotClient {
    async fn poll_updates(&self, offset: Option<i64>) -> AppResult<UpdateBatch> {
        let timeout = REQUEST_TIMEOUT + Duration::from_secs(u64::from(self.poll_timeout_seconds));
        let raw_updates = self
            .call::<Vec<WireUpdate>>(
                "getUpdates",
                &json!({
                    "offset": offset,
                    "timeout": self.poll_timeout_seconds,
                    "allowed_updates": ["message", "channel_post", "my_chat_member"],
                }),
                timeout,
            )
            .await
            .map_err(|failure| failure.into_app_error("getUpdates"))?;

        let next_offset = raw_updates
            .iter()
            .map(|update| update.update_id)
            .max()
            .map(|update_id| update_id.saturating_add(1));

        let mut updates = Vec::with_capacity(raw_updates.len());
        for raw_update in &raw_updates {
            match wire::chat_update(raw_update) {
                Ok(Some(update)) => updates.push(update),
                Ok(None) => {}
                Err(error) => warn!(
                    update_id = raw_update.update_id,
                    error = %error,
                    "skipping unreadable update"
                ),
            }
        }

        Ok(UpdateBatch {
            updates,
            next_offset,
        })
    }
}
