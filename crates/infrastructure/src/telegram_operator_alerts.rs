//! Owner alerts sent as standalone Telegram messages.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use teleclean_application::{OperatorAlert, OperatorAlertSink};
use teleclean_core::AppResult;

use crate::telegram_bot_client::TelegramBotClient;

/// Delivers operator alerts to the bot owner's private chat.
pub struct TelegramOperatorAlerts {
    client: Arc<TelegramBotClient>,
    owner_id: i64,
}

impl TelegramOperatorAlerts {
    /// Creates an alert sink that reports to `owner_id`.
    #[must_use]
    pub fn new(client: Arc<TelegramBotClient>, owner_id: i64) -> Self {
        Self { client, owner_id }
    }
}

#[async_trait]
impl OperatorAlertSink for TelegramOperatorAlerts {
    async fn send(&self, alert: OperatorAlert) -> AppResult<()> {
        let text = render_alert(&alert, Utc::now());
        self.client.send_message(self.owner_id, text.as_str()).await?;
        Ok(())
    }
}

fn render_alert(alert: &OperatorAlert, now: DateTime<Utc>) -> String {
    let time = now.format("%Y-%m-%d %H:%M:%S UTC");
    let mut text = String::with_capacity(256);

    match alert {
        OperatorAlert::Started { config } => {
            let thresholds = config.thresholds;
            let _ = writeln!(text, "🟢 <b>TeleClean Bot Started</b>\n");
            let _ = writeln!(text, "⏰ <b>Time:</b> {time}\n");
            let _ = writeln!(text, "⚙️ <b>Configuration:</b>");
            let _ = writeln!(
                text,
                "• User messages: {} minutes",
                thresholds.user_message_age_minutes()
            );
            let _ = writeln!(
                text,
                "• All messages: {} minutes",
                thresholds.all_message_age_minutes()
            );
            let _ = writeln!(
                text,
                "• Exceptions: {} (users &amp; channels)",
                config.exemptions.len()
            );
            let _ = writeln!(
                text,
                "• Dry run: {}\n",
                if thresholds.dry_run() { "Yes" } else { "No" }
            );
            let _ = write!(text, "<i>Starting message deletion process...</i>");
        }
        OperatorAlert::SweepFailed { context, error } => {
            let _ = writeln!(text, "⚠️ <b>TeleClean Error Occurred</b>\n");
            let _ = writeln!(text, "⏰ <b>Time:</b> {time}\n");
            let _ = writeln!(text, "❌ <b>Error Message:</b>");
            let _ = writeln!(text, "<code>{}</code>\n", escape_html(error));
            let _ = write!(text, "📋 <b>Context:</b> {}", escape_html(context));
        }
        OperatorAlert::RateLimited { throttled_calls } => {
            let _ = writeln!(text, "⚠️ <b>TeleClean Rate Limit Warning</b>\n");
            let _ = writeln!(text, "⏰ <b>Time:</b> {time}\n");
            let _ = writeln!(
                text,
                "The bot is experiencing rate limits from Telegram API ({throttled_calls} throttled call(s))."
            );
            let _ = write!(
                text,
                "Deletion operations will slow down to comply with Telegram's limits."
            );
        }
    }

    text
}

fn escape_html(text: &str) -> String {
    text.chars()
        .fold(String::with_capacity(text.len()), |mut escaped, ch| {
            match ch {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                _ => escaped.push(ch),
            }
            escaped
        })
}
