//! Operator progress alerts delivered as one continuously edited Telegram message.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use teleclean_application::{ProgressSink, SweepProgress};
use teleclean_core::AppResult;

use crate::telegram_bot_client::TelegramBotClient;

const BAR_CELLS: u64 = 20;

/// Progress sink that keeps the owner informed through a single alert message.
pub struct TelegramProgressSink {
    client: Arc<TelegramBotClient>,
    owner_id: i64,
    alert_message_id: Mutex<Option<i64>>,
}

impl TelegramProgressSink {
    /// Creates a sink that reports to `owner_id`.
    #[must_use]
    pub fn new(client: Arc<TelegramBotClient>, owner_id: i64) -> Self {
        Self {
            client,
            owner_id,
            alert_message_id: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ProgressSink for TelegramProgressSink {
    async fn emit(&self, progress: SweepProgress) -> AppResult<()> {
        let text = render_progress(&progress);
        let mut alert_message_id = self.alert_message_id.lock().await;

        // A fresh sweep always starts a new alert.
        if progress.completed_chats == 0 && progress.in_progress {
            *alert_message_id = None;
        }

        if let Some(message_id) = *alert_message_id {
            match self
                .client
                .edit_message_text(self.owner_id, message_id, text.as_str())
                .await
            {
                Ok(()) => {
                    if !progress.in_progress {
                        *alert_message_id = None;
                    }
                    return Ok(());
                }
                Err(error) => {
                    warn!(error = %error, "failed to edit progress alert, sending a new one");
                }
            }
        }

        let message_id = self.client.send_message(self.owner_id, text.as_str()).await?;
        *alert_message_id = progress.in_progress.then_some(message_id);

        Ok(())
    }
}

fn progress_bar(completed: u64, total: u64) -> String {
    let filled = if total == 0 {
        0
    } else {
        (completed.min(total).saturating_mul(BAR_CELLS) / total).min(BAR_CELLS)
    };

    let mut bar = String::with_capacity(64);
    bar.push('[');
    for cell in 0..BAR_CELLS {
        bar.push(if cell < filled { '█' } else { '░' });
    }
    bar.push(']');
    bar
}

/// Renders a snapshot as HTML text.
fn render_progress(progress: &SweepProgress) -> String {
    let heading = if progress.in_progress {
        "⏳ <b>Cleanup in progress</b>"
    } else if progress.completed_chats < progress.total_chats {
        "⚠️ <b>Cleanup stopped</b>"
    } else {
        "✅ <b>Cleanup finished</b>"
    };

    let stats = &progress.stats;
    let mut text = String::with_capacity(256);
    let _ = writeln!(text, "{heading}");
    let _ = writeln!(
        text,
        "{} {:.1}%",
        progress_bar(progress.completed_chats, progress.total_chats),
        progress.percent()
    );
    let _ = writeln!(
        text,
        "Chats: {}/{}",
        progress.completed_chats, progress.total_chats
    );
    let _ = writeln!(text, "Messages: {}", stats.total_messages);
    let _ = writeln!(text, "Deleted: {}", stats.deleted_messages);
    let _ = writeln!(text, "Skipped: {}", stats.skipped_messages);
    let _ = writeln!(text, "Exempt: {}", stats.exempt_messages);
    let _ = write!(text, "Errors: {}", stats.error_messages);
    text
}
