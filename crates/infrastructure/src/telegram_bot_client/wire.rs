//! Bot API payloads and their conversion into application types.

use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;

use teleclean_application::{ChatUpdate, DeleteMessageError};
use teleclean_core::{AppError, AppResult, ChatId, MessageId};
use teleclean_domain::{AuthorKind, ChatKind, MembershipStatus, MessageRef};

#[derive(Debug, Deserialize)]
pub(super) struct Envelope {
    pub(super) ok: bool,
    #[serde(default)]
    pub(super) result: Option<Value>,
    #[serde(default)]
    pub(super) error_code: Option<i64>,
    #[serde(default)]
    pub(super) description: Option<String>,
    #[serde(default)]
    pub(super) parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ResponseParameters {
    #[serde(default)]
    pub(super) migrate_to_chat_id: Option<i64>,
    #[serde(default)]
    pub(super) retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireChat {
    pub(super) id: i64,
    #[serde(rename = "type")]
    pub(super) kind: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireUser {
    pub(super) id: i64,
    #[serde(default)]
    pub(super) is_bot: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireMessage {
    pub(super) message_id: i64,
    pub(super) date: i64,
    pub(super) chat: WireChat,
    #[serde(default)]
    pub(super) from: Option<WireUser>,
    #[serde(default)]
    pub(super) sender_chat: Option<WireChat>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireChatMember {
    pub(super) status: String,
    #[serde(default)]
    pub(super) can_delete_messages: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireChatMemberUpdated {
    pub(super) chat: WireChat,
    pub(super) new_chat_member: WireChatMember,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireUpdate {
    pub(super) update_id: i64,
    #[serde(default)]
    pub(super) message: Option<WireMessage>,
    #[serde(default)]
    pub(super) channel_post: Option<WireMessage>,
    #[serde(default)]
    pub(super) my_chat_member: Option<WireChatMemberUpdated>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SentMessage {
    pub(super) message_id: i64,
}

/// Failure of one Bot API call after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ApiFailure {
    /// The API answered with `ok: false`.
    Rejected {
        error_code: i64,
        description: String,
        migrate_to: Option<i64>,
    },
    /// Every attempt failed with a retryable status or transport error.
    Exhausted(String),
}

impl ApiFailure {
    pub(super) fn from_envelope(envelope: Envelope) -> Self {
        Self::Rejected {
            error_code: envelope.error_code.unwrap_or_default(),
            description: envelope
                .description
                .unwrap_or_else(|| "no description".to_owned()),
            migrate_to: envelope
                .parameters
                .and_then(|parameters| parameters.migrate_to_chat_id),
        }
    }

    fn description_contains(&self, needle: &str) -> bool {
        match self {
            Self::Rejected { description, .. } => description.to_lowercase().contains(needle),
            Self::Exhausted(_) => false,
        }
    }

    /// Maps a failed metadata call into an application error.
    pub(super) fn into_app_error(self, context: &str) -> AppError {
        let chat_missing = self.description_contains("chat not found");
        match self {
            Self::Rejected {
                error_code: 403,
                description,
                ..
            } => AppError::Forbidden(format!("{context}: {description}")),
            Self::Rejected { description, .. } if chat_missing => {
                AppError::NotFound(format!("{context}: {description}"))
            }
            Self::Rejected {
                error_code,
                description,
                ..
            } => AppError::Internal(format!("{context} failed with {error_code}: {description}")),
            Self::Exhausted(message) => AppError::Unavailable(format!("{context}: {message}")),
        }
    }

    /// Maps a failed `deleteMessage` call into the typed delete failure.
    pub(super) fn into_delete_error(self) -> DeleteMessageError {
        if self.description_contains("message to delete not found") {
            return DeleteMessageError::AlreadyGone(self.to_string());
        }

        if self.description_contains("chat not found") {
            return DeleteMessageError::ChatLost(self.to_string());
        }

        match self {
            Self::Rejected {
                error_code: 403, ..
            }
            | Self::Rejected {
                migrate_to: Some(_),
                ..
            } => DeleteMessageError::ChatLost(self.to_string()),
            Self::Rejected { .. } => DeleteMessageError::Forbidden(self.to_string()),
            Self::Exhausted(message) => DeleteMessageError::Transient(message),
        }
    }
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected {
                error_code,
                description,
                ..
            } => write!(formatter, "{error_code}: {description}"),
            Self::Exhausted(message) => formatter.write_str(message),
        }
    }
}

pub(super) fn chat_kind(chat: &WireChat) -> AppResult<ChatKind> {
    chat.kind.parse::<ChatKind>()
}

/// Converts a chat member into delete rights.
pub(super) fn can_delete(member: &WireChatMember, status: MembershipStatus) -> bool {
    match status {
        MembershipStatus::Creator => true,
        MembershipStatus::Administrator => member.can_delete_messages.unwrap_or(false),
        _ => false,
    }
}

fn message_ref(message: &WireMessage) -> AppResult<MessageRef> {
    let created_at = DateTime::from_timestamp(message.date, 0).ok_or_else(|| {
        AppError::Validation(format!(
            "message '{}' has invalid date '{}'",
            message.message_id, message.date
        ))
    })?;

    let (author_id, author_kind) = match (&message.sender_chat, &message.from) {
        (Some(sender_chat), _) => (Some(sender_chat.id), AuthorKind::Channel),
        (None, Some(from)) if from.is_bot => (Some(from.id), AuthorKind::Bot),
        (None, Some(from)) => (Some(from.id), AuthorKind::User),
        (None, None) => (None, AuthorKind::Channel),
    };

    Ok(MessageRef {
        id: MessageId::new(message.message_id),
        author_id,
        author_kind,
        created_at,
    })
}

/// Converts one raw update; updates the application ignores yield `None`.
pub(super) fn chat_update(update: &WireUpdate) -> AppResult<Option<ChatUpdate>> {
    if let Some(message) = update.message.as_ref().or(update.channel_post.as_ref()) {
        return Ok(Some(ChatUpdate::MessageSeen {
            chat_id: ChatId::new(message.chat.id),
            message: message_ref(message)?,
        }));
    }

    if let Some(member_update) = &update.my_chat_member {
        return Ok(Some(ChatUpdate::MembershipChanged {
            chat_id: ChatId::new(member_update.chat.id),
            kind: chat_kind(&member_update.chat)?,
            status: member_update
                .new_chat_member
                .status
                .parse::<MembershipStatus>()?,
        }));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use teleclean_application::{ChatUpdate, DeleteMessageError};
    use teleclean_core::{AppError, ChatId, MessageId};
    use teleclean_domain::{AuthorKind, ChatKind, MembershipStatus};

    use super::{ApiFailure, WireUpdate, chat_update};

    fn rejected(error_code: i64, description: &str) -> ApiFailure {
        ApiFailure::Rejected {
            error_code,
            description: description.to_owned(),
            migrate_to: None,
        }
    }

    fn parse(value: serde_json::Value) -> WireUpdate {
        serde_json::from_value(value).unwrap_or_else(|error| panic!("invalid fixture: {error}"))
    }

    #[test]
    fn delete_failures_map_to_typed_errors() {
        assert!(matches!(
            rejected(400, "Bad Request: message to delete not found").into_delete_error(),
            DeleteMessageError::AlreadyGone(_)
        ));
        assert!(matches!(
            rejected(400, "Bad Request: message can't be deleted for everyone").into_delete_error(),
            DeleteMessageError::Forbidden(_)
        ));
        assert!(matches!(
            rejected(403, "Forbidden: bot was kicked from the supergroup chat").into_delete_error(),
            DeleteMessageError::ChatLost(_)
        ));
        assert!(matches!(
            rejected(400, "Bad Request: chat not found").into_delete_error(),
            DeleteMessageError::ChatLost(_)
        ));
        assert!(matches!(
            ApiFailure::Exhausted("HTTP 502".to_owned()).into_delete_error(),
            DeleteMessageError::Transient(_)
        ));
    }

    #[test]
    fn metadata_failures_map_to_app_errors() {
        assert!(matches!(
            rejected(403, "Forbidden: bot is not a member").into_app_error("getChat"),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            rejected(400, "Bad Request: chat not found").into_app_error("getChat"),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            ApiFailure::Exhausted("timed out".to_owned()).into_app_error("getChat"),
            AppError::Unavailable(_)
        ));
    }

    #[test]
    fn messages_are_attributed_to_their_author() {
        let update = parse(json!({
            "update_id": 10,
            "message": {
                "message_id": 55,
                "date": 1_772_366_400,
                "chat": {"id": -1001, "type": "supergroup"},
                "from": {"id": 777, "is_bot": true, "first_name": "helper"}
            }
        }));

        let converted = chat_update(&update);
        assert!(converted.is_ok());
        let Ok(Some(ChatUpdate::MessageSeen { chat_id, message })) = converted else {
            unreachable!();
        };
        assert_eq!(chat_id, ChatId::new(-1001));
        assert_eq!(message.id, MessageId::new(55));
        assert_eq!(message.author_id, Some(777));
        assert_eq!(message.author_kind, AuthorKind::Bot);
    }

    #[test]
    fn channel_posts_are_attributed_to_the_channel() {
        let update = parse(json!({
            "update_id": 11,
            "channel_post": {
                "message_id": 9,
                "date": 1_772_366_400,
                "chat": {"id": -100_200, "type": "channel"},
                "sender_chat": {"id": -100_200, "type": "channel"}
            }
        }));

        let Ok(Some(ChatUpdate::MessageSeen { message, .. })) = chat_update(&update) else {
            unreachable!();
        };
        assert_eq!(message.author_kind, AuthorKind::Channel);
        assert_eq!(message.author_id, Some(-100_200));
    }

    #[test]
    fn membership_updates_carry_kind_and_status() {
        let update = parse(json!({
            "update_id": 12,
            "my_chat_member": {
                "chat": {"id": -1001, "type": "group"},
                "new_chat_member": {"status": "kicked", "user": {"id": 1, "is_bot": true}}
            }
        }));

        let converted = chat_update(&update);
        assert_eq!(
            converted.ok().flatten(),
            Some(ChatUpdate::MembershipChanged {
                chat_id: ChatId::new(-1001),
                kind: ChatKind::Group,
                status: MembershipStatus::Kicked,
            })
        );
    }

    #[test]
    fn unknown_chat_kinds_fail_loudly() {
        let update = parse(json!({
            "update_id": 13,
            "my_chat_member": {
                "chat": {"id": -1001, "type": "forum"},
                "new_chat_member": {"status": "member"}
            }
        }));

        assert!(chat_update(&update).is_err());
    }
}
