//! Exempt user and chat ids.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use teleclean_core::{AppError, AppResult, ChatId};

/// Authors and channels whose messages are never deleted.
///
/// Holds user ids (positive) and channel ids (negative, usually `-100...`)
/// in one set. Only membership is meaningful.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptionSet(HashSet<i64>);

impl ExemptionSet {
    /// Creates an exemption set from raw ids.
    #[must_use]
    pub fn from_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self(ids.into_iter().collect())
    }

    /// Parses a comma-separated list such as `12345,-100123456789`.
    ///
    /// Blank entries are ignored.
    pub fn parse_list(value: &str) -> AppResult<Self> {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry.parse::<i64>().map_err(|error| {
                    AppError::Validation(format!("invalid exemption id '{entry}': {error}"))
                })
            })
            .collect::<AppResult<HashSet<i64>>>()
            .map(Self)
    }

    /// Returns whether the raw id is exempt.
    #[must_use]
    pub fn contains(&self, id: i64) -> bool {
        self.0.contains(&id)
    }

    /// Returns whether a message author is exempt.
    #[must_use]
    pub fn covers_author(&self, author_id: Option<i64>) -> bool {
        author_id.is_some_and(|id| self.contains(id))
    }

    /// Returns whether a whole channel-like conversation is exempt.
    ///
    /// Matches either the signed id or its absolute value so both
    /// `-100123` and `100123` entries exempt chat `-100123`.
    #[must_use]
    pub fn covers_chat(&self, chat_id: ChatId) -> bool {
        if !chat_id.is_channel_like() {
            return false;
        }

        let raw = chat_id.as_i64();
        self.contains(raw) || raw.checked_abs().is_some_and(|id| self.contains(id))
    }

    /// Returns the number of exempt ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether no id is exempt.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the exempt ids in ascending order.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.0.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}
