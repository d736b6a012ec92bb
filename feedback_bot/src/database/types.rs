use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use teloxide::types::{ChatId, MessageId, UserId};

/// Converts unix seconds from the database into a proper time, clamping garbage to the epoch.
pub(super) fn time_from_db(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Telegram user IDs are u64, but SQLite only has i64. They fit.
#[allow(clippy::cast_sign_loss)]
pub(super) fn user_from_db(id: i64) -> UserId {
    UserId(id as u64)
}

#[allow(clippy::cast_possible_wrap)]
pub(super) fn user_to_db(id: UserId) -> i64 {
    id.0 as i64
}

/// A feedback message about to be stored.
#[derive(Clone, Debug)]
pub struct NewFeedback {
    pub group_id: ChatId,
    pub group_name: String,
    pub user_id: UserId,
    pub username: Option<String>,
    pub display_name: String,
    pub message_id: MessageId,
    pub message_link: String,
    pub media_count: u32,
    pub timestamp: DateTime<Utc>,
}

/// A stored feedback message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedbackRecord {
    pub id: i64,
    pub group_id: ChatId,
    pub group_name: String,
    pub user_id: UserId,
    pub username: Option<String>,
    pub display_name: String,
    pub message_id: MessageId,
    pub message_link: String,
    pub media_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    pub(super) const COLUMNS: &'static str = "id, group_id, group_name, user_id, username, \
        display_name, message_id, message_link, media_count, timestamp";

    pub(super) fn from_sqlite_row(row: &SqliteRow) -> FeedbackRecord {
        FeedbackRecord {
            id: row.get("id"),
            group_id: ChatId(row.get("group_id")),
            group_name: row.get("group_name"),
            user_id: user_from_db(row.get("user_id")),
            username: row.get("username"),
            display_name: row.get("display_name"),
            message_id: MessageId(row.get("message_id")),
            message_link: row.get("message_link"),
            media_count: row.get("media_count"),
            timestamp: time_from_db(row.get("timestamp")),
        }
    }

    /// `@username` if there is one, display name otherwise.
    #[must_use]
    pub fn sender_name(&self) -> String {
        match &self.username {
            Some(username) => format!("@{username}"),
            None if !self.display_name.is_empty() => self.display_name.clone(),
            None => format!("User {}", self.user_id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizedGroup {
    pub group_id: ChatId,
    pub group_name: String,
    pub authorized_by: UserId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizedUser {
    pub user_id: UserId,
    pub granted_by: UserId,
    pub timestamp: DateTime<Utc>,
}

/// Reminder text of a group. There is at most one per group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reminder {
    pub group_id: ChatId,
    pub text: String,
    pub set_by: UserId,
    pub timestamp: DateTime<Utc>,
}

/// How many feedback messages a user posted in a group on a given UTC day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContestEntry {
    pub group_id: ChatId,
    pub user_id: UserId,
    pub display_name: String,
    pub count: u32,
    pub date: NaiveDate,
}

/// Result row of [`Database::feedback_counts_by_user`].
///
/// [`Database::feedback_counts_by_user`]: super::Database::feedback_counts_by_user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserFeedbackCount {
    pub user_id: UserId,
    pub username: Option<String>,
    pub display_name: String,
    pub count: u32,
}

/// Result row of [`Database::feedback_counts_by_day`].
///
/// [`Database::feedback_counts_by_day`]: super::Database::feedback_counts_by_day
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DayFeedbackCount {
    pub date: NaiveDate,
    pub count: u32,
}
