mod types;

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
pub use sqlx::Error;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Executor, Row, Sqlite,
};
use teloxide::types::{ChatId, UserId};

pub use types::*;

type Pool = sqlx::Pool<Sqlite>;

/// Key of the forwarding destination in the `settings` table.
const FORWARD_DESTINATION_KEY: &str = "forward_destination";

pub struct Database {
    pool: Pool,
}

impl Database {
    /// Opens (creating if needed) the database at `url`, like `sqlite:feedback_bot.sqlite`.
    pub async fn new(url: &str) -> Result<Database, Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .pragma("cache_size", "-32768")
            .busy_timeout(std::time::Duration::from_secs(600));

        let pool = SqlitePoolOptions::new()
            .max_connections(32)
            .connect_with(options)
            .await?;

        Database::init(pool).await
    }

    /// A fresh database living only in memory. Single connection, because every
    /// connection to `:memory:` would see its own empty database.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Database, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;

        Database::init(pool).await
    }

    async fn init(pool: Pool) -> Result<Database, Error> {
        // FEEDBACK:
        // id (key, autoincrement)
        // group_id, user_id (i64; user IDs are u64 but fit)
        // username (may be NULL), display_name, group_name (strings)
        // message_id (i32 (because telegram bot api is just like that))
        // message_link (string)
        // media_count (how many media the message and its repliee carry)
        // timestamp (unix seconds, UTC)
        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id INTEGER NOT NULL,
                group_name TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                username TEXT NULL,
                display_name TEXT NOT NULL,
                message_id INTEGER NOT NULL,
                message_link TEXT NOT NULL,
                media_count INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            ) STRICT;",
        ))
        .await?;

        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS authorized_groups (
                group_id INTEGER PRIMARY KEY NOT NULL,
                group_name TEXT NOT NULL,
                authorized_by INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            ) STRICT;",
        ))
        .await?;

        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS authorized_users (
                user_id INTEGER PRIMARY KEY NOT NULL,
                granted_by INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            ) STRICT;",
        ))
        .await?;

        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS reminders (
                group_id INTEGER PRIMARY KEY NOT NULL,
                text TEXT NOT NULL,
                set_by INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            ) STRICT;",
        ))
        .await?;

        // DAILY_CONTEST:
        // date is a UTC day like "2024-01-31"
        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS daily_contest (
                group_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                count INTEGER NOT NULL,
                display_name TEXT NOT NULL,
                PRIMARY KEY (group_id, user_id, date)
            ) STRICT;",
        ))
        .await?;

        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            ) STRICT;",
        ))
        .await?;

        // Will fail harmlessly if the indexes already exist.
        let _ = sqlx::query("CREATE INDEX feedback_group_time ON feedback(group_id, timestamp);")
            .execute(&pool)
            .await;
        let _ = sqlx::query("CREATE INDEX feedback_time ON feedback(timestamp);")
            .execute(&pool)
            .await;

        Ok(Database { pool })
    }

    ///////////////////////////////////////
    // FEEDBACK
    ///////////////////////////////////////

    /// Stores a feedback message, but only if its group is authorized.
    /// Returns the new record's ID, or [`None`] if the group is not authorized.
    pub async fn add_feedback(&self, feedback: &NewFeedback) -> Result<Option<i64>, Error> {
        let result = sqlx::query(
            "INSERT INTO feedback(group_id, group_name, user_id, username, display_name,
                message_id, message_link, media_count, timestamp)
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM authorized_groups WHERE group_id=?);",
        )
        .bind(feedback.group_id.0)
        .bind(&feedback.group_name)
        .bind(user_to_db(feedback.user_id))
        .bind(feedback.username.as_deref())
        .bind(&feedback.display_name)
        .bind(feedback.message_id.0)
        .bind(&feedback.message_link)
        .bind(feedback.media_count)
        .bind(feedback.timestamp.timestamp())
        .bind(feedback.group_id.0)
        .execute(&self.pool)
        .await?;

        Ok((result.rows_affected() > 0).then(|| result.last_insert_rowid()))
    }

    /// All feedback of a group posted at or after `since`, newest first.
    pub async fn recent_feedback(
        &self,
        group_id: ChatId,
        since: DateTime<Utc>,
    ) -> Result<Vec<FeedbackRecord>, Error> {
        sqlx::query(&format!(
            "SELECT {} FROM feedback WHERE group_id=? AND timestamp>=?
            ORDER BY timestamp DESC, id DESC;",
            FeedbackRecord::COLUMNS
        ))
        .bind(group_id.0)
        .bind(since.timestamp())
        .map(|row: SqliteRow| FeedbackRecord::from_sqlite_row(&row))
        .fetch_all(&self.pool)
        .await
    }

    /// Feedback of one user in a group posted at or after `since`, newest first.
    pub async fn user_feedback(
        &self,
        group_id: ChatId,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<FeedbackRecord>, Error> {
        sqlx::query(&format!(
            "SELECT {} FROM feedback WHERE group_id=? AND user_id=? AND timestamp>=?
            ORDER BY timestamp DESC, id DESC;",
            FeedbackRecord::COLUMNS
        ))
        .bind(group_id.0)
        .bind(user_to_db(user_id))
        .bind(since.timestamp())
        .map(|row: SqliteRow| FeedbackRecord::from_sqlite_row(&row))
        .fetch_all(&self.pool)
        .await
    }

    /// Per-user feedback counts of a group over everything still stored, biggest first.
    pub async fn feedback_counts_by_user(
        &self,
        group_id: ChatId,
    ) -> Result<Vec<UserFeedbackCount>, Error> {
        // The name columns come from the newest record of each user.
        sqlx::query(
            "SELECT f.user_id, f.username, f.display_name, c.count
            FROM (
                SELECT user_id, COUNT(*) AS count, MAX(id) AS last_id
                FROM feedback WHERE group_id=? GROUP BY user_id
            ) c
            JOIN feedback f ON f.id = c.last_id
            ORDER BY c.count DESC, f.user_id ASC;",
        )
        .bind(group_id.0)
        .map(|row: SqliteRow| UserFeedbackCount {
            user_id: user_from_db(row.get("user_id")),
            username: row.get("username"),
            display_name: row.get("display_name"),
            count: row.get("count"),
        })
        .fetch_all(&self.pool)
        .await
    }

    /// Per-UTC-day feedback counts of a group over everything still stored, newest day first.
    pub async fn feedback_counts_by_day(
        &self,
        group_id: ChatId,
    ) -> Result<Vec<DayFeedbackCount>, Error> {
        sqlx::query(
            "SELECT date(timestamp, 'unixepoch') AS day, COUNT(*) AS count
            FROM feedback WHERE group_id=?
            GROUP BY day ORDER BY day DESC;",
        )
        .bind(group_id.0)
        .try_map(|row: SqliteRow| {
            Ok(DayFeedbackCount {
                date: row.try_get("day")?,
                count: row.try_get("count")?,
            })
        })
        .fetch_all(&self.pool)
        .await
    }

    /// Deletes all feedback posted strictly before `cutoff`. Returns how many were deleted.
    pub async fn delete_feedback_before(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        sqlx::query("DELETE FROM feedback WHERE timestamp<?;")
            .bind(cutoff.timestamp())
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
    }

    /// Deletes all feedback there is. Returns how many were deleted.
    pub async fn clear_feedback(&self) -> Result<u64, Error> {
        sqlx::query("DELETE FROM feedback;")
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
    }

    /// Find a user ID by username among users who have posted feedback in this group.
    pub async fn username_to_userid(
        &self,
        group_id: ChatId,
        username: &str,
    ) -> Result<Option<UserId>, Error> {
        sqlx::query(
            "SELECT user_id FROM feedback WHERE group_id=? AND username=? COLLATE NOCASE
            ORDER BY id DESC LIMIT 1;",
        )
        .bind(group_id.0)
        .bind(username.trim_start_matches('@'))
        .map(|row: SqliteRow| user_from_db(row.get("user_id")))
        .fetch_optional(&self.pool)
        .await
    }

    ///////////////////////////////////////
    // AUTHORIZED GROUPS
    ///////////////////////////////////////

    /// Authorizes a group. Authorizing it again just updates the name.
    pub async fn authorize_group(
        &self,
        group_id: ChatId,
        group_name: &str,
        authorized_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO authorized_groups(group_id, group_name, authorized_by, timestamp)
            VALUES (?, ?, ?, ?)
        ON CONFLICT DO
            UPDATE SET group_name=excluded.group_name;",
        )
        .bind(group_id.0)
        .bind(group_name)
        .bind(user_to_db(authorized_by))
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns `true` if the group was authorized before this.
    pub async fn deauthorize_group(&self, group_id: ChatId) -> Result<bool, Error> {
        sqlx::query("DELETE FROM authorized_groups WHERE group_id=?;")
            .bind(group_id.0)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }

    pub async fn is_group_authorized(&self, group_id: ChatId) -> Result<bool, Error> {
        sqlx::query("SELECT 1 FROM authorized_groups WHERE group_id=?;")
            .bind(group_id.0)
            .fetch_optional(&self.pool)
            .await
            .map(|x| x.is_some())
    }

    pub async fn authorized_groups(&self) -> Result<Vec<AuthorizedGroup>, Error> {
        sqlx::query(
            "SELECT group_id, group_name, authorized_by, timestamp
            FROM authorized_groups ORDER BY timestamp;",
        )
        .map(|row: SqliteRow| AuthorizedGroup {
            group_id: ChatId(row.get("group_id")),
            group_name: row.get("group_name"),
            authorized_by: user_from_db(row.get("authorized_by")),
            timestamp: time_from_db(row.get("timestamp")),
        })
        .fetch_all(&self.pool)
        .await
    }

    ///////////////////////////////////////
    // AUTHORIZED USERS
    ///////////////////////////////////////

    pub async fn authorize_user(
        &self,
        user_id: UserId,
        granted_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO authorized_users(user_id, granted_by, timestamp)
            VALUES (?, ?, ?)
        ON CONFLICT DO NOTHING;",
        )
        .bind(user_to_db(user_id))
        .bind(user_to_db(granted_by))
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns `true` if the user was authorized before this.
    pub async fn deauthorize_user(&self, user_id: UserId) -> Result<bool, Error> {
        sqlx::query("DELETE FROM authorized_users WHERE user_id=?;")
            .bind(user_to_db(user_id))
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }

    pub async fn is_user_authorized(&self, user_id: UserId) -> Result<bool, Error> {
        sqlx::query("SELECT 1 FROM authorized_users WHERE user_id=?;")
            .bind(user_to_db(user_id))
            .fetch_optional(&self.pool)
            .await
            .map(|x| x.is_some())
    }

    pub async fn authorized_users(&self) -> Result<Vec<AuthorizedUser>, Error> {
        sqlx::query(
            "SELECT user_id, granted_by, timestamp FROM authorized_users ORDER BY timestamp;",
        )
        .map(|row: SqliteRow| AuthorizedUser {
            user_id: user_from_db(row.get("user_id")),
            granted_by: user_from_db(row.get("granted_by")),
            timestamp: time_from_db(row.get("timestamp")),
        })
        .fetch_all(&self.pool)
        .await
    }

    ///////////////////////////////////////
    // REMINDERS
    ///////////////////////////////////////

    /// Sets the reminder of a group, replacing any previous one.
    pub async fn set_reminder(
        &self,
        group_id: ChatId,
        text: &str,
        set_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO reminders(group_id, text, set_by, timestamp)
            VALUES (?, ?, ?, ?)
        ON CONFLICT DO
            UPDATE SET text=excluded.text, set_by=excluded.set_by, timestamp=excluded.timestamp;",
        )
        .bind(group_id.0)
        .bind(text)
        .bind(user_to_db(set_by))
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns `true` if there was a reminder to remove.
    pub async fn remove_reminder(&self, group_id: ChatId) -> Result<bool, Error> {
        sqlx::query("DELETE FROM reminders WHERE group_id=?;")
            .bind(group_id.0)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }

    /// Every reminder of every group.
    pub async fn reminders(&self) -> Result<Vec<Reminder>, Error> {
        sqlx::query("SELECT group_id, text, set_by, timestamp FROM reminders ORDER BY group_id;")
            .map(|row: SqliteRow| Reminder {
                group_id: ChatId(row.get("group_id")),
                text: row.get("text"),
                set_by: user_from_db(row.get("set_by")),
                timestamp: time_from_db(row.get("timestamp")),
            })
            .fetch_all(&self.pool)
            .await
    }

    ///////////////////////////////////////
    // DAILY CONTEST
    ///////////////////////////////////////

    /// Counts one more feedback for this user in this group on `date`.
    pub async fn bump_contest(
        &self,
        group_id: ChatId,
        user_id: UserId,
        display_name: &str,
        date: NaiveDate,
    ) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO daily_contest(group_id, user_id, date, count, display_name)
            VALUES (?, ?, ?, 1, ?)
        ON CONFLICT DO
            UPDATE SET count=count+1, display_name=excluded.display_name;",
        )
        .bind(group_id.0)
        .bind(user_to_db(user_id))
        .bind(date)
        .bind(display_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Winners of `date` in every group: everyone tied at that group's highest count.
    /// Sorted by group, then user.
    pub async fn contest_winners(&self, date: NaiveDate) -> Result<Vec<ContestEntry>, Error> {
        sqlx::query(
            "SELECT d.group_id, d.user_id, d.date, d.count, d.display_name
            FROM daily_contest d
            WHERE d.date=? AND d.count = (
                SELECT MAX(count) FROM daily_contest m
                WHERE m.group_id=d.group_id AND m.date=d.date
            )
            ORDER BY d.group_id, d.user_id;",
        )
        .bind(date)
        .try_map(|row: SqliteRow| {
            Ok(ContestEntry {
                group_id: ChatId(row.try_get("group_id")?),
                user_id: user_from_db(row.try_get("user_id")?),
                display_name: row.try_get("display_name")?,
                count: row.try_get("count")?,
                date: row.try_get("date")?,
            })
        })
        .fetch_all(&self.pool)
        .await
    }

    /// Contest entry of one user on one day, if they have any.
    pub async fn contest_entry(
        &self,
        group_id: ChatId,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Option<ContestEntry>, Error> {
        sqlx::query(
            "SELECT group_id, user_id, date, count, display_name FROM daily_contest
            WHERE group_id=? AND user_id=? AND date=?;",
        )
        .bind(group_id.0)
        .bind(user_to_db(user_id))
        .bind(date)
        .try_map(|row: SqliteRow| {
            Ok(ContestEntry {
                group_id: ChatId(row.try_get("group_id")?),
                user_id: user_from_db(row.try_get("user_id")?),
                display_name: row.try_get("display_name")?,
                count: row.try_get("count")?,
                date: row.try_get("date")?,
            })
        })
        .fetch_optional(&self.pool)
        .await
    }

    /// Forgets contest entries of days before `date`. Returns how many were deleted.
    pub async fn roll_contest(&self, date: NaiveDate) -> Result<u64, Error> {
        sqlx::query("DELETE FROM daily_contest WHERE date<?;")
            .bind(date)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
    }

    ///////////////////////////////////////
    // SETTINGS
    ///////////////////////////////////////

    /// Sets or clears the chat feedback gets forwarded to.
    pub async fn set_forward_destination(&self, chat_id: Option<ChatId>) -> Result<(), Error> {
        match chat_id {
            Some(chat_id) => {
                sqlx::query(
                    "INSERT INTO settings(key, value) VALUES (?, ?)
                ON CONFLICT DO UPDATE SET value=excluded.value;",
                )
                .bind(FORWARD_DESTINATION_KEY)
                .bind(chat_id.0.to_string())
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query("DELETE FROM settings WHERE key=?;")
                    .bind(FORWARD_DESTINATION_KEY)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn forward_destination(&self) -> Result<Option<ChatId>, Error> {
        let value: Option<String> = sqlx::query("SELECT value FROM settings WHERE key=?;")
            .bind(FORWARD_DESTINATION_KEY)
            .map(|row: SqliteRow| row.get("value"))
            .fetch_optional(&self.pool)
            .await?;

        Ok(value.and_then(|v| v.parse().ok()).map(ChatId))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::{Duration, TimeZone};
    use teloxide::types::MessageId;

    use super::*;

    const GROUP: ChatId = ChatId(-1001234567890);
    const OWNER: UserId = UserId(1);

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn feedback(user: u64, username: Option<&str>, at: DateTime<Utc>) -> NewFeedback {
        NewFeedback {
            group_id: GROUP,
            group_name: "Group".to_string(),
            user_id: UserId(user),
            username: username.map(str::to_string),
            display_name: format!("User Number {user}"),
            message_id: MessageId(100),
            message_link: "https://t.me/c/1234567890/100".to_string(),
            media_count: 1,
            timestamp: at,
        }
    }

    async fn db_with_group() -> Database {
        let db = Database::in_memory().await.unwrap();
        db.authorize_group(GROUP, "Group", OWNER, t(0)).await.unwrap();
        db
    }

    #[tokio::test]
    async fn feedback_needs_authorized_group() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(db.add_feedback(&feedback(5, None, t(0))).await.unwrap(), None);
        assert!(db.recent_feedback(GROUP, t(-10)).await.unwrap().is_empty());

        db.authorize_group(GROUP, "Group", OWNER, t(0)).await.unwrap();
        let id = db.add_feedback(&feedback(5, None, t(0))).await.unwrap();
        assert!(id.is_some());

        let stored = db.recent_feedback(GROUP, t(-10)).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id.unwrap());
        assert_eq!(stored[0].user_id, UserId(5));
        assert_eq!(stored[0].timestamp, t(0));
        assert_eq!(stored[0].message_link, "https://t.me/c/1234567890/100");

        assert!(db.deauthorize_group(GROUP).await.unwrap());
        assert!(!db.deauthorize_group(GROUP).await.unwrap());
        assert_eq!(db.add_feedback(&feedback(5, None, t(1))).await.unwrap(), None);
    }

    #[tokio::test]
    async fn recent_feedback_respects_window() {
        let db = db_with_group().await;
        let now = t(10 * 86400);
        let window = Duration::days(3);
        for age in [
            Duration::zero(),
            Duration::days(1),
            window,
            window + Duration::seconds(1),
            Duration::days(4),
        ] {
            db.add_feedback(&feedback(5, None, now - age)).await.unwrap();
        }

        let recent = db.recent_feedback(GROUP, now - window).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

        let other_group = db.recent_feedback(ChatId(-5), now - window).await.unwrap();
        assert!(other_group.is_empty());
    }

    #[tokio::test]
    async fn user_feedback_and_counts() {
        let db = db_with_group().await;
        let day = 86400;
        db.add_feedback(&feedback(5, Some("five"), t(0))).await.unwrap();
        db.add_feedback(&feedback(5, Some("fivenew"), t(day))).await.unwrap();
        db.add_feedback(&feedback(6, None, t(day + 10))).await.unwrap();
        db.add_feedback(&feedback(5, Some("fivenew"), t(2 * day))).await.unwrap();

        let mine = db.user_feedback(GROUP, UserId(5), t(0)).await.unwrap();
        assert_eq!(mine.len(), 3);
        let theirs = db.user_feedback(GROUP, UserId(6), t(0)).await.unwrap();
        assert_eq!(theirs.len(), 1);

        let by_user = db.feedback_counts_by_user(GROUP).await.unwrap();
        assert_eq!(by_user.len(), 2);
        assert_eq!(by_user[0].user_id, UserId(5));
        assert_eq!(by_user[0].count, 3);
        assert_eq!(by_user[0].username.as_deref(), Some("fivenew"));
        assert_eq!(by_user[1].count, 1);

        let by_day = db.feedback_counts_by_day(GROUP).await.unwrap();
        assert_eq!(by_day.len(), 3);
        assert!(by_day[0].date > by_day[2].date);
        assert_eq!(by_day.iter().map(|d| d.count).sum::<u32>(), 4);

        assert_eq!(
            db.username_to_userid(GROUP, "@FIVENEW").await.unwrap(),
            Some(UserId(5))
        );
        assert_eq!(db.username_to_userid(GROUP, "nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn cleanup_deletes_only_older_than_cutoff() {
        let db = db_with_group().await;
        let now = t(30 * 86400);
        let limit = Duration::days(5);
        db.add_feedback(&feedback(1, None, now - limit)).await.unwrap();
        db.add_feedback(&feedback(2, None, now - limit - Duration::seconds(1)))
            .await
            .unwrap();
        db.add_feedback(&feedback(3, None, now - Duration::days(9)))
            .await
            .unwrap();
        db.add_feedback(&feedback(4, None, now)).await.unwrap();

        assert_eq!(db.delete_feedback_before(now - limit).await.unwrap(), 2);
        let left: Vec<_> = db
            .recent_feedback(GROUP, t(0))
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.user_id)
            .collect();
        assert_eq!(left, vec![UserId(4), UserId(1)]);

        assert_eq!(db.clear_feedback().await.unwrap(), 2);
        assert!(db.recent_feedback(GROUP, t(0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn users_and_groups_are_listed() {
        let db = db_with_group().await;
        db.authorize_group(GROUP, "Renamed", UserId(99), t(5))
            .await
            .unwrap();
        let groups = db.authorized_groups().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group_name, "Renamed");
        assert_eq!(groups[0].authorized_by, OWNER);

        assert!(!db.is_user_authorized(UserId(8)).await.unwrap());
        db.authorize_user(UserId(8), OWNER, t(0)).await.unwrap();
        db.authorize_user(UserId(8), OWNER, t(1)).await.unwrap();
        assert!(db.is_user_authorized(UserId(8)).await.unwrap());
        assert_eq!(db.authorized_users().await.unwrap().len(), 1);
        assert!(db.deauthorize_user(UserId(8)).await.unwrap());
        assert!(!db.is_user_authorized(UserId(8)).await.unwrap());
    }

    #[tokio::test]
    async fn reminders_are_last_write_wins() {
        let db = db_with_group().await;
        db.set_reminder(GROUP, "first", OWNER, t(0)).await.unwrap();
        db.set_reminder(GROUP, "second", UserId(3), t(1)).await.unwrap();
        db.set_reminder(ChatId(-7), "elsewhere", OWNER, t(2))
            .await
            .unwrap();

        let reminders = db.reminders().await.unwrap();
        assert_eq!(reminders.len(), 2);
        let mine = reminders.iter().find(|r| r.group_id == GROUP).unwrap();
        assert_eq!(mine.text, "second");
        assert_eq!(mine.set_by, UserId(3));

        assert!(db.remove_reminder(GROUP).await.unwrap());
        assert!(!db.remove_reminder(GROUP).await.unwrap());
        assert_eq!(db.reminders().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn contest_counts_ties_and_rolls() {
        let db = Database::in_memory().await.unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let next = day.succ_opt().unwrap();
        let other = ChatId(-42);

        for _ in 0..2 {
            db.bump_contest(GROUP, UserId(1), "one", day).await.unwrap();
            db.bump_contest(GROUP, UserId(2), "two", day).await.unwrap();
        }
        db.bump_contest(GROUP, UserId(3), "three", day).await.unwrap();
        db.bump_contest(other, UserId(3), "three", day).await.unwrap();
        db.bump_contest(GROUP, UserId(3), "three", next).await.unwrap();
        db.bump_contest(GROUP, UserId(3), "three", next).await.unwrap();
        db.bump_contest(GROUP, UserId(3), "three", next).await.unwrap();

        let winners = db.contest_winners(day).await.unwrap();
        let summary: Vec<_> = winners.iter().map(|w| (w.group_id, w.user_id, w.count)).collect();
        assert_eq!(
            summary,
            vec![
                (GROUP, UserId(1), 2),
                (GROUP, UserId(2), 2),
                (other, UserId(3), 1)
            ]
        );

        let entry = db.contest_entry(GROUP, UserId(3), next).await.unwrap().unwrap();
        assert_eq!(entry.count, 3);

        assert_eq!(db.roll_contest(next).await.unwrap(), 4);
        assert!(db.contest_winners(day).await.unwrap().is_empty());
        assert_eq!(db.contest_winners(next).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn forward_destination_roundtrip() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(db.forward_destination().await.unwrap(), None);
        db.set_forward_destination(Some(ChatId(-100555))).await.unwrap();
        db.set_forward_destination(Some(ChatId(-100777))).await.unwrap();
        assert_eq!(db.forward_destination().await.unwrap(), Some(ChatId(-100777)));
        db.set_forward_destination(None).await.unwrap();
        assert_eq!(db.forward_destination().await.unwrap(), None);
    }
}
