//! Jobs that run on their own timers next to update handling: purging old feedback,
//! sending group reminders and announcing the daily contest.
//!
//! Every spinloop holds the database weakly and quits once it's gone. A failing tick
//! is logged and the loop carries on with the next one.

use std::{future::Future, sync::Weak, time::Duration};

use bot_commons::{teloxide_retry, useful_methods::BotArchSendMsg};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use teloxide::{requests::Requester, types::ChatId, Bot, RequestError};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

use crate::{database::Database, stats::format_contest_announcement};

/// Feedback older than this many days gets purged.
pub const RETENTION_DAYS: i64 = 5;

/// How often old feedback gets purged.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Deletes feedback older than [`RETENTION_DAYS`]. Feedback exactly that old stays.
pub async fn run_cleanup(database: &Database, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    database
        .delete_feedback_before(now - chrono::Duration::days(RETENTION_DAYS))
        .await
}

pub async fn cleanup_spinloop(database: Weak<Database>) {
    loop {
        let Some(db) = database.upgrade() else {
            return;
        };

        match run_cleanup(&db, Utc::now()).await {
            Ok(0) => log::debug!("Cleanup: nothing to delete."),
            Ok(n) => log::info!("Cleanup: deleted {n} old feedback entries."),
            Err(e) => log::error!("Cleanup failed: {e}"),
        }

        drop(db);
        sleep(CLEANUP_INTERVAL).await;
    }
}

/// Calls `job` every `period`, the first time after one full period.
/// Stops once `job` returns `false`.
async fn every<F, Fut>(period: Duration, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !job().await {
            return;
        }
    }
}

/// Sends every group its reminder text as-is through `send`. Groups without a reminder
/// get nothing. Returns how many were sent successfully.
pub async fn send_reminders<F, Fut>(database: &Database, mut send: F) -> Result<usize, sqlx::Error>
where
    F: FnMut(ChatId, String) -> Fut,
    Fut: Future<Output = Result<(), RequestError>>,
{
    let mut sent = 0;

    for reminder in database.reminders().await? {
        match send(reminder.group_id, reminder.text).await {
            Ok(()) => sent += 1,
            Err(e) => log::warn!("Failed to send reminder to {}: {e}", reminder.group_id),
        }
    }

    Ok(sent)
}

pub async fn reminder_spinloop(bot: Bot, database: Weak<Database>, interval: Duration) {
    let bot = &bot;
    let database = &database;

    every(interval, move || async move {
        let Some(db) = database.upgrade() else {
            return false;
        };

        let result = send_reminders(&db, |chat, text| {
            let bot = bot.clone();
            async move {
                teloxide_retry!(bot.send_message(chat, text.clone()).await).map(|_| ())
            }
        })
        .await;

        match result {
            Ok(n) => log::info!("Sent {n} reminders."),
            Err(e) => log::error!("Could not load reminders: {e}"),
        }

        true
    })
    .await;
}

/// When the next contest announcement is due: today at `hour`:00 UTC, or tomorrow if
/// that's not in the future anymore.
#[must_use]
pub fn next_announcement(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(time).and_utc();

    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

/// Announces the winners of `day` in every group that had entries, through `send`.
/// Returns how many groups got an announcement.
pub async fn announce_contest<F, Fut>(
    database: &Database,
    day: NaiveDate,
    mut send: F,
) -> Result<usize, sqlx::Error>
where
    F: FnMut(ChatId, String) -> Fut,
    Fut: Future<Output = Result<(), RequestError>>,
{
    let winners = database.contest_winners(day).await?;
    let mut announced = 0;

    for group in winners.chunk_by(|a, b| a.group_id == b.group_id) {
        let Some(text) = format_contest_announcement(group) else {
            continue;
        };
        let group_id = group[0].group_id;

        match send(group_id, text).await {
            Ok(()) => announced += 1,
            Err(e) => log::warn!("Failed to announce contest winners in {group_id}: {e}"),
        }
    }

    Ok(announced)
}

/// Announces yesterday's winners, then forgets everything before today.
pub async fn run_contest<F, Fut>(
    database: &Database,
    now: DateTime<Utc>,
    send: F,
) -> Result<usize, sqlx::Error>
where
    F: FnMut(ChatId, String) -> Fut,
    Fut: Future<Output = Result<(), RequestError>>,
{
    let today = now.date_naive();
    let announced = match today.pred_opt() {
        Some(yesterday) => announce_contest(database, yesterday, send).await?,
        None => 0,
    };

    let rolled = database.roll_contest(today).await?;
    log::debug!("Contest rolled over to {today}, forgot {rolled} entries.");

    Ok(announced)
}

pub async fn contest_spinloop(bot: Bot, database: Weak<Database>, hour: u32) {
    loop {
        let now = Utc::now();
        let wait = (next_announcement(now, hour) - now)
            .to_std()
            .unwrap_or_default();
        sleep(wait).await;

        let Some(db) = database.upgrade() else {
            return;
        };

        let result = run_contest(&db, Utc::now(), |chat, text| {
            let bot = bot.clone();
            async move {
                bot.archsendmsg(chat, text.as_str(), None).await.map(|_| ())
            }
        })
        .await;

        match result {
            Ok(n) => log::info!("Announced contest winners in {n} groups."),
            Err(e) => log::error!("Contest announcement failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use chrono::TimeZone;
    use teloxide::{types::UserId, ApiError};

    use super::*;

    const GROUP_A: ChatId = ChatId(-1001);
    const GROUP_B: ChatId = ChatId(-1002);
    const GROUP_C: ChatId = ChatId(-1003);

    fn at(day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, min, sec).unwrap()
    }

    async fn group_with_feedback(db: &Database, times: &[DateTime<Utc>]) {
        use teloxide::types::MessageId;

        use crate::database::NewFeedback;

        db.authorize_group(GROUP_A, "A", UserId(1), at(1, 0, 0, 0))
            .await
            .unwrap();
        for (i, time) in times.iter().enumerate() {
            let id = i32::try_from(i).unwrap();
            db.add_feedback(&NewFeedback {
                group_id: GROUP_A,
                group_name: "A".to_string(),
                user_id: UserId(10),
                username: None,
                display_name: "Ann".to_string(),
                message_id: MessageId(id),
                message_link: format!("https://t.me/c/1/{id}"),
                media_count: 1,
                timestamp: *time,
            })
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn cleanup_keeps_exactly_five_days() {
        let db = Database::in_memory().await.unwrap();
        let now = at(20, 12, 0, 0);
        group_with_feedback(
            &db,
            &[
                at(15, 11, 59, 59), // 5 days and a second
                at(15, 12, 0, 0),   // exactly 5 days
                at(19, 0, 0, 0),
            ],
        )
        .await;

        assert_eq!(run_cleanup(&db, now).await.unwrap(), 1);

        let left = db.recent_feedback(GROUP_A, at(1, 0, 0, 0)).await.unwrap();
        let times: Vec<_> = left.iter().map(|r| r.timestamp).collect();
        assert_eq!(times, [at(19, 0, 0, 0), at(15, 12, 0, 0)]);

        assert_eq!(run_cleanup(&db, now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reminders_go_only_to_groups_that_have_one() {
        let db = Database::in_memory().await.unwrap();
        for (group, name) in [(GROUP_A, "A"), (GROUP_B, "B"), (GROUP_C, "C")] {
            db.authorize_group(group, name, UserId(1), at(1, 0, 0, 0))
                .await
                .unwrap();
        }
        db.set_reminder(GROUP_A, "Post your <b>#feedback</b>!", UserId(1), at(1, 0, 0, 0))
            .await
            .unwrap();
        db.set_reminder(GROUP_B, "B reminder", UserId(1), at(1, 0, 0, 0))
            .await
            .unwrap();

        let sent: Arc<Mutex<Vec<(ChatId, String)>>> = Arc::default();
        let sent_clone = sent.clone();
        let n = send_reminders(&db, move |chat, text| {
            sent_clone.lock().unwrap().push((chat, text));
            async move {
                if chat == GROUP_B {
                    Err(RequestError::Api(ApiError::BotBlocked))
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(n, 1);
        assert_eq!(
            *sent.lock().unwrap(),
            [
                (GROUP_B, "B reminder".to_string()),
                (GROUP_A, "Post your <b>#feedback</b>!".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_after_each_full_period() {
        let period = Duration::from_secs(7200);
        let ticks: Arc<Mutex<Vec<Duration>>> = Arc::default();
        let start = Instant::now();

        let ticks_clone = ticks.clone();
        let calls = AtomicUsize::new(0);
        every(period, || {
            ticks_clone.lock().unwrap().push(start.elapsed());
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { n < 3 }
        })
        .await;

        assert_eq!(*ticks.lock().unwrap(), [period, period * 2, period * 3]);
    }

    #[test]
    fn announcement_times() {
        assert_eq!(next_announcement(at(9, 23, 59, 59), 0), at(10, 0, 0, 0));
        assert_eq!(next_announcement(at(10, 0, 0, 0), 0), at(11, 0, 0, 0));
        assert_eq!(next_announcement(at(10, 0, 0, 1), 18), at(10, 18, 0, 0));
        assert_eq!(next_announcement(at(10, 19, 0, 0), 18), at(11, 18, 0, 0));
    }

    #[tokio::test]
    async fn contest_announces_ties_and_rolls_over() {
        let db = Database::in_memory().await.unwrap();
        let yesterday = at(9, 0, 0, 0).date_naive();
        let today = at(10, 0, 0, 0).date_naive();

        for _ in 0..2 {
            db.bump_contest(GROUP_A, UserId(1), "Ann", yesterday).await.unwrap();
            db.bump_contest(GROUP_A, UserId(2), "Bob", yesterday).await.unwrap();
        }
        db.bump_contest(GROUP_A, UserId(3), "Cid", yesterday).await.unwrap();
        db.bump_contest(GROUP_B, UserId(3), "Cid", yesterday).await.unwrap();
        db.bump_contest(GROUP_B, UserId(4), "Dee", today).await.unwrap();

        let sent: Arc<Mutex<Vec<(ChatId, String)>>> = Arc::default();
        let sent_clone = sent.clone();
        let n = run_contest(&db, at(10, 0, 0, 0), move |chat, text| {
            sent_clone.lock().unwrap().push((chat, text));
            async { Ok(()) }
        })
        .await
        .unwrap();

        assert_eq!(n, 2);
        let sent = sent.lock().unwrap();
        assert_eq!(sent[0].0, GROUP_B);
        assert!(sent[0].1.contains("<b>Cid</b> with 1 feedback!"));
        assert_eq!(sent[1].0, GROUP_A);
        assert!(sent[1].1.contains("<b>Ann</b>, <b>Bob</b>, with 2 feedbacks each"));

        assert!(db.contest_winners(yesterday).await.unwrap().is_empty());
        assert_eq!(
            db.contest_entry(GROUP_B, UserId(4), today).await.unwrap().unwrap().count,
            1
        );
    }
}
