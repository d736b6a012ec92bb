//! Turning stored feedback into replies. Everything here produces HTML for
//! [`bot_commons::useful_methods::BotArchSendMsg::archsendmsg`].

use std::fmt::Write;

use chrono::{DateTime, Duration, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use teloxide::types::UserId;

use crate::database::{ContestEntry, DayFeedbackCount, FeedbackRecord, UserFeedbackCount};

/// How many days back `/fb_stats` and `/check` look.
pub const STATS_WINDOW_DAYS: i64 = 3;

/// Oldest time still inside the stats window. Feedback posted exactly at this time counts.
#[must_use]
pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(STATS_WINDOW_DAYS)
}

fn timestamp(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

fn view_link(link: &str) -> String {
    format!(
        "<a href=\"{}\">View Message</a>",
        encode_double_quoted_attribute(link)
    )
}

fn counted_name(
    username: Option<&str>,
    display_name: &str,
    user_id: impl std::fmt::Display,
) -> String {
    match username {
        Some(username) => format!("@{username}"),
        None if !display_name.is_empty() => display_name.to_string(),
        None => format!("User {user_id}"),
    }
}

/// Reply to `/fb_stats`: how many feedbacks each user posted in the window,
/// then every feedback, newest first.
#[must_use]
pub fn format_recent_feedback(records: &[FeedbackRecord]) -> String {
    if records.is_empty() {
        return "📊 No feedback received in the last 3 days.".to_string();
    }

    let mut message = format!(
        "📊 <b>Feedback Stats (Last 3 Days):</b> {} total\n\n",
        records.len()
    );

    for (name, count) in per_user_counts(records) {
        let _ = writeln!(message, "{}: {count}", encode_text(&name));
    }
    message.push('\n');

    for record in records {
        let _ = write!(
            message,
            "👤 <b>{}</b>\n🕒 {}\n🔗 {}\n\n",
            encode_text(&record.sender_name()),
            timestamp(record.timestamp),
            view_link(&record.message_link),
        );
    }

    message
}

/// Feedback count of every sender in `records`, most active first.
/// Ties keep the order in which the senders first appear.
fn per_user_counts(records: &[FeedbackRecord]) -> Vec<(String, u32)> {
    let mut counts: Vec<(UserId, String, u32)> = Vec::new();

    for record in records {
        match counts.iter_mut().find(|(id, _, _)| *id == record.user_id) {
            Some((_, _, count)) => *count += 1,
            None => counts.push((record.user_id, record.sender_name(), 1)),
        }
    }

    counts.sort_by(|a, b| b.2.cmp(&a.2));
    counts
        .into_iter()
        .map(|(_, name, count)| (name, count))
        .collect()
}

/// Reply to `/check`: the feedback a single user posted in the window.
#[must_use]
pub fn format_user_check(name: &str, records: &[FeedbackRecord]) -> String {
    let name = encode_text(name);

    if records.is_empty() {
        return format!("❌ No feedback was received from {name} in the last 3 days.");
    }

    let mut message = format!(
        "✅ <b>Feedback from {name} (Last 3 Days):</b> {}\n\n",
        records.len()
    );

    for record in records {
        let _ = write!(
            message,
            "🕒 {}\n🔗 {}\n\n",
            timestamp(record.timestamp),
            view_link(&record.message_link),
        );
    }

    message
}

/// Reply to `/fbcount`: how much feedback every user has stored.
#[must_use]
pub fn format_counts_by_user(counts: &[UserFeedbackCount]) -> String {
    if counts.is_empty() {
        return "📈 No feedback stored for this group.".to_string();
    }

    let total: u32 = counts.iter().map(|c| c.count).sum();
    let mut message = format!("📈 <b>Feedback count by user:</b> {total} total\n\n");

    for (place, count) in counts.iter().enumerate() {
        let _ = writeln!(
            message,
            "{}. {}: {}",
            place + 1,
            encode_text(&counted_name(
                count.username.as_deref(),
                &count.display_name,
                count.user_id
            )),
            count.count
        );
    }

    message
}

/// Reply to `/fbcount days`: how much feedback was stored per UTC day.
#[must_use]
pub fn format_counts_by_day(counts: &[DayFeedbackCount]) -> String {
    if counts.is_empty() {
        return "📈 No feedback stored for this group.".to_string();
    }

    let total: u32 = counts.iter().map(|c| c.count).sum();
    let mut message = format!("📈 <b>Feedback count by day:</b> {total} total\n\n");

    for count in counts {
        let _ = writeln!(message, "📅 {}: {}", count.date.format("%Y-%m-%d"), count.count);
    }

    message
}

/// Announcement of one group's daily contest winners. All of `winners` are expected to
/// share the same group, day and count.
#[must_use]
pub fn format_contest_announcement(winners: &[ContestEntry]) -> Option<String> {
    let first = winners.first()?;

    let names = winners
        .iter()
        .map(|w| {
            format!(
                "<b>{}</b>",
                encode_text(&counted_name(None, &w.display_name, w.user_id))
            )
        })
        .collect::<Vec<_>>()
        .join(", ");

    let feedbacks = if first.count == 1 { "feedback" } else { "feedbacks" };

    Some(if winners.len() == 1 {
        format!(
            "🏆 Feedback champion of {}: {names} with {} {feedbacks}! Thank you!",
            first.date.format("%Y-%m-%d"),
            first.count
        )
    } else {
        format!(
            "🏆 Feedback champions of {}: {names}, with {} {feedbacks} each! Thank you!",
            first.date.format("%Y-%m-%d"),
            first.count
        )
    })
}
