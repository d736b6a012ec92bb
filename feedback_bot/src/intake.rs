use bot_commons::useful_methods::MessageStuff;
use chrono::{DateTime, Utc};
use teloxide::types::{ChatId, Message, MessageId};

use crate::{
    database::{Database, NewFeedback},
    forwarder::{ForwardJob, Forwarder},
    misc::{chat_name_prettyprint, user_name_prettyprint},
};

/// The hashtag that marks a message as feedback. Matched case-insensitively.
pub const FEEDBACK_TAG: &str = "#feedback";

/// Returns `true` if the text has the feedback hashtag anywhere in it.
#[must_use]
pub fn has_feedback_tag(text: &str) -> bool {
    text.to_lowercase().contains(FEEDBACK_TAG)
}

/// Returns `true` if this message counts as feedback: it's tagged, and it either carries
/// media or replies to a message that does.
#[must_use]
pub fn qualifies(message: &Message) -> bool {
    message.text_full().is_some_and(has_feedback_tag) && message.has_media_or_replied_media()
}

/// How many media the message and the message it replies to carry together.
#[must_use]
pub fn media_count(message: &Message) -> u32 {
    let own = u32::from(message.has_media());
    let replied = message
        .reply_to_message()
        .map_or(0, |m| u32::from(m.has_media()));
    own + replied
}

/// Makes a link to a message in a group.
///
/// Public groups get `https://t.me/<username>/<id>`. Private groups get
/// `https://t.me/c/<internal id>/<id>`, where the internal id is the chat ID
/// without the `-100` supergroup prefix.
#[must_use]
pub fn message_link(username: Option<&str>, chat_id: ChatId, message_id: MessageId) -> String {
    if let Some(username) = username {
        return format!("https://t.me/{username}/{}", message_id.0);
    }

    let id = chat_id.0.to_string();
    let internal = id
        .strip_prefix("-100")
        .or_else(|| id.strip_prefix('-'))
        .unwrap_or(&id);
    format!("https://t.me/c/{internal}/{}", message_id.0)
}

/// Makes a feedback record out of a message, if it qualifies and has a sender.
#[must_use]
pub fn to_feedback(message: &Message, now: DateTime<Utc>) -> Option<NewFeedback> {
    if message.chat.is_private() || !qualifies(message) {
        return None;
    }

    let user = message.from.as_ref()?;

    Some(NewFeedback {
        group_id: message.chat.id,
        group_name: message
            .chat
            .title()
            .map_or_else(|| "Unknown Group".to_string(), str::to_string),
        user_id: user.id,
        username: user.username.clone(),
        display_name: user.full_name(),
        message_id: message.id,
        message_link: message_link(message.chat.username(), message.chat.id, message.id),
        media_count: media_count(message),
        timestamp: now,
    })
}

/// Looks at an ordinary group message and stores it if it's feedback from an authorized group.
/// Also counts it for the daily contest and queues it for forwarding, if a destination is set.
///
/// Returns `true` if the message was stored.
pub async fn handle_feedback(
    database: &Database,
    forwarder: &Forwarder,
    message: &Message,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let Some(feedback) = to_feedback(message, now) else {
        return Ok(false);
    };

    let Some(id) = database.add_feedback(&feedback).await? else {
        log::debug!(
            "Ignoring feedback in unauthorized chat {}",
            chat_name_prettyprint(&message.chat, true)
        );
        return Ok(false);
    };

    database
        .bump_contest(
            feedback.group_id,
            feedback.user_id,
            &feedback.display_name,
            now.date_naive(),
        )
        .await?;

    let today = database
        .contest_entry(feedback.group_id, feedback.user_id, now.date_naive())
        .await?
        .map_or(0, |entry| entry.count);
    let sender = message
        .from
        .as_ref()
        .map(|u| user_name_prettyprint(u, true))
        .unwrap_or_default();
    log::info!(
        "Feedback #{id} logged from {sender} in {} ({today} from them today)",
        chat_name_prettyprint(&message.chat, true)
    );

    if let Some(destination) = database.forward_destination().await? {
        forwarder.enqueue(ForwardJob {
            to: destination,
            from: message.chat.id,
            message_id: message.id,
        });
    }

    Ok(true)
}
