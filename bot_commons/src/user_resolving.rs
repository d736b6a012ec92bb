use teloxide::{
    requests::Requester,
    types::{ChatId, Message, MessageEntityKind, User, UserId},
    ApiError, Bot, RequestError,
};

/// Reads a message's text, and returns any and all numbers that look like `UserId` objects as such.
fn get_potential_userids(message: &Message) -> Vec<UserId> {
    message
        .text()
        .map(|text| {
            text.split_whitespace()
                .flat_map(|word| word.parse().map(UserId))
                .collect()
        })
        .unwrap_or_default()
}

/// Looks through the message for any and all users it's directed at, whether by reply or by link
/// mentions. This does not return the sender, the person the message is forwarded from, or users
/// mentioned by username like `@someone`.
#[must_use]
pub fn get_linkable_mentioned_users(message: &Message) -> Vec<&User> {
    let mut output = vec![];
    if let Some(repliee) = message.reply_to_message().and_then(|m| m.from.as_ref()) {
        output.push(repliee);
    }

    if let Some(ents) = message
        .parse_entities()
        .or_else(|| message.parse_caption_entities())
    {
        for ent in ents {
            if let MessageEntityKind::TextMention { user } = ent.kind() {
                output.push(user);
            }
        }
    }
    output
}

/// Looks through the message and returns all mentions of users by usernames it has like
/// `@someone`, without the `@`. This does not return link mentions (when a user has no
/// username), nor who the message is by, who is it forwarded from, or who it is a reply to.
fn get_text_mentioned_users(message: &Message) -> Vec<&str> {
    let mut output = vec![];
    if let Some(ents) = message
        .parse_entities()
        .or_else(|| message.parse_caption_entities())
    {
        for ent in ents {
            if let MessageEntityKind::Mention = ent.kind() {
                output.push(ent.text().trim_start_matches('@'));
            }
        }
    }
    output
}

/// An object that is either a user, an ID of one, or a username nobody has resolved yet.
/// Represents best possible result of finding mentioned users purely from a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserLike {
    User(User),
    Id(UserId),
    Username(String),
}

/// Get all users mentioned by this message: the repliee and link mentions first,
/// then bare user IDs in the text, then `@username` mentions.
#[must_use]
pub fn get_mentioned_users(message: &Message) -> Vec<UserLike> {
    let mut output = vec![];

    for user in get_linkable_mentioned_users(message) {
        output.push(UserLike::User(user.to_owned()));
    }
    for uid in get_potential_userids(message) {
        output.push(UserLike::Id(uid));
    }
    for username in get_text_mentioned_users(message) {
        output.push(UserLike::Username(String::from(username)));
    }
    output
}

/// Try to find a user by ID as a member of the specified chat.
/// Returns `None` if Telegram doesn't know such a user there.
pub async fn resolve_user_id(
    bot: &Bot,
    chat_id: ChatId,
    user_id: UserId,
) -> Result<Option<User>, RequestError> {
    match bot.get_chat_member(chat_id, user_id).await {
        Ok(member) => Ok(Some(member.user)),
        Err(RequestError::Api(ApiError::UserNotFound)) => Ok(None),
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn message(json: serde_json::Value) -> Message {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn finds_reply_ids_and_usernames() {
        let text = "/check 12345 @someone";
        let msg = message(serde_json::json!({
            "message_id": 10,
            "date": 1700000000,
            "chat": {"id": -1001, "title": "Group", "type": "supergroup"},
            "from": {"id": 1, "is_bot": false, "first_name": "Admin"},
            "text": text,
            "entities": [
                {"type": "bot_command", "offset": 0, "length": 6},
                {"type": "mention", "offset": 13, "length": 8}
            ],
            "reply_to_message": {
                "message_id": 9,
                "date": 1699999999,
                "chat": {"id": -1001, "title": "Group", "type": "supergroup"},
                "from": {"id": 77, "is_bot": false, "first_name": "Target"},
                "text": "hi"
            }
        }));

        let found = get_mentioned_users(&msg);
        assert_eq!(found.len(), 3);
        assert!(matches!(&found[0], UserLike::User(user) if user.id == UserId(77)));
        assert_eq!(found[1], UserLike::Id(UserId(12345)));
        assert_eq!(found[2], UserLike::Username("someone".to_string()));
    }

    #[test]
    fn plain_text_mentions_nobody() {
        let msg = message(serde_json::json!({
            "message_id": 10,
            "date": 1700000000,
            "chat": {"id": -1001, "title": "Group", "type": "supergroup"},
            "from": {"id": 1, "is_bot": false, "first_name": "Admin"},
            "text": "/check"
        }));
        assert!(get_mentioned_users(&msg).is_empty());
    }
}
