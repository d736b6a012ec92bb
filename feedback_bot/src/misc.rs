use std::time::Duration;

use teloxide::types::{Chat, User};

/// Tries to print the user in the prettiest way possible, with either `@username` or full name.
/// Optionally allows including user ID.
#[must_use]
pub fn user_name_prettyprint(user: &User, with_id: bool) -> String {
    let mut name = match &user.username {
        Some(username) => format!("@{username}"),
        None => user.full_name(),
    };

    if with_id {
        use std::fmt::Write;
        write!(name, " (userid {})", user.id).expect("Writing to a String never fails");
    }

    name
}

/// Tries to print the chat name in the prettiest way possible, with either `@username` or chat
/// title or full name.
#[must_use]
pub fn chat_name_prettyprint(chat: &Chat, with_id: bool) -> String {
    let mut name = if let Some(username) = chat.username() {
        format!("@{username}")
    } else if let Some(title) = chat.title() {
        title.to_string()
    } else if let Some(first_name) = chat.first_name() {
        let mut full_name = first_name.to_string();

        if let Some(last_name) = chat.last_name() {
            full_name.push(' ');
            full_name.push_str(last_name);
        }
        full_name
    } else {
        // Shouldn't happen, but eh.
        "a private chat".to_string()
    };

    if with_id {
        use std::fmt::Write;
        write!(name, " (chatid {})", chat.id).expect("Writing to a String never fails");
    }

    name
}

/// Describes an interval like "2 hours" or "90 minutes", picking the biggest whole unit.
#[must_use]
pub fn interval_prettyprint(interval: Duration) -> String {
    let secs = interval.as_secs();
    let (amount, unit) = if secs >= 3600 && secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs >= 60 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };

    match amount {
        1 => format!("1 {unit}"),
        _ => format!("{amount} {unit}s"),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn user(username: Option<&str>, last_name: Option<&str>) -> User {
        serde_json::from_value(serde_json::json!({
            "id": 5,
            "is_bot": false,
            "first_name": "Ann",
            "last_name": last_name,
            "username": username,
        }))
        .unwrap()
    }

    #[test]
    fn user_names() {
        assert_eq!(user_name_prettyprint(&user(Some("ann"), None), false), "@ann");
        assert_eq!(user_name_prettyprint(&user(None, Some("Lee")), false), "Ann Lee");
        assert_eq!(
            user_name_prettyprint(&user(None, None), true),
            "Ann (userid 5)"
        );
    }

    #[test]
    fn chat_names() {
        let chat: Chat = serde_json::from_value(serde_json::json!({
            "id": -1001, "title": "Cool Group", "type": "supergroup"
        }))
        .unwrap();
        assert_eq!(chat_name_prettyprint(&chat, false), "Cool Group");
        assert_eq!(
            chat_name_prettyprint(&chat, true),
            "Cool Group (chatid -1001)"
        );
    }

    #[test]
    fn intervals() {
        assert_eq!(interval_prettyprint(Duration::from_secs(7200)), "2 hours");
        assert_eq!(interval_prettyprint(Duration::from_secs(3600)), "1 hour");
        assert_eq!(interval_prettyprint(Duration::from_secs(5400)), "90 minutes");
        assert_eq!(interval_prettyprint(Duration::from_secs(45)), "45 seconds");
    }
}
