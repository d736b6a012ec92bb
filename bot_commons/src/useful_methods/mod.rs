mod split_msg;
pub use split_msg::*;

use teloxide::types::Message;

pub trait MessageStuff {
    /// Text of the message, or its caption if it's a media message.
    fn text_full(&self) -> Option<&str>;
    /// Returns `true` if this message carries a photo, a video, a document or an animation.
    fn has_media(&self) -> bool;
    /// Returns `true` if this message or the one it replies to carries media.
    fn has_media_or_replied_media(&self) -> bool;
}

impl MessageStuff for Message {
    fn text_full(&self) -> Option<&str> {
        self.text().or_else(|| self.caption())
    }

    fn has_media(&self) -> bool {
        self.photo().is_some()
            || self.video().is_some()
            || self.document().is_some()
            || self.animation().is_some()
    }

    fn has_media_or_replied_media(&self) -> bool {
        self.has_media() || self.reply_to_message().is_some_and(Message::has_media)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn message(extra: serde_json::Value) -> Message {
        let mut json = serde_json::json!({
            "message_id": 7,
            "date": 1700000000,
            "chat": {"id": -1001234567890_i64, "title": "Group", "type": "supergroup"},
            "from": {"id": 42, "is_bot": false, "first_name": "Ann"},
        });
        for (key, value) in extra.as_object().unwrap() {
            json[key] = value.clone();
        }
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn caption_counts_as_text() {
        let photo = message(serde_json::json!({
            "photo": [{"file_id": "a", "file_unique_id": "b", "width": 10, "height": 10, "file_size": 5}],
            "caption": "look #feedback",
        }));
        assert_eq!(photo.text_full(), Some("look #feedback"));
        assert!(photo.has_media());

        let text = message(serde_json::json!({"text": "just words"}));
        assert_eq!(text.text_full(), Some("just words"));
        assert!(!text.has_media());
        assert!(!text.has_media_or_replied_media());
    }

    #[test]
    fn reply_to_media_counts() {
        let reply = message(serde_json::json!({
            "text": "#feedback",
            "reply_to_message": {
                "message_id": 6,
                "date": 1699999990,
                "chat": {"id": -1001234567890_i64, "title": "Group", "type": "supergroup"},
                "from": {"id": 43, "is_bot": false, "first_name": "Bob"},
                "video": {
                    "file_id": "v", "file_unique_id": "vu", "width": 10, "height": 10,
                    "duration": 3, "mime_type": "video/mp4", "file_size": 100
                }
            }
        }));
        assert!(!reply.has_media());
        assert!(reply.has_media_or_replied_media());
    }
}
