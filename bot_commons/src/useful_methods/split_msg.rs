use futures::Future;
use teloxide::{
    payloads::SendMessageSetters,
    requests::Requester,
    sugar::request::{RequestLinkPreviewExt, RequestReplyExt},
    types::{Message, MessageId, ParseMode, Recipient},
    Bot, RequestError,
};

/// Telegram's limit on the length of a single text message.
pub const MESSAGE_LENGTH_LIMIT: usize = 4096;

pub trait BotArchSendMsg {
    /// Opinionated method to send a message, with HTML markup, no link previews,
    /// and retries due to flood waiting or network issues.
    /// Also splits the message into many if it's longer than
    /// the character limit. Only the first part replies to `reply_to`.
    fn archsendmsg<'a>(
        &'a self,
        to_where: impl Into<Recipient> + Send,
        text: impl Into<&'a str> + Send,
        reply_to: impl Into<Option<MessageId>> + Send,
    ) -> impl Future<Output = Result<Vec<Message>, RequestError>> + Send;
}

impl BotArchSendMsg for Bot {
    async fn archsendmsg<'a>(
        &'a self,
        to_where: impl Into<Recipient> + Send,
        text: impl Into<&'a str> + Send,
        reply_to: impl Into<Option<MessageId>> + Send,
    ) -> Result<Vec<Message>, RequestError> {
        let to_where: Recipient = to_where.into();
        let mut reply_to = reply_to.into();
        let mut sent_messages = Vec::new();

        for text in SplitOverLengthTokens::new(text.into(), MESSAGE_LENGTH_LIMIT) {
            let message = crate::teloxide_retry!({
                let mut request = self
                    .send_message(to_where.clone(), text)
                    .parse_mode(ParseMode::Html)
                    .disable_link_preview(true);
                if let Some(reply_to) = reply_to {
                    request = request.reply_to(reply_to);
                }
                request.await
            })?;

            reply_to = None;
            sent_messages.push(message);
        }

        Ok(sent_messages)
    }
}

/// Various types of tokens that text can be split with.
#[derive(Clone, Copy, Debug)]
enum SplitTokenType {
    /// "\n\n\n"
    Section,
    /// "\n\n"
    Paragraph,
    /// "\n"
    Line,
    Word,
    Char,
}

impl SplitTokenType {
    /// Every token type, from the biggest to the smallest.
    const ALL: [SplitTokenType; 5] = [
        SplitTokenType::Section,
        SplitTokenType::Paragraph,
        SplitTokenType::Line,
        SplitTokenType::Word,
        SplitTokenType::Char,
    ];

    /// Returns the amount of bytes to jump forward to skip the separator
    /// after a token of this type.
    fn jump_size(self) -> usize {
        match self {
            SplitTokenType::Section => 3,
            SplitTokenType::Paragraph => 2,
            SplitTokenType::Line | SplitTokenType::Word => 1,
            SplitTokenType::Char => 0,
        }
    }

    /// Returns the size of the next token of this type.
    fn next_token_len(self, text: &str) -> usize {
        // str::split* would jump over an arbitrary amount of separators
        // in one go, but we need to know exactly how many were skipped.
        match self {
            SplitTokenType::Section => text.find("\n\n\n").unwrap_or(text.len()),
            SplitTokenType::Paragraph => text.find("\n\n").unwrap_or(text.len()),
            SplitTokenType::Line => text.find('\n').unwrap_or(text.len()),
            SplitTokenType::Word => text
                .find(|x| char::is_ascii_whitespace(&x))
                .unwrap_or(text.len()),
            SplitTokenType::Char => text.chars().next().map_or(0, char::len_utf8),
        }
    }
}

/// Iterator that splits text into tokens, all of which are under a specified size.
///
/// Splits by sections (separated by 3 newlines), then by paragraphs (2 newlines),
/// then by lines (1 newline), then by word (ASCII whitespace), then character by character,
/// until it fits.
pub struct SplitOverLengthTokens<'a> {
    data: &'a str,
    max_len: usize,
}

impl<'a> SplitOverLengthTokens<'a> {
    /// Create a new splitter with specified max length by bytes.
    ///
    /// # Panics
    /// Panics if a max length of less than 4 is specified.
    /// It may be impossible to output data at such lengths due to
    /// characters being up to 4 bytes in size.
    #[must_use]
    pub fn new(data: &str, max_len: usize) -> SplitOverLengthTokens<'_> {
        assert!(max_len >= 4, "Max length is too small");
        SplitOverLengthTokens { data, max_len }
    }
}

impl<'a> Iterator for SplitOverLengthTokens<'a> {
    type Item = &'a str;
    fn next(&mut self) -> Option<Self::Item> {
        self.data = self.data.trim_start();
        if self.data.is_empty() {
            return None;
        }

        let len = self.data.len();

        if len <= self.max_len {
            let output = self.data;
            self.data = &self.data[len..];
            return Some(output);
        }

        // Biggest token type whose next token still fits.
        let split_type = SplitTokenType::ALL
            .into_iter()
            .find(|t| t.next_token_len(self.data) <= self.max_len)
            .unwrap_or(SplitTokenType::Char);

        let preprocessed_data = self.data;
        let mut output_size = 0;
        loop {
            let next_token_size = split_type.next_token_len(self.data);
            if next_token_size == 0 && split_type.jump_size() == 0 {
                break;
            }
            let total_token_size = if output_size > 0 {
                // Separator between the previous and this token.
                next_token_size + split_type.jump_size()
            } else {
                next_token_size
            };

            if output_size + total_token_size <= self.max_len && total_token_size <= self.data.len()
            {
                output_size += total_token_size;
                self.data = &self.data[total_token_size..];
            } else {
                break;
            }
        }

        assert_ne!(output_size, 0, "Maximum length is too small");

        Some(preprocessed_data[..output_size].trim())
    }
}

#[cfg(test)]
mod tests {
    use super::SplitOverLengthTokens;

    #[test]
    fn word_split() {
        let data = "hi hello hi   HELLO!!!";
        assert_eq!(data.len(), 22);
        let mut splitter = SplitOverLengthTokens::new(data, 22);
        assert_eq!(splitter.next(), Some(data));
        assert_eq!(splitter.next(), None);

        let mut splitter = SplitOverLengthTokens::new(data, 21);
        assert_eq!(splitter.next(), Some("hi hello hi"));
        assert_eq!(splitter.next(), Some("HELLO!!!"));
        assert_eq!(splitter.next(), None);
    }

    #[test]
    fn stats_like_paragraphs_stay_whole() {
        let entry = "@someone\n2024-01-01 10:00\nhttps://t.me/c/1/2";
        let data = [entry; 3].join("\n\n");
        let limit = entry.len() * 2 + 4;
        let parts: Vec<_> = SplitOverLengthTokens::new(&data, limit).collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], [entry; 2].join("\n\n"));
        assert_eq!(parts[1], entry);
    }

    #[test]
    fn line_word_char_splits() {
        let data = "12345 12345\n12345\n12\n12\n1234567";
        let mut splitter = SplitOverLengthTokens::new(data, 6);
        assert_eq!(splitter.next(), Some("12345"));
        assert_eq!(splitter.next(), Some("12345"));
        assert_eq!(splitter.next(), Some("12345"));
        assert_eq!(splitter.next(), Some("12\n12"));
        assert_eq!(splitter.next(), Some("123456"));
        assert_eq!(splitter.next(), Some("7"));
        assert_eq!(splitter.next(), None);
    }
}
