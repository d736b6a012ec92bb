use teloxide::RequestError;
use thiserror::Error;

use crate::auth::Denial;

/// Everything that can go wrong while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The sender may not run this command here. Nothing was changed.
    #[error(transparent)]
    Denied(#[from] Denial),
    /// Could not figure out which user or group the command is about.
    #[error("{0}")]
    Resolution(String),
    /// The command was called with parameters that make no sense.
    #[error("{0}")]
    Usage(&'static str),
    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("telegram error: {0}")]
    Send(#[from] RequestError),
}

impl CommandError {
    /// Text to reply to the command with, if any. Failed sends get no reply,
    /// because the reply would most likely fail too.
    #[must_use]
    pub fn reply_text(&self) -> Option<String> {
        match self {
            CommandError::Denied(denial) => Some(format!("❌ {denial}")),
            CommandError::Resolution(text) => Some(format!("❌ {text}")),
            CommandError::Usage(usage) => Some(format!("❌ {usage}")),
            CommandError::Persistence(_) => {
                Some("⚠️ Something went wrong on my side. Please try again later.".to_string())
            }
            CommandError::Send(_) => None,
        }
    }
}
