//! Telegram bot that keeps track of `#feedback` media posted in groups.

/// Who may run which command.
pub mod auth;

/// Process configuration from the environment.
pub mod config;

/// The database.
pub mod database;

/// Errors that commands end with.
pub mod error;

/// Queue that forwards feedback to the review chat.
pub mod forwarder;

/// Functions that handle events from Telegram.
mod handlers;

/// Liveness endpoint.
pub mod health;

/// Spotting and storing feedback.
pub mod intake;

/// Miscellaneous functions.
mod misc;

/// Periodic jobs.
pub mod scheduler;

/// Formatting of stats replies.
pub mod stats;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;
