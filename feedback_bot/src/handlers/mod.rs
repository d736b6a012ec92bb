pub mod commands;

use std::sync::Arc;

use bot_commons::useful_methods::MessageStuff;
use chrono::Utc;
use teloxide::{
    types::{Me, Message},
    Bot, RequestError,
};

use crate::{
    config::Config, database::Database, forwarder::Forwarder, intake::handle_feedback,
    misc::chat_name_prettyprint,
};

use commands::CommandParams;

pub async fn handle_message(
    bot: Bot,
    me: Me,
    message: Message,
    database: Arc<Database>,
    config: Arc<Config>,
    forwarder: Forwarder,
) -> Result<(), RequestError> {
    // Bot ignores messages made by itself.
    if message.from.as_ref().map(|from| from.id) == Some(me.id) {
        return Ok(());
    }

    if message.text_full().is_some_and(|text| text.starts_with('/')) {
        if let Some(params) = CommandParams::new(&bot, &me, &message, &database, &config) {
            params.run().await?;
        }
        return Ok(());
    }

    if let Err(e) = handle_feedback(&database, &forwarder, &message, Utc::now()).await {
        log::error!(
            "Failed to store feedback from {}: {e}",
            chat_name_prettyprint(&message.chat, true)
        );
    }

    Ok(())
}
