use std::sync::Arc;

use teloxide::{dptree::deps, prelude::*};
use tokio::net::TcpListener;

use crate::{
    config::Config,
    database::Database,
    forwarder::{Forwarder, FORWARD_DELAY},
    handlers::{commands::Command, handle_message},
    health,
    misc::interval_prettyprint,
    scheduler::{cleanup_spinloop, contest_spinloop, reminder_spinloop},
};

/// # Panics
///
/// Panics if the database can't be opened or the health port can't be bound.
pub async fn entry(config: Config) {
    log::info!("Starting the feedback bot...");

    let bot = Bot::new(&config.bot_token);

    if let Err(e) = bot.set_my_commands(Command::generate_bot_commands()).await {
        log::warn!("Failed to set bot commands: {e}");
    }

    let database = Arc::new(
        Database::new(&config.database_url)
            .await
            .expect("Failed to open the database!"),
    );

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("Failed to bind the health endpoint port!");
    tokio::spawn(async move {
        if let Err(e) = health::serve(listener).await {
            log::error!("Health endpoint died: {e}");
        }
    });

    let forwarder = Forwarder::spawn(bot.clone(), FORWARD_DELAY);

    tokio::spawn(cleanup_spinloop(Arc::downgrade(&database)));
    tokio::spawn(reminder_spinloop(
        bot.clone(),
        Arc::downgrade(&database),
        config.reminder_interval,
    ));
    tokio::spawn(contest_spinloop(
        bot.clone(),
        Arc::downgrade(&database),
        config.contest_hour_utc,
    ));

    log::info!(
        "Reminders go out every {}, contest winners are announced at {:02}:00 UTC.",
        interval_prettyprint(config.reminder_interval),
        config.contest_hour_utc
    );

    let config = Arc::new(config);

    log::info!("Creating the handler...");

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    log::info!("Dispatching the dispatcher!");

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(deps![database, config, forwarder])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("it appears we have been bonked.");
}
