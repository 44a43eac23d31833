use std::sync::Arc;

use teloxide::{
    dispatching::Dispatcher, dptree, error_handlers::LoggingErrorHandler, prelude::*,
    update_listeners::Polling,
};

use tracing::info;

use pibot_core::{
    agent::Agent,
    commands,
    config::Config,
    messaging::port::MessagingPort,
    system::{PowerControl, SystemProbe},
};

use crate::handlers;
use crate::TelegramMessenger;

/// Connect to Telegram and run the update loop for the process lifetime.
///
/// The startup handshake (identity check, webhook teardown) is a hard
/// failure; everything after the loop starts is logged and survived.
pub async fn run_polling(
    cfg: Arc<Config>,
    system: Arc<dyn SystemProbe>,
    power: Arc<dyn PowerControl>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    let me = bot
        .get_me()
        .await
        .map_err(|e| anyhow::anyhow!("failed to get bot info: {e}"))?;
    info!(username = me.username(), "launching bot");

    // getUpdates does not work while a webhook is registered.
    bot.delete_webhook()
        .await
        .map_err(|e| anyhow::anyhow!("failed to delete webhook: {e}"))?;

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(
        bot.clone(),
        commands::keyboard_rows(),
    ));
    let agent = Arc::new(Agent::new(&cfg, messenger, system, power));

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    let listener = Polling::builder(bot.clone())
        .timeout(cfg.poll_interval)
        .build();

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![agent])
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("error while receiving update"),
        )
        .await;

    Ok(())
}
