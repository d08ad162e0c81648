use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use raindrop_core::{config::Config, service::BotService};

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub service: Arc<BotService>,
    /// Our own username, used to ignore commands addressed to other bots.
    pub bot_username: Option<String>,
}

pub async fn run_polling(cfg: Arc<Config>, service: Arc<BotService>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            tracing::info!(username = %me.username(), "raindrop started");
            me.user.username.clone()
        }
        Err(e) => {
            tracing::warn!(error = %e, "get_me failed; continuing");
            None
        }
    };
    tracing::info!(
        data_file = %cfg.data_file.display(),
        open_subscriptions = cfg.open_subscriptions,
        persist = cfg.persist_on_mutation,
        "configuration"
    );

    let state = Arc::new(AppState {
        cfg,
        service,
        bot_username,
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
