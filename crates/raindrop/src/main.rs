use std::sync::Arc;

use raindrop_core::{config::Config, service::BotService};

#[tokio::main]
async fn main() -> Result<(), raindrop_core::Error> {
    raindrop_core::logging::init("raindrop")?;

    let cfg = Arc::new(Config::load()?);
    let service = Arc::new(BotService::from_config(cfg.clone()));

    raindrop_telegram::router::run_polling(cfg, service)
        .await
        .map_err(|e| raindrop_core::Error::External(format!("telegram bot failed: {e}")))?;

    tracing::info!("raindrop stopped");
    Ok(())
}
