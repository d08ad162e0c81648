use crate::Result;

/// Initialize logging/tracing for the bot.
///
/// `RUST_LOG` overrides the default filter.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    // Default: info for our crates, warn for everything else.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,raindrop=info,raindrop_core=info,raindrop_telegram=info,{service_name}=info"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| crate::errors::Error::Config(format!("logging init failed: {e}")))?;

    Ok(())
}
