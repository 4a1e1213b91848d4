//! The messagegpt relay server.
//!
//! Reads its configuration from the environment (`OPENAI_API_KEY`,
//! `ALLOWED_ORIGINS`, `RATE_LIMIT_RPM`, `AUTH_TOKEN`, `HOST`, `PORT`, ...) and
//! lets the command line override the bind address, model and rate.
//!
//! ```bash
//! OPENAI_API_KEY=sk-... messagegpt-server --port 8080
//! ```

use std::sync::Arc;

use arrrg::CommandLine;

use messagegpt::server::{self, AppState, ServerArgs, ServerConfig};
use messagegpt::upstream::OpenAi;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,messagegpt=debug".into()),
        )
        .with_target(false)
        .with_line_number(true)
        .init();

    let (args, _) = ServerArgs::from_command_line_relaxed("messagegpt-server [OPTIONS]");
    let config = ServerConfig::from_env().with_args(args);

    let api_key = match config.require_api_key() {
        Ok(key) => key.to_string(),
        Err(err) => {
            tracing::error!(error = %err, "refusing to start");
            return Err(err.into());
        }
    };
    let provider = OpenAi::with_options(
        Some(api_key),
        Some(&config.base_url),
        Some(config.model.clone()),
    )?;

    tracing::info!(
        origins = ?config.allowed_origins,
        rate_limit = ?config.rate_limit_per_minute,
        auth = config.auth_token.is_some(),
        "starting messagegpt relay"
    );
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for shutdown signal");
        }
        tracing::info!("shutting down");
    };
    server::serve(AppState::new(Arc::new(provider)), &config, shutdown).await?;
    Ok(())
}
