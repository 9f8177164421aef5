use tracing::{debug, error, info};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use streamcall::{api, Config, NotifierService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    let env_file_path = dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "streamcall=debug,tower_http=debug,warn".into()
            } else {
                "streamcall=info,tower_http=info,warn".into()
            }
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    info!(version = streamcall::VERSION, "streamcall starting");

    // Log environment loading after logger is initialized
    match env_file_path {
        Some(path) => info!("Loaded environment variables from {}", path.display()),
        None => debug!("No .env file found. Using existing environment variables."),
    };

    let config = Config::from_env()?;

    let service = NotifierService::new(config);
    let (state, worker) = service.start().await?;

    // Subscriptions are reconciled in the background so the callback URL is
    // already answering when Twitch sends its verification challenge
    let sync = tokio::spawn(async move {
        service.sync_subscriptions().await;
    });

    api::serve(state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown signal received, stopping server...");
    })
    .await?;

    sync.abort();
    // The router (and its event sender) is gone, so the worker drains and exits
    if let Err(e) = worker.await {
        error!(error = %e, "Notification worker panicked");
    }

    info!("Shutdown complete");
    Ok(())
}
