use beeper_listener::{BeeperSource, ListenerConfig, RealTimeSource};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beeper_listener=info,beeper_db=info,beeper_cli=info".into()),
        )
        .init();

    let watch = std::env::args().skip(1).any(|arg| arg == "--watch");

    let config = ListenerConfig::from_env();
    let database_path = config.database_path.clone();
    let mut source = BeeperSource::new(config);
    info!("{}", source.name());

    if !source.test_connection() {
        error!("Cannot read Beeper database at {}", database_path.display());
        std::process::exit(1);
    }
    info!("Beeper database reachable at {}", database_path.display());

    if !watch {
        return Ok(());
    }

    source.start().await?;
    shutdown_signal().await;
    source.stop().await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
