//! Timegate Engine - Main entry point.
//!
//! Loads settings and the content catalog, wires the app over the
//! in-memory store and ticks until shutdown.

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timegate_engine::infrastructure::{catalog::ContentCatalog, settings::ContentSettings};
use timegate_engine::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the binary may run from `crates/engine`).
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timegate_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Timegate Engine");

    let settings = ContentSettings::from_env()?;
    let catalog = ContentCatalog::from_env()?;
    tracing::info!(
        tick_secs = settings.sweep.tick_seconds,
        terminal_ttl_hours = settings.sweep.terminal_ttl_hours,
        weekly_reset = %settings.reset.weekly_day,
        events = catalog.event_count(),
        instances = catalog.instance_count(),
        "Configuration loaded"
    );

    let app = App::in_memory(settings, catalog);

    let cancel_token = CancellationToken::new();
    setup_shutdown_signal(cancel_token.clone());

    app.use_cases
        .ticker
        .run(app.settings.tick_interval(), cancel_token)
        .await;

    tracing::info!("Timegate Engine stopped");
    Ok(())
}

/// Cancel `cancel_token` on Ctrl+C or SIGTERM.
fn setup_shutdown_signal(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
        }

        cancel_token.cancel();
    });
}

fn load_dotenv_from_repo_root() {
    let manifest_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    let repo_root = manifest_dir.join("..").join("..");

    for file in [".env.local", ".env"] {
        let path = repo_root.join(file);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
