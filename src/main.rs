use log::*;
use migration::{Migrator, MigratorTrait};
use realtime::{DatabasePersister, Hub, HubConfig};
use service::{config::Config, logging::Logger, AppState};
use std::sync::Arc;
use std::time::Duration;

/// How long live sessions get to close after the shutdown signal.
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting messenger_rs [{}] in {} mode",
        env!("CARGO_PKG_VERSION"),
        config.runtime_env()
    );

    if config.token_key().is_none() {
        warn!("TOKEN_KEY is not set; every connection and API request will be rejected");
    }

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = Migrator::up(db.as_ref(), None).await {
        error!("Failed to apply database migrations: {e}");
        std::process::exit(1);
    }

    let hub = Hub::new(
        Arc::new(DatabasePersister::new(Arc::clone(&db))),
        HubConfig {
            key: config.token_key().unwrap_or_default().as_bytes().to_vec(),
            outbound_queue_capacity: config.outbound_queue_capacity,
            enqueue_timeout: config.enqueue_timeout(),
        },
    );

    let service_state = AppState::new(config, &db);
    let app_state = web::AppState::new(service_state, hub.clone());

    let shutdown_hub = hub.clone();
    let shutdown = async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        shutdown_hub.shutdown();
    };

    if let Err(e) = web::init_server(app_state, shutdown).await {
        error!("Server error: {e}");
        std::process::exit(1);
    }

    // Upgraded connections are not tracked by the HTTP server's graceful
    // shutdown, so wait for the sessions separately.
    if !hub.drained(SESSION_DRAIN_TIMEOUT).await {
        warn!(
            "{} connection(s) still open after {SESSION_DRAIN_TIMEOUT:?}",
            hub.registry().connection_count()
        );
    }

    info!("Server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {e}");
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
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
