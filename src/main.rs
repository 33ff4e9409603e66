use std::time::Duration;

use axum::routing::get;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ugcpay_backend_core::{
    app_config, health_check, initialize_app_state, payouts_routes, PayoutWorker,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ugcpay_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = app_config::config();
    let bind_address = config.bind_address.clone();
    info!("Starting UGCPay Backend API on {}", bind_address);

    // Pools, queue engine, and services wired once at process start
    let state = match initialize_app_state().await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(std::io::Error::other(format!(
                "Initialization failed: {}",
                e
            )));
        },
    };

    // Worker consumes due payout jobs in the background; the queue engine
    // owns retries and delivery, the worker only processes and reports.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = if config.payouts.enable_worker {
        let worker = PayoutWorker::new(
            state.job_queue.clone(),
            state.payout_service.clone(),
            Duration::from_secs(config.payouts.worker_poll_interval),
        );
        Some(tokio::spawn(worker.run(shutdown_rx)))
    } else {
        info!("Payout worker disabled for this process");
        None
    };

    // The merchant dashboard is served from another origin
    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let app = axum::Router::new()
        .nest("/api/v1/payouts", payouts_routes())
        .route("/api/v1/health", get(health_check))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("HTTP server listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the worker after the HTTP server drains
    let _ = shutdown_tx.send(true);
    if let Some(handle) = worker_handle {
        let _ = handle.await;
    }

    info!("UGCPay Backend stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
