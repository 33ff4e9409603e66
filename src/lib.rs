// Library exports for UGCPay Backend
// This file exposes modules and functions for library consumers

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod queue;
pub mod schema;
pub mod services;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use db::{DieselPool, RedisConfig, RedisPool};
pub use middleware::MerchantId;
pub use models::{Merchant, NewMerchant, NewPayout, Payout, PayoutStatus, PayoutSummary};
pub use queue::{
    CronSchedule, FailOutcome, InMemoryJobQueue, JobQueue, JobRecord, QueueError, QueuePolicy,
    RedisJobQueue,
};
pub use services::{
    PayoutError, PayoutScheduler, PayoutService, PayoutWorker, SchedulerError, PAYOUT_JOB_NAME,
};

// Re-export individual handlers for direct use
pub use handlers::payouts::{get_payout_summary, recent_payout_jobs, schedule_payouts};

// Diesel database pool type alias
use bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

pub type DbPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

// Library initialization function for external consumers
pub async fn initialize_app_state() -> Result<AppState, Box<dyn std::error::Error>> {
    use std::sync::Arc;
    use tracing::info;

    // Load environment
    dotenv::dotenv().ok();

    // Initialize config
    let config = app_config::config();

    // Initialize database pool
    info!("Initializing database pool...");
    let db_config = db::DieselDatabaseConfig::default();
    let max_connections = db_config.max_connections;
    let diesel_pool = db::create_diesel_pool(db_config).await?;

    // Run migrations if enabled
    if migrations::should_run_migrations() {
        info!("Running embedded migrations...");
        let migration_config = migrations::MigrationConfig::default();
        migrations::run_all_migrations(&diesel_pool, migration_config)
            .await
            .map_err(|e| format!("Migration failed: {}", e))?;
    }

    // Initialize Redis pool (queue backing store)
    info!("Initializing Redis pool...");
    let redis_config = RedisConfig::from_env();
    let redis_pool = RedisPool::new(redis_config).await?;

    // Initialize the queue engine and payout services
    let policy = QueuePolicy::from_config(&config.payouts);
    let job_queue: Arc<dyn JobQueue> =
        Arc::new(RedisJobQueue::new(redis_pool.clone(), policy));
    let payout_service = Arc::new(PayoutService::new(diesel_pool.clone()));
    let payout_scheduler = Arc::new(PayoutScheduler::new(
        job_queue.clone(),
        config.payouts.cron.clone(),
    ));

    Ok(AppState {
        diesel_pool,
        redis_pool,
        job_queue,
        payout_service,
        payout_scheduler,
        max_connections,
    })
}

// Route builder for payout endpoints
pub fn payouts_routes() -> axum::Router<AppState> {
    use axum::routing::{get, post};
    use handlers::payouts;

    axum::Router::new()
        .route("/summary", get(payouts::get_payout_summary))
        .route("/schedule", post(payouts::schedule_payouts))
        .route("/jobs/recent", get(payouts::recent_payout_jobs))
}

// Health check handler
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    use axum::http::StatusCode;
    use axum::Json;

    let mut overall_healthy = true;
    let timestamp = chrono::Utc::now().to_rfc3339();

    // Check PostgreSQL
    let postgres_health = match db::check_diesel_health(&state.diesel_pool).await {
        Ok(_) => serde_json::json!({
            "status": "healthy",
            "max_connections": state.max_connections,
            "error": null
        }),
        Err(e) => {
            overall_healthy = false;
            serde_json::json!({
                "status": "unhealthy",
                "error": format!("Database connection failed: {}", e)
            })
        },
    };

    // Check Redis
    let redis_health_result = state.redis_pool.health_check().await;
    if !redis_health_result.is_healthy {
        overall_healthy = false;
    }

    let response = serde_json::json!({
        "status": if overall_healthy { "healthy" } else { "degraded" },
        "service": "ugcpay-backend",
        "timestamp": timestamp,
        "components": {
            "postgresql": postgres_health,
            "redis": serde_json::json!({
                "status": if redis_health_result.is_healthy { "healthy" } else { "unhealthy" },
                "latency_ms": redis_health_result.latency_ms,
                "error": redis_health_result.error
            })
        }
    });

    if overall_healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
