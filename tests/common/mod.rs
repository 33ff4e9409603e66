// Common test utilities and helper structs
// Shared across test files to avoid duplication

use std::sync::Arc;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use ugcpay_backend_core::{
    app::AppState,
    db::{create_diesel_pool, DieselDatabaseConfig, DieselPool, RedisConfig, RedisPool},
    migrations,
    queue::{InMemoryJobQueue, JobQueue, QueuePolicy},
    schema::{merchants, payouts},
    services::{PayoutScheduler, PayoutService},
    NewMerchant, NewPayout, PayoutStatus,
};
use uuid::Uuid;

/// Build application state against live Postgres and Redis from the
/// environment, with an in-memory queue engine. Returns None (and logs why)
/// when the infrastructure is not available, so tests can skip.
pub async fn try_test_state() -> Option<AppState> {
    dotenv::dotenv().ok();

    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("Skipping test: DATABASE_URL not set");
        return None;
    }
    if std::env::var("REDIS_URL").is_err() {
        eprintln!("Skipping test: REDIS_URL not set");
        return None;
    }

    let db_config = DieselDatabaseConfig::default();
    let max_connections = db_config.max_connections;
    let diesel_pool = match create_diesel_pool(db_config).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Skipping test: failed to create diesel pool: {}", e);
            return None;
        },
    };

    if let Err(e) =
        migrations::run_all_migrations(&diesel_pool, migrations::MigrationConfig::default()).await
    {
        eprintln!("Skipping test: migrations failed: {}", e);
        return None;
    }

    let redis_pool = match RedisPool::new(RedisConfig::from_env()).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Skipping test: failed to create redis pool: {}", e);
            return None;
        },
    };

    let job_queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new(QueuePolicy::default()));
    let payout_service = Arc::new(PayoutService::new(diesel_pool.clone()));
    let payout_scheduler = Arc::new(PayoutScheduler::new(job_queue.clone(), "0 2 * * 5"));

    Some(AppState {
        diesel_pool,
        redis_pool,
        job_queue,
        payout_service,
        payout_scheduler,
        max_connections,
    })
}

/// Unique merchant id per test run to keep seeded rows isolated
pub fn test_merchant_id(prefix: &str) -> String {
    format!("{}-{}.myshopify.com", prefix, Uuid::new_v4().simple())
}

/// Insert a merchant row
pub async fn seed_merchant(pool: &DieselPool, merchant_id: &str) {
    let mut conn = pool.get().await.expect("db connection");
    diesel::insert_into(merchants::table)
        .values(NewMerchant::new(merchant_id))
        .execute(&mut conn)
        .await
        .expect("insert merchant");
}

/// Insert a payout row in the given state
pub async fn seed_payout(
    pool: &DieselPool,
    merchant_id: &str,
    amount_cents: i64,
    status: PayoutStatus,
) {
    let mut conn = pool.get().await.expect("db connection");
    let mut payout = NewPayout::pending(merchant_id, amount_cents);
    payout.status = status.as_str().to_string();
    diesel::insert_into(payouts::table)
        .values(payout)
        .execute(&mut conn)
        .await
        .expect("insert payout");
}

/// Delete a merchant's seeded rows
pub async fn cleanup_merchant(pool: &DieselPool, merchant_id: &str) {
    let mut conn = pool.get().await.expect("db connection");
    diesel::delete(payouts::table.filter(payouts::merchant_id.eq(merchant_id)))
        .execute(&mut conn)
        .await
        .expect("delete payouts");
    diesel::delete(merchants::table.filter(merchants::id.eq(merchant_id)))
        .execute(&mut conn)
        .await
        .expect("delete merchant");
}
