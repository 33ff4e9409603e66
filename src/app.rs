// Application state and configuration
use std::sync::Arc;

use crate::{
    db::DieselPool,
    queue::JobQueue,
    services::{PayoutScheduler, PayoutService},
    RedisPool,
};

// Application state shared across handlers and the worker entry point.
// Constructed once at process start; no module-level singletons.
#[derive(Clone)]
pub struct AppState {
    pub diesel_pool: DieselPool,
    pub redis_pool: RedisPool,
    pub job_queue: Arc<dyn JobQueue>,
    pub payout_service: Arc<PayoutService>,
    pub payout_scheduler: Arc<PayoutScheduler>,
    pub max_connections: u32,
}
