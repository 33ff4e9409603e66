// Payout endpoints for the merchant dashboard

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Serialize;
use serde_json::json;

use crate::{
    app::AppState,
    middleware::MerchantId,
    models::{Merchant, PayoutSummary},
    services::payouts::PayoutError,
};

/// Response envelope for a successful summary fetch
#[derive(Debug, Serialize)]
pub struct PayoutSummaryResponse {
    pub success: bool,
    pub data: PayoutSummary,
}

/// GET /payouts/summary - Aggregate payout view for the calling merchant
///
/// Summaries are merchant- and time-sensitive, so responses are marked
/// non-cacheable.
pub async fn get_payout_summary(
    State(app_state): State<AppState>,
    merchant: MerchantId,
) -> impl IntoResponse {
    match app_state
        .payout_service
        .get_payout_summary(merchant.as_str())
        .await
    {
        Ok(summary) => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, "no-store")],
            Json(PayoutSummaryResponse {
                success: true,
                data: summary,
            }),
        )
            .into_response(),
        Err(PayoutError::MissingMerchantId) => (
            StatusCode::UNAUTHORIZED,
            [(header::CACHE_CONTROL, "no-store")],
            Json(json!({ "error": "Merchant ID required" })),
        )
            .into_response(),
        Err(e) => {
            // Detail stays in the logs; the client gets a generic envelope
            tracing::error!(
                merchant_id = merchant.as_str(),
                "Failed to fetch payout summary: {}",
                e
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CACHE_CONTROL, "no-store")],
                Json(json!({ "error": "Failed to fetch payout summary" })),
            )
                .into_response()
        },
    }
}

/// POST /payouts/schedule - Register the calling merchant's weekly payout job
///
/// Idempotent: re-registering returns the standing job id. Unknown merchants
/// are rejected before anything reaches the queue.
pub async fn schedule_payouts(
    State(app_state): State<AppState>,
    merchant: MerchantId,
) -> impl IntoResponse {
    let mut conn = match app_state.diesel_pool.get().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(
                merchant_id = merchant.as_str(),
                "Failed to check merchant before scheduling: {}",
                e
            );
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to schedule payouts" })),
            )
                .into_response();
        },
    };
    match Merchant::find_by_id(&mut conn, merchant.as_str()).await {
        Ok(Some(_)) => {},
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Merchant not found" })),
            )
                .into_response();
        },
        Err(e) => {
            tracing::error!(
                merchant_id = merchant.as_str(),
                "Failed to check merchant before scheduling: {}",
                e
            );
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to schedule payouts" })),
            )
                .into_response();
        },
    }
    drop(conn);

    match app_state
        .payout_scheduler
        .schedule_payouts(merchant.as_str())
        .await
    {
        Ok(job_id) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "job_id": job_id,
                    "cron": app_state.payout_scheduler.cron(),
                }
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(
                merchant_id = merchant.as_str(),
                "Failed to schedule payouts: {}",
                e
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to schedule payouts" })),
            )
                .into_response()
        },
    }
}

/// GET /payouts/jobs/recent - Recent completed and failed payout runs
///
/// Surfaces the queue engine's bounded retention lists for support and
/// debugging; this is the only visibility into background payout failures.
pub async fn recent_payout_jobs(State(app_state): State<AppState>) -> impl IntoResponse {
    let completed = app_state.job_queue.recent_completed().await;
    let failed = app_state.job_queue.recent_failed().await;

    match (completed, failed) {
        (Ok(completed), Ok(failed)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "completed": completed,
                    "failed": failed,
                }
            })),
        )
            .into_response(),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Failed to fetch recent payout jobs: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch recent payout jobs" })),
            )
                .into_response()
        },
    }
}
