// Payout summary endpoint tests against live Postgres
// Skipped (with a note) when DATABASE_URL / REDIS_URL are not set

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use serial_test::serial;
use tower::util::ServiceExt;
use ugcpay_backend_core::{app::AppState, handlers::payouts, PayoutStatus};

fn summary_router(state: AppState) -> Router {
    Router::new()
        .route("/payouts/summary", get(payouts::get_payout_summary))
        .with_state(state)
}

async fn get_summary(router: Router, merchant_id: Option<&str>) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().uri("/payouts/summary");
    if let Some(id) = merchant_id {
        builder = builder.header("x-merchant-id", id);
    }
    let response = router
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap();
    (status, json)
}

#[tokio::test]
#[serial]
async fn summary_aggregates_are_internally_consistent() {
    let Some(state) = common::try_test_state().await else {
        return;
    };
    let merchant_id = common::test_merchant_id("summary");
    common::seed_merchant(&state.diesel_pool, &merchant_id).await;
    common::seed_payout(&state.diesel_pool, &merchant_id, 1000, PayoutStatus::Pending).await;
    common::seed_payout(&state.diesel_pool, &merchant_id, 2500, PayoutStatus::Pending).await;
    common::seed_payout(&state.diesel_pool, &merchant_id, 500, PayoutStatus::Paid).await;
    // Failed payouts are excluded from what the merchant is owed
    common::seed_payout(&state.diesel_pool, &merchant_id, 700, PayoutStatus::Failed).await;

    let pool = state.diesel_pool.clone();
    let (status, json) = get_summary(summary_router(state), Some(&merchant_id)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    let data = &json["data"];
    assert_eq!(data["merchant_id"], merchant_id.as_str());
    assert_eq!(data["total_owed_cents"], 4000);
    assert_eq!(data["total_paid_cents"], 500);
    assert_eq!(data["pending_count"], 2);

    // Internal consistency of the aggregate view
    let owed = data["total_owed_cents"].as_i64().unwrap();
    let paid = data["total_paid_cents"].as_i64().unwrap();
    assert!(owed >= paid);
    assert!(owed >= 0 && paid >= 0);

    common::cleanup_merchant(&pool, &merchant_id).await;
}

#[tokio::test]
#[serial]
async fn zero_history_merchant_gets_zero_summary_not_an_error() {
    let Some(state) = common::try_test_state().await else {
        return;
    };
    let merchant_id = common::test_merchant_id("fresh");
    common::seed_merchant(&state.diesel_pool, &merchant_id).await;

    let pool = state.diesel_pool.clone();
    let (status, json) = get_summary(summary_router(state), Some(&merchant_id)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total_owed_cents"], 0);
    assert_eq!(json["data"]["total_paid_cents"], 0);
    assert_eq!(json["data"]["pending_count"], 0);

    common::cleanup_merchant(&pool, &merchant_id).await;
}

#[tokio::test]
#[serial]
async fn missing_header_returns_exactly_401_envelope() {
    let Some(state) = common::try_test_state().await else {
        return;
    };

    let (status, json) = get_summary(summary_router(state), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json, serde_json::json!({ "error": "Merchant ID required" }));
}

#[tokio::test]
#[serial]
async fn schedule_endpoint_returns_the_same_job_id_on_repeat() {
    let Some(state) = common::try_test_state().await else {
        return;
    };
    let merchant_id = common::test_merchant_id("sched");
    common::seed_merchant(&state.diesel_pool, &merchant_id).await;
    let pool = state.diesel_pool.clone();
    let router = Router::new()
        .nest("/payouts", ugcpay_backend_core::payouts_routes())
        .with_state(state);

    let post = |router: Router, id: String| async move {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/payouts/schedule")
                    .header("x-merchant-id", id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice::<serde_json::Value>(&body).unwrap()
    };

    let first = post(router.clone(), merchant_id.clone()).await;
    let second = post(router, merchant_id.clone()).await;

    assert_eq!(first["data"]["job_id"], second["data"]["job_id"]);
    assert_eq!(first["data"]["cron"], "0 2 * * 5");

    common::cleanup_merchant(&pool, &merchant_id).await;
}

#[tokio::test]
#[serial]
async fn scheduling_an_unknown_merchant_is_a_404() {
    let Some(state) = common::try_test_state().await else {
        return;
    };
    let router = Router::new()
        .nest("/payouts", ugcpay_backend_core::payouts_routes())
        .with_state(state);

    // Never seeded, so the merchant does not exist
    let merchant_id = common::test_merchant_id("ghost");
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payouts/schedule")
                .header("x-merchant-id", &merchant_id)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, serde_json::json!({ "error": "Merchant not found" }));
}

#[tokio::test]
#[serial]
async fn summary_response_is_marked_non_cacheable() {
    let Some(state) = common::try_test_state().await else {
        return;
    };
    let merchant_id = common::test_merchant_id("nocache");
    common::seed_merchant(&state.diesel_pool, &merchant_id).await;

    let pool = state.diesel_pool.clone();
    let response = summary_router(state)
        .oneshot(
            Request::builder()
                .uri("/payouts/summary")
                .header("x-merchant-id", &merchant_id)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get(axum::http::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok()),
        Some("no-store")
    );

    common::cleanup_merchant(&pool, &merchant_id).await;
}
