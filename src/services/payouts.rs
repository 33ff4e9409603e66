// Payout aggregation and bulk processing for merchants

use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use diesel_async::RunQueryDsl;
use thiserror::Error;

use crate::{
    db::DieselPool,
    models::{PayoutStatus, PayoutSummary},
    schema::payouts,
};

#[derive(Error, Debug)]
pub enum PayoutError {
    #[error("Merchant ID required")]
    MissingMerchantId,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Failed to compute payout summary: {0}")]
    Aggregation(String),
}

/// Single aggregate read over a merchant's payout history
#[derive(QueryableByName)]
struct SummaryRow {
    #[diesel(sql_type = BigInt)]
    total_owed_cents: i64,
    #[diesel(sql_type = BigInt)]
    total_paid_cents: i64,
    #[diesel(sql_type = BigInt)]
    pending_count: i64,
}

#[derive(Clone)]
pub struct PayoutService {
    pool: DieselPool,
}

impl PayoutService {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }

    /// Derive the aggregate payout view for a merchant. Pure read; a merchant
    /// with no history gets an all-zero summary, not an error.
    pub async fn get_payout_summary(
        &self,
        merchant_id: &str,
    ) -> Result<PayoutSummary, PayoutError> {
        if merchant_id.trim().is_empty() {
            return Err(PayoutError::MissingMerchantId);
        }

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| PayoutError::Database(format!("Connection failed: {}", e)))?;

        let row: SummaryRow = diesel::sql_query(
            "SELECT \
                 COALESCE(SUM(amount_cents) FILTER (WHERE status <> 'failed'), 0) AS total_owed_cents, \
                 COALESCE(SUM(amount_cents) FILTER (WHERE status = 'paid'), 0) AS total_paid_cents, \
                 COUNT(*) FILTER (WHERE status = 'pending') AS pending_count \
             FROM payouts WHERE merchant_id = $1",
        )
        .bind::<Text, _>(merchant_id)
        .get_result(&mut conn)
        .await
        .map_err(|e| PayoutError::Aggregation(e.to_string()))?;

        Ok(PayoutSummary {
            merchant_id: merchant_id.to_string(),
            total_owed_cents: row.total_owed_cents,
            total_paid_cents: row.total_paid_cents,
            pending_count: row.pending_count,
            currency: "USD".to_string(),
        })
    }

    /// Bulk payout processing for one weekly run: mark every pending payout
    /// for the merchant paid, in a single statement. Returns the number of
    /// payouts disbursed.
    pub async fn process_payouts(&self, merchant_id: &str) -> Result<usize, PayoutError> {
        if merchant_id.trim().is_empty() {
            return Err(PayoutError::MissingMerchantId);
        }

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| PayoutError::Database(format!("Connection failed: {}", e)))?;

        let now = Utc::now();
        let processed = diesel::update(
            payouts::table
                .filter(payouts::merchant_id.eq(merchant_id))
                .filter(payouts::status.eq(PayoutStatus::Pending.as_str())),
        )
        .set((
            payouts::status.eq(PayoutStatus::Paid.as_str()),
            payouts::paid_at.eq(now),
        ))
        .execute(&mut conn)
        .await
        .map_err(|e| PayoutError::Database(e.to_string()))?;

        tracing::info!(
            merchant_id,
            processed,
            "Bulk payout processing completed"
        );

        Ok(processed)
    }
}

/// Bulk-processing seam consumed by the payout worker. The worker only needs
/// "process this merchant's payouts", so tests can substitute a fake.
#[async_trait::async_trait]
pub trait PayoutProcessor: Send + Sync {
    async fn process_payouts(&self, merchant_id: &str) -> Result<usize, PayoutError>;
}

#[async_trait::async_trait]
impl PayoutProcessor for PayoutService {
    async fn process_payouts(&self, merchant_id: &str) -> Result<usize, PayoutError> {
        PayoutService::process_payouts(self, merchant_id).await
    }
}
