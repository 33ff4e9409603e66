use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::payouts;

/// A commission disbursement owed to a merchant
#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, AsChangeset,
)]
#[diesel(table_name = payouts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Payout {
    pub id: Uuid,
    pub merchant_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payouts)]
pub struct NewPayout {
    pub merchant_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
}

impl NewPayout {
    pub fn pending(merchant_id: impl Into<String>, amount_cents: i64) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            amount_cents,
            currency: "USD".to_string(),
            status: PayoutStatus::Pending.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutStatus {
    Pending,
    Paid,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Paid => "paid",
            PayoutStatus::Failed => "failed",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PayoutStatus::Pending),
            "paid" => Some(PayoutStatus::Paid),
            "failed" => Some(PayoutStatus::Failed),
            _ => None,
        }
    }
}

/// Aggregate payout view for a merchant, derived on demand and never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutSummary {
    pub merchant_id: String,
    /// Sum of all non-failed payouts, pending and paid
    pub total_owed_cents: i64,
    /// Sum of payouts already disbursed
    pub total_paid_cents: i64,
    /// Number of payouts still awaiting a weekly run
    pub pending_count: i64,
    pub currency: String,
}

impl PayoutSummary {
    pub fn empty(merchant_id: impl Into<String>) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            total_owed_cents: 0,
            total_paid_cents: 0,
            pending_count: 0,
            currency: "USD".to_string(),
        }
    }
}

impl Payout {
    pub async fn find_by_merchant_id(
        conn: &mut AsyncPgConnection,
        merchant_id: &str,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        use crate::schema::payouts::dsl;

        dsl::payouts
            .filter(dsl::merchant_id.eq(merchant_id))
            .order(dsl::created_at.desc())
            .load::<Self>(conn)
            .await
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payout_status_round_trips() {
        for status in [PayoutStatus::Pending, PayoutStatus::Paid, PayoutStatus::Failed] {
            assert_eq!(PayoutStatus::from_string(status.as_str()), Some(status));
        }
        assert_eq!(PayoutStatus::from_string("refunded"), None);
    }

    #[test]
    fn empty_summary_is_all_zero() {
        let summary = PayoutSummary::empty("m1");
        assert_eq!(summary.total_owed_cents, 0);
        assert_eq!(summary.total_paid_cents, 0);
        assert_eq!(summary.pending_count, 0);
    }
}
