use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::schema::merchants;

/// A tenant of the platform, keyed by an opaque string id
/// (Shopify shop domain). Never hard-deleted in normal operation.
#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, AsChangeset,
)]
#[diesel(table_name = merchants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Merchant {
    pub id: String,
    pub onboarding_completed: bool,
    pub onboarding_step: i32,
    pub plan: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = merchants)]
pub struct NewMerchant {
    pub id: String,
    pub onboarding_completed: bool,
    pub onboarding_step: i32,
    pub plan: String,
}

impl NewMerchant {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            onboarding_completed: false,
            onboarding_step: 0,
            plan: "free".to_string(),
        }
    }
}

impl Merchant {
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        merchant_id: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::merchants::dsl;

        dsl::merchants
            .find(merchant_id)
            .first::<Self>(conn)
            .await
            .optional()
    }

}
