// Payout scheduler: standing weekly registrations against the queue engine

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::queue::{JobQueue, JobRecord, QueueError};

/// Name every recurring payout registration is filed under
pub const PAYOUT_JOB_NAME: &str = "payouts:weekly";

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Merchant ID required")]
    MissingMerchantId,

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Registers recurring payout jobs. Constructed once at process start with
/// an injected queue engine and shared by reference from AppState.
pub struct PayoutScheduler {
    queue: Arc<dyn JobQueue>,
    cron: String,
}

impl PayoutScheduler {
    pub fn new(queue: Arc<dyn JobQueue>, cron: impl Into<String>) -> Self {
        Self {
            queue,
            cron: cron.into(),
        }
    }

    /// Register the merchant's weekly payout job. Idempotent: the queue's
    /// per-merchant registry guarantees at most one standing registration,
    /// so calling this repeatedly returns the same job id.
    ///
    /// Merchant existence is the caller's responsibility; the scheduler only
    /// rejects empty identifiers.
    pub async fn schedule_payouts(&self, merchant_id: &str) -> Result<Uuid, SchedulerError> {
        if merchant_id.trim().is_empty() {
            return Err(SchedulerError::MissingMerchantId);
        }

        let job_id = self
            .queue
            .register_recurring(PAYOUT_JOB_NAME, merchant_id, &self.cron)
            .await?;

        info!(
            merchant_id,
            job_id = %job_id,
            cron = %self.cron,
            "Weekly payout job scheduled"
        );
        Ok(job_id)
    }

    /// The merchant's standing registration, if any
    pub async fn standing_registration(
        &self,
        merchant_id: &str,
    ) -> Result<Option<JobRecord>, SchedulerError> {
        if merchant_id.trim().is_empty() {
            return Err(SchedulerError::MissingMerchantId);
        }
        Ok(self.queue.find_recurring(merchant_id).await?)
    }

    /// Drop the merchant's recurring payout job (merchant offboarding)
    pub async fn unschedule(&self, merchant_id: &str) -> Result<bool, SchedulerError> {
        if merchant_id.trim().is_empty() {
            return Err(SchedulerError::MissingMerchantId);
        }
        let removed = self.queue.remove_recurring(merchant_id).await?;
        if removed {
            info!(merchant_id, "Weekly payout job unscheduled");
        }
        Ok(removed)
    }

    /// Cron expression this scheduler registers jobs with
    pub fn cron(&self) -> &str {
        &self.cron
    }
}
