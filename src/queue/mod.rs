// Job queue capability layer for UGCPay Backend
// The scheduler and worker are written against the JobQueue trait so any
// compliant engine (redis in production, in-memory in tests) can be plugged in.

pub mod cron;
pub mod memory;
pub mod redis;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use self::cron::{CronError, CronSchedule};
pub use self::memory::InMemoryJobQueue;
pub use self::redis::RedisJobQueue;

/// Errors surfaced by a queue engine
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid recurrence rule: {0}")]
    InvalidCron(#[from] CronError),
}

/// A recurring job registration, one per merchant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Opaque job identifier assigned by the queue engine
    pub id: Uuid,
    pub job_name: String,
    pub merchant_id: String,
    /// Five-field cron expression driving the recurrence
    pub cron: String,
    /// Attempts consumed by the current occurrence
    pub attempts: u32,
    pub registered_at: DateTime<Utc>,
}

/// A retained record of a successfully processed occurrence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedJob {
    pub job_id: Uuid,
    pub merchant_id: String,
    pub output: serde_json::Value,
    pub finished_at: DateTime<Utc>,
}

/// A retained record of an occurrence that exhausted its retries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedJob {
    pub job_id: Uuid,
    pub merchant_id: String,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

/// What the engine did with a failed occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Re-queued after the engine's retry delay
    Retrying { attempts: u32 },
    /// Retries exhausted; retained in the bounded failed list
    DeadLettered { attempts: u32 },
}

/// Retry and retention policy owned by the queue engine.
/// Workers never implement their own retry/backoff on top of this.
#[derive(Debug, Clone)]
pub struct QueuePolicy {
    /// Attempts before an occurrence is moved to the failed list
    pub max_attempts: u32,
    /// Delay between retry attempts
    pub retry_delay: chrono::Duration,
    /// How long a leased occurrence may stay unacked before the engine
    /// reclaims it into the due set
    pub lease_timeout: chrono::Duration,
    /// Most recent completed records kept for inspection
    pub remove_on_complete: usize,
    /// Most recent failed records kept for inspection
    pub remove_on_fail: usize,
}

impl QueuePolicy {
    pub fn from_config(config: &crate::app_config::PayoutConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: chrono::Duration::seconds(config.retry_delay as i64),
            lease_timeout: chrono::Duration::seconds(config.lease_timeout as i64),
            remove_on_complete: config.remove_on_complete,
            remove_on_fail: config.remove_on_fail,
        }
    }
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: chrono::Duration::seconds(300),
            lease_timeout: chrono::Duration::seconds(600),
            remove_on_complete: 20,
            remove_on_fail: 50,
        }
    }
}

/// Abstract job queue: enqueue, consume-with-ack, retry, dead-letter.
///
/// Invariant: at most one recurring registration per merchant.
/// `register_recurring` is lookup-or-create, so callers may re-register freely.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Register a recurring job for a merchant, or return the existing
    /// registration's id if one is already standing.
    async fn register_recurring(
        &self,
        job_name: &str,
        merchant_id: &str,
        cron: &str,
    ) -> Result<Uuid, QueueError>;

    /// Look up the standing registration for a merchant, if any
    async fn find_recurring(&self, merchant_id: &str) -> Result<Option<JobRecord>, QueueError>;

    /// Remove a merchant's recurring registration. Returns whether one existed.
    async fn remove_recurring(&self, merchant_id: &str) -> Result<bool, QueueError>;

    /// Lease the next due occurrence, if any. A leased job must be resolved
    /// with `complete` or `fail`; the lease removes it from the due set so two
    /// workers cannot pick up the same occurrence. A lease left unacked past
    /// the policy's `lease_timeout` is reclaimed into the due set on a later
    /// poll.
    async fn pop_due(&self, now: DateTime<Utc>) -> Result<Option<JobRecord>, QueueError>;

    /// Ack success: retain the output per the bounded retention policy and
    /// schedule the next occurrence of the recurrence.
    async fn complete(&self, job: JobRecord, output: serde_json::Value) -> Result<(), QueueError>;

    /// Ack failure: re-queue with the engine's retry delay, or after
    /// `max_attempts` move the occurrence to the bounded failed list and
    /// schedule the next occurrence.
    async fn fail(&self, job: JobRecord, error: &str) -> Result<FailOutcome, QueueError>;

    /// Most recent completed records, newest first
    async fn recent_completed(&self) -> Result<Vec<CompletedJob>, QueueError>;

    /// Most recent failed records, newest first
    async fn recent_failed(&self) -> Result<Vec<FailedJob>, QueueError>;
}
