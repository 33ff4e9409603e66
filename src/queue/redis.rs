// Redis-backed job queue engine
//
// Layout (under a configurable key prefix):
//   {prefix}:jobs:registry   HASH   merchant_id -> JobRecord json
//   {prefix}:jobs:scheduled  ZSET   merchant_id scored by next due epoch
//   {prefix}:jobs:leased     ZSET   merchant_id scored by lease deadline epoch
//   {prefix}:jobs:completed  LIST   CompletedJob json, newest first, bounded
//   {prefix}:jobs:failed     LIST   FailedJob json, newest first, bounded
//
// HSETNX on the registry enforces at most one recurring registration per
// merchant; ZREM on lease arbitrates concurrent workers. Leases that outlive
// their deadline are reclaimed into the due set on a later poll.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::RedisPool;

use super::{
    CompletedJob, CronSchedule, FailOutcome, FailedJob, JobQueue, JobRecord, QueueError,
    QueuePolicy,
};

pub struct RedisJobQueue {
    pool: RedisPool,
    policy: QueuePolicy,
    prefix: String,
}

impl RedisJobQueue {
    pub fn new(pool: RedisPool, policy: QueuePolicy) -> Self {
        Self::with_prefix(pool, policy, "payouts")
    }

    /// A distinct prefix isolates parallel deployments (and test runs)
    /// sharing one redis instance.
    pub fn with_prefix(pool: RedisPool, policy: QueuePolicy, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            policy,
            prefix: prefix.into(),
        }
    }

    fn registry_key(&self) -> String {
        format!("{}:jobs:registry", self.prefix)
    }

    fn scheduled_key(&self) -> String {
        format!("{}:jobs:scheduled", self.prefix)
    }

    fn leased_key(&self) -> String {
        format!("{}:jobs:leased", self.prefix)
    }

    fn completed_key(&self) -> String {
        format!("{}:jobs:completed", self.prefix)
    }

    fn failed_key(&self) -> String {
        format!("{}:jobs:failed", self.prefix)
    }

    async fn store_record_and_schedule(
        &self,
        conn: &mut redis::aio::ConnectionManager,
        record: &JobRecord,
        due: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        let json = serde_json::to_string(record)?;
        redis::pipe()
            .atomic()
            .zrem(self.leased_key(), &record.merchant_id)
            .ignore()
            .hset(self.registry_key(), &record.merchant_id, json)
            .ignore()
            .zadd(self.scheduled_key(), &record.merchant_id, due.timestamp())
            .ignore()
            .query_async::<()>(conn)
            .await?;
        Ok(())
    }

    /// Drop a lease without rescheduling. Used when the registration was
    /// removed while its occurrence was in flight.
    async fn release_lease(
        &self,
        conn: &mut redis::aio::ConnectionManager,
        merchant_id: &str,
    ) -> Result<(), QueueError> {
        let _: () = conn.zrem(self.leased_key(), merchant_id).await?;
        Ok(())
    }

    async fn push_bounded(
        &self,
        conn: &mut redis::aio::ConnectionManager,
        key: String,
        json: String,
        keep: usize,
    ) -> Result<(), QueueError> {
        if keep == 0 {
            // Retention disabled entirely
            let _: () = conn.del(key).await?;
            return Ok(());
        }
        redis::pipe()
            .atomic()
            .lpush(&key, json)
            .ignore()
            .ltrim(&key, 0, keep as isize - 1)
            .ignore()
            .query_async::<()>(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn register_recurring(
        &self,
        job_name: &str,
        merchant_id: &str,
        cron: &str,
    ) -> Result<Uuid, QueueError> {
        let schedule = CronSchedule::parse(cron)?;
        let mut conn = self.pool.get_connection().await?;

        let now = Utc::now();
        let record = JobRecord {
            id: Uuid::new_v4(),
            job_name: job_name.to_string(),
            merchant_id: merchant_id.to_string(),
            cron: cron.to_string(),
            attempts: 0,
            registered_at: now,
        };
        let json = serde_json::to_string(&record)?;

        // HSETNX arbitrates concurrent registrations for the same merchant
        let inserted: bool = conn
            .hset_nx(self.registry_key(), merchant_id, &json)
            .await?;

        if inserted {
            let due = schedule.next_after(now)?;
            let _: () = conn
                .zadd(self.scheduled_key(), merchant_id, due.timestamp())
                .await?;
            debug!(
                merchant_id,
                job_id = %record.id,
                due = %due,
                "Registered recurring payout job"
            );
            return Ok(record.id);
        }

        // Lost the race or already registered; honor the standing record
        let existing: Option<String> = conn.hget(self.registry_key(), merchant_id).await?;
        match existing {
            Some(raw) => {
                let standing = serde_json::from_str::<JobRecord>(&raw)?;

                // A registration with nothing in the due set and no live
                // lease was leased and never acked; re-arm it rather than
                // leave it stalled.
                let scheduled_at: Option<i64> =
                    conn.zscore(self.scheduled_key(), merchant_id).await?;
                if scheduled_at.is_none() {
                    let lease_deadline: Option<i64> =
                        conn.zscore(self.leased_key(), merchant_id).await?;
                    let lease_live =
                        lease_deadline.is_some_and(|deadline| deadline > now.timestamp());
                    if !lease_live {
                        let due = schedule.next_after(Utc::now())?;
                        redis::pipe()
                            .atomic()
                            .zrem(self.leased_key(), merchant_id)
                            .ignore()
                            .zadd(self.scheduled_key(), merchant_id, due.timestamp())
                            .ignore()
                            .query_async::<()>(&mut conn)
                            .await?;
                        warn!(merchant_id, "Re-armed a stalled recurring registration");
                    }
                }
                Ok(standing.id)
            },
            None => {
                // Registration vanished between HSETNX and HGET; claim it
                warn!(merchant_id, "Recurring registration raced a removal, re-registering");
                let due = schedule.next_after(Utc::now())?;
                self.store_record_and_schedule(&mut conn, &record, due)
                    .await?;
                Ok(record.id)
            },
        }
    }

    async fn find_recurring(&self, merchant_id: &str) -> Result<Option<JobRecord>, QueueError> {
        let mut conn = self.pool.get_connection().await?;
        let raw: Option<String> = conn.hget(self.registry_key(), merchant_id).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn remove_recurring(&self, merchant_id: &str) -> Result<bool, QueueError> {
        let mut conn = self.pool.get_connection().await?;
        let (removed, _, _): (i64, i64, i64) = redis::pipe()
            .atomic()
            .hdel(self.registry_key(), merchant_id)
            .zrem(self.scheduled_key(), merchant_id)
            .zrem(self.leased_key(), merchant_id)
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn pop_due(&self, now: DateTime<Utc>) -> Result<Option<JobRecord>, QueueError> {
        let mut conn = self.pool.get_connection().await?;

        // Reclaim occurrences whose lease deadline has passed
        let expired: Vec<String> = conn
            .zrangebyscore(self.leased_key(), "-inf", now.timestamp())
            .await?;
        for merchant_id in expired {
            let reclaimed: i64 = conn.zrem(self.leased_key(), &merchant_id).await?;
            if reclaimed > 0 {
                let _: () = conn
                    .zadd(self.scheduled_key(), &merchant_id, now.timestamp())
                    .await?;
                warn!(merchant_id = %merchant_id, "Reclaimed an expired payout lease");
            }
        }

        loop {
            let due: Vec<String> = conn
                .zrangebyscore_limit(self.scheduled_key(), "-inf", now.timestamp(), 0, 1)
                .await?;
            let Some(merchant_id) = due.into_iter().next() else {
                return Ok(None);
            };

            // ZREM is the lease: exactly one worker wins the removal
            let removed: i64 = conn.zrem(self.scheduled_key(), &merchant_id).await?;
            if removed == 0 {
                continue;
            }

            let deadline = (now + self.policy.lease_timeout).timestamp();
            let _: () = conn.zadd(self.leased_key(), &merchant_id, deadline).await?;

            let raw: Option<String> = conn.hget(self.registry_key(), &merchant_id).await?;
            match raw {
                Some(raw) => return Ok(Some(serde_json::from_str(&raw)?)),
                // Registration was removed; the due entry was an orphan
                None => {
                    self.release_lease(&mut conn, &merchant_id).await?;
                    continue;
                },
            }
        }
    }

    async fn complete(&self, job: JobRecord, output: serde_json::Value) -> Result<(), QueueError> {
        let schedule = CronSchedule::parse(&job.cron)?;
        let now = Utc::now();
        let next = schedule.next_after(now)?;

        let mut conn = self.pool.get_connection().await?;

        let completed = CompletedJob {
            job_id: job.id,
            merchant_id: job.merchant_id.clone(),
            output,
            finished_at: now,
        };
        self.push_bounded(
            &mut conn,
            self.completed_key(),
            serde_json::to_string(&completed)?,
            self.policy.remove_on_complete,
        )
        .await?;

        // A registration removed while its occurrence was in flight must not
        // be resurrected; the run is retained above either way.
        let standing: bool = conn.hexists(self.registry_key(), &job.merchant_id).await?;
        if standing {
            let refreshed = JobRecord { attempts: 0, ..job };
            self.store_record_and_schedule(&mut conn, &refreshed, next)
                .await?;
        } else {
            self.release_lease(&mut conn, &job.merchant_id).await?;
        }
        Ok(())
    }

    async fn fail(&self, job: JobRecord, error: &str) -> Result<FailOutcome, QueueError> {
        let schedule = CronSchedule::parse(&job.cron)?;
        let now = Utc::now();
        let attempts = job.attempts + 1;

        let mut conn = self.pool.get_connection().await?;
        let standing: bool = conn.hexists(self.registry_key(), &job.merchant_id).await?;

        if attempts >= self.policy.max_attempts {
            // Occurrence is dead-lettered; the recurrence itself stays alive
            let failed = FailedJob {
                job_id: job.id,
                merchant_id: job.merchant_id.clone(),
                error: error.to_string(),
                attempts,
                failed_at: now,
            };
            self.push_bounded(
                &mut conn,
                self.failed_key(),
                serde_json::to_string(&failed)?,
                self.policy.remove_on_fail,
            )
            .await?;

            if standing {
                let next = schedule.next_after(now)?;
                let refreshed = JobRecord { attempts: 0, ..job };
                self.store_record_and_schedule(&mut conn, &refreshed, next)
                    .await?;
            } else {
                self.release_lease(&mut conn, &job.merchant_id).await?;
            }
            Ok(FailOutcome::DeadLettered { attempts })
        } else if standing {
            let retrying = JobRecord { attempts, ..job };
            let retry_at = now + self.policy.retry_delay;
            self.store_record_and_schedule(&mut conn, &retrying, retry_at)
                .await?;
            Ok(FailOutcome::Retrying { attempts })
        } else {
            self.release_lease(&mut conn, &job.merchant_id).await?;
            Ok(FailOutcome::Retrying { attempts })
        }
    }

    async fn recent_completed(&self) -> Result<Vec<CompletedJob>, QueueError> {
        let mut conn = self.pool.get_connection().await?;
        let raw: Vec<String> = conn.lrange(self.completed_key(), 0, -1).await?;
        raw.iter()
            .map(|json| serde_json::from_str(json).map_err(QueueError::from))
            .collect()
    }

    async fn recent_failed(&self) -> Result<Vec<FailedJob>, QueueError> {
        let mut conn = self.pool.get_connection().await?;
        let raw: Vec<String> = conn.lrange(self.failed_key(), 0, -1).await?;
        raw.iter()
            .map(|json| serde_json::from_str(json).map_err(QueueError::from))
            .collect()
    }
}
