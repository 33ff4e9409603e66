// In-memory job queue engine
// Mirrors the redis engine's semantics exactly; used by tests and local
// development without a redis instance.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    CompletedJob, CronSchedule, FailOutcome, FailedJob, JobQueue, JobRecord, QueueError,
    QueuePolicy,
};

#[derive(Default)]
struct QueueState {
    /// merchant_id -> standing registration
    registry: HashMap<String, JobRecord>,
    /// merchant_id -> next due time
    scheduled: HashMap<String, DateTime<Utc>>,
    /// merchant_id -> lease deadline for an occurrence currently in flight
    leased: HashMap<String, DateTime<Utc>>,
    /// newest first, bounded by policy
    completed: VecDeque<CompletedJob>,
    /// newest first, bounded by policy
    failed: VecDeque<FailedJob>,
}

pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
    policy: QueuePolicy,
}

impl InMemoryJobQueue {
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            policy,
        }
    }

    /// Move a merchant's due time so a test can make its job due immediately
    pub async fn make_due(&self, merchant_id: &str, at: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        if let Some(due) = state.scheduled.get_mut(merchant_id) {
            *due = at;
        }
    }

    /// Next due time for a merchant, if scheduled
    pub async fn due_at(&self, merchant_id: &str) -> Option<DateTime<Utc>> {
        let state = self.state.lock().await;
        state.scheduled.get(merchant_id).copied()
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new(QueuePolicy::default())
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn register_recurring(
        &self,
        job_name: &str,
        merchant_id: &str,
        cron: &str,
    ) -> Result<Uuid, QueueError> {
        let schedule = CronSchedule::parse(cron)?;
        let now = Utc::now();

        let mut state = self.state.lock().await;
        if let Some(existing_id) = state.registry.get(merchant_id).map(|record| record.id) {
            // A registration with nothing standing in either set was leased
            // and never acked; re-arm it rather than leave it stalled.
            let lease_live = state
                .leased
                .get(merchant_id)
                .is_some_and(|deadline| *deadline > now);
            if !state.scheduled.contains_key(merchant_id) && !lease_live {
                state.leased.remove(merchant_id);
                state
                    .scheduled
                    .insert(merchant_id.to_string(), schedule.next_after(now)?);
            }
            return Ok(existing_id);
        }

        let record = JobRecord {
            id: Uuid::new_v4(),
            job_name: job_name.to_string(),
            merchant_id: merchant_id.to_string(),
            cron: cron.to_string(),
            attempts: 0,
            registered_at: now,
        };
        let id = record.id;
        let due = schedule.next_after(now)?;

        state.registry.insert(merchant_id.to_string(), record);
        state.scheduled.insert(merchant_id.to_string(), due);
        Ok(id)
    }

    async fn find_recurring(&self, merchant_id: &str) -> Result<Option<JobRecord>, QueueError> {
        let state = self.state.lock().await;
        Ok(state.registry.get(merchant_id).cloned())
    }

    async fn remove_recurring(&self, merchant_id: &str) -> Result<bool, QueueError> {
        let mut state = self.state.lock().await;
        state.scheduled.remove(merchant_id);
        state.leased.remove(merchant_id);
        Ok(state.registry.remove(merchant_id).is_some())
    }

    async fn pop_due(&self, now: DateTime<Utc>) -> Result<Option<JobRecord>, QueueError> {
        let mut state = self.state.lock().await;

        // Reclaim occurrences whose lease deadline has passed
        let expired: Vec<String> = state
            .leased
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(merchant, _)| merchant.clone())
            .collect();
        for merchant in expired {
            state.leased.remove(&merchant);
            state.scheduled.insert(merchant, now);
        }

        let due_merchant = state
            .scheduled
            .iter()
            .filter(|(_, due)| **due <= now)
            .min_by_key(|(_, due)| **due)
            .map(|(merchant, _)| merchant.clone());

        let Some(merchant) = due_merchant else {
            return Ok(None);
        };

        // Leasing removes the entry; a registration dropped mid-flight just
        // loses its orphaned due entry.
        state.scheduled.remove(&merchant);
        let record = state.registry.get(&merchant).cloned();
        if record.is_some() {
            state
                .leased
                .insert(merchant, now + self.policy.lease_timeout);
        }
        Ok(record)
    }

    async fn complete(&self, job: JobRecord, output: serde_json::Value) -> Result<(), QueueError> {
        let schedule = CronSchedule::parse(&job.cron)?;
        let now = Utc::now();
        let next = schedule.next_after(now)?;

        let mut state = self.state.lock().await;
        state.leased.remove(&job.merchant_id);
        state.completed.push_front(CompletedJob {
            job_id: job.id,
            merchant_id: job.merchant_id.clone(),
            output,
            finished_at: now,
        });
        state.completed.truncate(self.policy.remove_on_complete);

        if let Some(record) = state.registry.get_mut(&job.merchant_id) {
            record.attempts = 0;
            state.scheduled.insert(job.merchant_id.clone(), next);
        }
        Ok(())
    }

    async fn fail(&self, job: JobRecord, error: &str) -> Result<FailOutcome, QueueError> {
        let schedule = CronSchedule::parse(&job.cron)?;
        let now = Utc::now();
        let attempts = job.attempts + 1;

        let mut state = self.state.lock().await;
        state.leased.remove(&job.merchant_id);

        if attempts >= self.policy.max_attempts {
            // Occurrence is dead-lettered; the recurrence itself stays alive.
            state.failed.push_front(FailedJob {
                job_id: job.id,
                merchant_id: job.merchant_id.clone(),
                error: error.to_string(),
                attempts,
                failed_at: now,
            });
            state.failed.truncate(self.policy.remove_on_fail);

            let next = schedule.next_after(now)?;
            if let Some(record) = state.registry.get_mut(&job.merchant_id) {
                record.attempts = 0;
                state.scheduled.insert(job.merchant_id.clone(), next);
            }
            Ok(FailOutcome::DeadLettered { attempts })
        } else {
            if let Some(record) = state.registry.get_mut(&job.merchant_id) {
                record.attempts = attempts;
                state
                    .scheduled
                    .insert(job.merchant_id.clone(), now + self.policy.retry_delay);
            }
            Ok(FailOutcome::Retrying { attempts })
        }
    }

    async fn recent_completed(&self) -> Result<Vec<CompletedJob>, QueueError> {
        let state = self.state.lock().await;
        Ok(state.completed.iter().cloned().collect())
    }

    async fn recent_failed(&self) -> Result<Vec<FailedJob>, QueueError> {
        let state = self.state.lock().await;
        Ok(state.failed.iter().cloned().collect())
    }
}
