// Payout worker: consumes due occurrences from the queue engine and runs
// bulk payout processing. Retry/backoff belongs to the engine; the worker's
// own responsibility ends at reporting.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::queue::{FailOutcome, JobQueue, JobRecord, QueueError};
use crate::services::payouts::PayoutProcessor;

pub struct PayoutWorker {
    queue: Arc<dyn JobQueue>,
    processor: Arc<dyn PayoutProcessor>,
    poll_interval: Duration,
}

impl PayoutWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        processor: Arc<dyn PayoutProcessor>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            processor,
            poll_interval,
        }
    }

    /// Poll loop. Runs until the shutdown channel flips to true or closes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Payout worker started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.drain_due().await {
                        error!("Payout worker poll failed: {}", e);
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Payout worker shutting down");
                        break;
                    }
                },
            }
        }
    }

    /// Process every occurrence currently due. Returns how many were leased.
    pub async fn drain_due(&self) -> Result<usize, QueueError> {
        let mut leased = 0;
        while let Some(job) = self.queue.pop_due(Utc::now()).await? {
            leased += 1;
            self.run_job(job).await?;
        }
        Ok(leased)
    }

    /// One isolated unit of work: invoke bulk processing, then ack the
    /// occurrence as completed or failed.
    async fn run_job(&self, job: JobRecord) -> Result<(), QueueError> {
        let job_id = job.id;
        let merchant_id = job.merchant_id.clone();

        match self.processor.process_payouts(&merchant_id).await {
            Ok(processed) => {
                info!(
                    job_id = %job_id,
                    merchant_id,
                    processed,
                    "Payout job completed"
                );
                self.queue
                    .complete(job, json!({ "processed": processed }))
                    .await
            },
            Err(e) => {
                let outcome = self.queue.fail(job, &e.to_string()).await?;
                match outcome {
                    FailOutcome::Retrying { attempts } => {
                        warn!(
                            job_id = %job_id,
                            merchant_id,
                            attempts,
                            "Payout job failed, engine will retry: {}", e
                        );
                    },
                    FailOutcome::DeadLettered { attempts } => {
                        error!(
                            job_id = %job_id,
                            merchant_id,
                            attempts,
                            "Payout job failed permanently: {}", e
                        );
                    },
                }
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{InMemoryJobQueue, QueuePolicy};
    use crate::services::payouts::PayoutError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Processor fake: fails the first `fail_times` invocations, then
    /// reports `processed` disbursements.
    struct FakeProcessor {
        calls: AtomicUsize,
        fail_times: usize,
        processed: usize,
    }

    impl FakeProcessor {
        fn succeeding(processed: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_times: 0,
                processed,
            }
        }

        fn failing_first(fail_times: usize, processed: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_times,
                processed,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl PayoutProcessor for FakeProcessor {
        async fn process_payouts(&self, _merchant_id: &str) -> Result<usize, PayoutError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_times {
                Err(PayoutError::Database("stripe transfer failed".to_string()))
            } else {
                Ok(self.processed)
            }
        }
    }

    async fn due_queue(policy: QueuePolicy) -> Arc<InMemoryJobQueue> {
        let queue = Arc::new(InMemoryJobQueue::new(policy));
        queue
            .register_recurring("payouts:weekly", "shop-1", "0 2 * * 5")
            .await
            .unwrap();
        queue.make_due("shop-1", Utc::now()).await;
        queue
    }

    #[tokio::test]
    async fn completes_due_job_and_records_output() {
        let queue = due_queue(QueuePolicy::default()).await;
        let processor = Arc::new(FakeProcessor::succeeding(3));
        let worker = PayoutWorker::new(
            queue.clone(),
            processor.clone(),
            Duration::from_secs(30),
        );

        let leased = worker.drain_due().await.unwrap();

        assert_eq!(leased, 1);
        assert_eq!(processor.calls(), 1);
        let completed = queue.recent_completed().await.unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].output, json!({ "processed": 3 }));
        assert!(queue.recent_failed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn drain_is_a_noop_when_nothing_is_due() {
        let queue = Arc::new(InMemoryJobQueue::default());
        queue
            .register_recurring("payouts:weekly", "shop-1", "0 2 * * 5")
            .await
            .unwrap();
        // Next Friday 02:00 is in the future, so nothing is due now
        let processor = Arc::new(FakeProcessor::succeeding(1));
        let worker = PayoutWorker::new(
            queue.clone(),
            processor.clone(),
            Duration::from_secs(30),
        );

        assert_eq!(worker.drain_due().await.unwrap(), 0);
        assert_eq!(processor.calls(), 0);
    }

    #[tokio::test]
    async fn failing_job_is_retried_then_dead_lettered() {
        let policy = QueuePolicy {
            max_attempts: 3,
            retry_delay: chrono::Duration::seconds(0),
            ..QueuePolicy::default()
        };
        let queue = due_queue(policy).await;
        // Always fails
        let processor = Arc::new(FakeProcessor::failing_first(usize::MAX, 0));
        let worker = PayoutWorker::new(
            queue.clone(),
            processor.clone(),
            Duration::from_secs(30),
        );

        // Zero retry delay keeps the occurrence immediately due again, so a
        // single drain walks it through all three attempts.
        let leased = worker.drain_due().await.unwrap();

        assert_eq!(leased, 3);
        assert_eq!(processor.calls(), 3);
        let failed = queue.recent_failed().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].attempts, 3);
        assert_eq!(failed[0].error, "Database error: stripe transfer failed");
        // The recurrence survives the dead-letter
        assert!(queue.find_recurring("shop-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn recovers_on_a_retry_attempt() {
        let policy = QueuePolicy {
            max_attempts: 5,
            retry_delay: chrono::Duration::seconds(0),
            ..QueuePolicy::default()
        };
        let queue = due_queue(policy).await;
        let processor = Arc::new(FakeProcessor::failing_first(2, 7));
        let worker = PayoutWorker::new(
            queue.clone(),
            processor.clone(),
            Duration::from_secs(30),
        );

        let leased = worker.drain_due().await.unwrap();

        // Two failed attempts, then success
        assert_eq!(leased, 3);
        let completed = queue.recent_completed().await.unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].output, json!({ "processed": 7 }));
        assert!(queue.recent_failed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_loop_exits_on_shutdown_signal() {
        let queue = Arc::new(InMemoryJobQueue::default());
        let processor = Arc::new(FakeProcessor::succeeding(0));
        let worker = PayoutWorker::new(queue, processor, Duration::from_millis(10));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(rx));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should stop promptly")
            .unwrap();
    }
}
