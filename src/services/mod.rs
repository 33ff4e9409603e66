// Services module for UGCPay Backend
// Business logic layer for the payout pipeline

pub mod payouts;
pub mod scheduler;
pub mod worker;

// Re-export commonly used services
pub use payouts::{PayoutError, PayoutProcessor, PayoutService};
pub use scheduler::{PayoutScheduler, SchedulerError, PAYOUT_JOB_NAME};
pub use worker::PayoutWorker;
