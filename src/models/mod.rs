// Data models for UGCPay Backend

pub mod merchant;
pub mod payout;

pub use merchant::{Merchant, NewMerchant};
pub use payout::{NewPayout, Payout, PayoutStatus, PayoutSummary};
