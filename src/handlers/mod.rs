// HTTP handlers for UGCPay Backend

pub mod payouts;
