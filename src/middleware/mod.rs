// Middleware modules for UGCPay Backend

pub mod merchant;

pub use merchant::MerchantId;
