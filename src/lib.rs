//! Purchase and refund settlement for an online shop.
//!
//! Customer wallets and product stock only ever move through two settlements:
//! [`purchase::settle`] and [`refund_settlement::settle_refund`]. Both run as a
//! single transaction in the [`ledger::Ledger`], so a purchase or refund either
//! applies in full or not at all.

pub mod access;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod purchase;
pub mod refund_request;
pub mod refund_settlement;
pub mod refund_window;
pub mod service;
pub mod types;
pub mod utils;

pub use access::Caller;
pub use config::Settings;
pub use error::ShopError;
pub use ledger::Ledger;
pub use refund_request::RefundOutcome;
pub use service::ShopService;
pub use types::{CustomerId, Money, ProductId, PurchaseId, Quantity, RefundRequestId, TimeStamp};
