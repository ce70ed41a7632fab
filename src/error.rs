use crate::types::{Money, Quantity};

#[derive(thiserror::Error, Debug)]
pub enum ShopError {
    #[error("Quantity {0} is outside 1..=1000")]
    InvalidQuantity(u32),
    #[error("Product {0} is not available for purchase")]
    ProductUnavailable(String),
    #[error("Requested {requested} but only {in_stock} in stock")]
    OutOfStock { requested: Quantity, in_stock: u32 },
    #[error("Purchase total {total} exceeds wallet balance {wallet}")]
    InsufficientFunds { total: Money, wallet: Money },
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("A refund request is already pending for purchase {0}")]
    DuplicateRequest(String),
    #[error("Refund window for purchase {0} has expired")]
    WindowExpired(String),
    #[error("Transaction conflict persisted after {attempts} attempts")]
    ConcurrentModification { attempts: u32 },
    #[error("Caller is not permitted to {0}")]
    Forbidden(&'static str),
    #[error("Invalid money amount: {0}")]
    InvalidAmount(String),
    #[error("A {kind} named {name:?} already exists")]
    DuplicateName { kind: &'static str, name: String },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("Internal failure: {0}")]
    Internal(String),
}

impl ShopError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        ShopError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Failures that are not business-rule outcomes and must be shown to users
    /// as an opaque internal error.
    pub fn is_internal(&self) -> bool {
        matches!(self, ShopError::Storage(_) | ShopError::Internal(_))
    }
}

impl From<minicbor::decode::Error> for ShopError {
    fn from(value: minicbor::decode::Error) -> Self {
        ShopError::Internal(value.to_string())
    }
}
