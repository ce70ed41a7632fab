//! Who may call which core operation.
//!
//! The identity collaborator hands every request a verified [`Caller`]; the core
//! never re-authenticates it. [`authorize`] is the one place a permission
//! decision is made.
use crate::error::ShopError;
use crate::types::CustomerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Customer(CustomerId),
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<'a> {
    BrowseCatalogue,
    Purchase,
    RequestRefund,
    ViewOwnRefundRequests,
    ViewPurchases(&'a CustomerId),
    ListPendingRefunds,
    ApproveRefund,
    RejectRefund,
    ManageCatalog,
}

impl Action<'_> {
    fn describe(&self) -> &'static str {
        match self {
            Action::BrowseCatalogue => "browse the catalogue",
            Action::Purchase => "purchase products",
            Action::RequestRefund => "request refunds",
            Action::ViewOwnRefundRequests => "view their own refund requests",
            Action::ViewPurchases(_) => "view these purchases",
            Action::ListPendingRefunds => "list refund requests",
            Action::ApproveRefund => "approve refunds",
            Action::RejectRefund => "reject refunds",
            Action::ManageCatalog => "manage the catalogue",
        }
    }
}

impl Caller {
    /// The customer acting, if the caller is one.
    pub fn customer_id(&self) -> Option<&CustomerId> {
        match self {
            Caller::Customer(id) => Some(id),
            Caller::Admin => None,
        }
    }
}

pub fn authorize(caller: &Caller, action: Action<'_>) -> Result<(), ShopError> {
    let allowed = match (caller, action) {
        (_, Action::BrowseCatalogue) => true,
        (
            Caller::Customer(_),
            Action::Purchase | Action::RequestRefund | Action::ViewOwnRefundRequests,
        ) => true,
        (Caller::Customer(id), Action::ViewPurchases(owner)) => id == owner,
        // staff accounts do not shop
        (
            Caller::Admin,
            Action::Purchase | Action::RequestRefund | Action::ViewOwnRefundRequests,
        ) => false,
        (Caller::Admin, _) => true,
        (Caller::Customer(_), _) => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(ShopError::Forbidden(action.describe()))
    }
}
