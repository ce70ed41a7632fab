//! Refund requests: customers file them, administrators approve or reject them.
use tracing::{info, warn};

use crate::error::ShopError;
use crate::ledger::{Ledger, reject};
use crate::models::{Purchase, RefundRequest};
use crate::refund_settlement::settle_refund;
use crate::refund_window::RefundWindow;
use crate::types::{CustomerId, PurchaseId, RefundRequestId, TimeStamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundOutcome {
    /// A new request was recorded and awaits an administrator.
    Filed(RefundRequest),
    /// The purchase already had a pending request; nothing was written.
    AlreadyPending(RefundRequest),
}

impl RefundOutcome {
    pub fn request(&self) -> &RefundRequest {
        match self {
            RefundOutcome::Filed(request) | RefundOutcome::AlreadyPending(request) => request,
        }
    }
}

/// File a refund request for one of the customer's own purchases.
///
/// Filing twice is harmless: the second call returns the pending request as
/// [`RefundOutcome::AlreadyPending`]. An expired window is `WindowExpired`
/// and leaves the ledger untouched. A purchase that belongs to someone else is
/// reported as `NotFound`.
pub fn request_refund(
    ledger: &Ledger,
    window: &RefundWindow,
    customer_id: &CustomerId,
    purchase_id: &PurchaseId,
    now: TimeStamp,
) -> Result<RefundOutcome, ShopError> {
    let request_id = RefundRequestId::generate()?;

    let res = ledger.atomically("request_refund", |tx| {
        let purchase = tx.purchase(purchase_id)?;
        if &purchase.customer != customer_id {
            return reject(ShopError::not_found("purchase", purchase_id));
        }
        if let Some(existing) = tx.refund_request_for(purchase_id)? {
            return Ok(RefundOutcome::AlreadyPending(existing));
        }
        if !window.is_eligible(&purchase, now) {
            return reject(ShopError::WindowExpired(purchase_id.to_string()));
        }

        let request = RefundRequest {
            id: request_id.clone(),
            purchase: purchase_id.clone(),
            customer: customer_id.clone(),
            requested_at: now,
        };
        tx.insert_refund_request(&request)?;
        Ok(RefundOutcome::Filed(request))
    });

    match &res {
        Ok(RefundOutcome::Filed(request)) => {
            info!(customer = %customer_id, purchase = %purchase_id, refund_request = %request.id, "refund request filed")
        }
        Ok(RefundOutcome::AlreadyPending(request)) => {
            info!(customer = %customer_id, purchase = %purchase_id, refund_request = %request.id, "refund request already pending")
        }
        Err(e) => warn!(customer = %customer_id, purchase = %purchase_id, reason = %e, "refund request refused"),
    }
    res
}

pub fn list_pending_refund_requests(ledger: &Ledger) -> Result<Vec<RefundRequest>, ShopError> {
    ledger.refund_requests()
}

/// Drop the request; the purchase stands.
pub fn reject_refund(ledger: &Ledger, request_id: &RefundRequestId) -> Result<RefundRequest, ShopError> {
    let request = ledger.atomically("reject_refund", |tx| tx.remove_refund_request(request_id))?;

    info!(refund_request = %request_id, purchase = %request.purchase, "refund request rejected");
    Ok(request)
}

/// Approve the request and reverse its purchase. Returns the deleted purchase.
pub fn approve_refund(ledger: &Ledger, request_id: &RefundRequestId) -> Result<Purchase, ShopError> {
    settle_refund(ledger, request_id)
}
