//! Refund settlement: reverse an approved purchase.
use tracing::{info, warn};

use crate::error::ShopError;
use crate::ledger::{Ledger, reject};
use crate::models::Purchase;
use crate::types::RefundRequestId;

/// Credit the wallet with what was paid, put the units back in stock and
/// delete both the refund request and its purchase, in one transaction.
///
/// The credit uses the purchase's recorded unit price, never the product's
/// current one, so the refund always equals the original debit.
pub fn settle_refund(ledger: &Ledger, request_id: &RefundRequestId) -> Result<Purchase, ShopError> {
    let res = ledger.atomically("settle_refund", |tx| {
        let request = tx.remove_refund_request(request_id)?;
        // a purchase deleted out of band must surface, not silently succeed
        let purchase = tx.remove_purchase(&request.purchase)?;

        let Some(total) = purchase.total() else {
            return reject(ShopError::Internal(format!(
                "refund total overflow for purchase {}",
                purchase.id
            )));
        };

        let mut customer = tx.customer(&purchase.customer)?;
        let Some(wallet) = customer.wallet.checked_add(total) else {
            return reject(ShopError::Internal(format!(
                "wallet overflow refunding {total} to {}",
                customer.id
            )));
        };
        customer.wallet = wallet;

        let mut product = tx.product(&purchase.product)?;
        let Some(amount) = product.amount.checked_add(purchase.amount.get()) else {
            return reject(ShopError::Internal(format!(
                "stock overflow restocking product {}",
                product.id
            )));
        };
        product.amount = amount;

        tx.put_customer(&customer)?;
        tx.put_product(&product)?;

        Ok(purchase)
    });

    match &res {
        Ok(purchase) => info!(
            refund_request = %request_id,
            purchase = %purchase.id,
            customer = %purchase.customer,
            product = %purchase.product,
            quantity = %purchase.amount,
            price = %purchase.price_at_time_of_purchase,
            "refund settled"
        ),
        Err(e) => warn!(refund_request = %request_id, reason = %e, "refund settlement failed"),
    }
    res
}
