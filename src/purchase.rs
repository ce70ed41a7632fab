//! Purchase settlement: debit the wallet, take the stock, record the invoice line.
use tracing::{info, warn};

use crate::error::ShopError;
use crate::ledger::{Ledger, reject};
use crate::models::Purchase;
use crate::types::{CustomerId, ProductId, PurchaseId, Quantity, TimeStamp};

/// Buy `quantity` units of `product` for `customer`, all or nothing.
///
/// Availability, stock and funds are checked against rows read inside the
/// same transaction that writes them, so two buyers can never both pass the
/// stock check for the last unit. The unit price read there is the price
/// recorded on the purchase.
pub fn settle(
    ledger: &Ledger,
    customer_id: &CustomerId,
    product_id: &ProductId,
    quantity: u32,
    now: TimeStamp,
) -> Result<Purchase, ShopError> {
    let res = settle_inner(ledger, customer_id, product_id, quantity, now);

    match &res {
        Ok(purchase) => info!(
            customer = %customer_id,
            product = %product_id,
            purchase = %purchase.id,
            quantity = %purchase.amount,
            price = %purchase.price_at_time_of_purchase,
            "purchase settled"
        ),
        Err(e) => warn!(
            customer = %customer_id,
            product = %product_id,
            quantity,
            reason = %e,
            "purchase rejected"
        ),
    }
    res
}

fn settle_inner(
    ledger: &Ledger,
    customer_id: &CustomerId,
    product_id: &ProductId,
    quantity: u32,
    now: TimeStamp,
) -> Result<Purchase, ShopError> {
    let quantity = Quantity::new(quantity)?;
    // minted outside the transaction so a re-run reuses the same id
    let purchase_id = PurchaseId::generate()?;

    ledger.atomically("settle_purchase", |tx| {
        let mut product = tx.product(product_id)?;
        if !product.is_available {
            return reject(ShopError::ProductUnavailable(product_id.to_string()));
        }
        if quantity.get() > product.amount {
            return reject(ShopError::OutOfStock {
                requested: quantity,
                in_stock: product.amount,
            });
        }

        let mut customer = tx.customer(customer_id)?;
        let price = product.price;
        let Some(total) = price.checked_mul_qty(quantity) else {
            return reject(ShopError::Internal(format!(
                "line total overflow: {price} x {quantity}"
            )));
        };
        if total > customer.wallet {
            return reject(ShopError::InsufficientFunds {
                total,
                wallet: customer.wallet,
            });
        }

        let Some(wallet) = customer.wallet.checked_sub(total) else {
            return reject(ShopError::Internal(format!(
                "wallet underflow: {} - {total}",
                customer.wallet
            )));
        };
        customer.wallet = wallet;
        product.amount -= quantity.get();

        let purchase = Purchase {
            id: purchase_id.clone(),
            customer: customer_id.clone(),
            product: product_id.clone(),
            amount: quantity,
            price_at_time_of_purchase: price,
            created_at: now,
        };

        tx.put_customer(&customer)?;
        tx.put_product(&product)?;
        tx.insert_purchase(&purchase)?;

        Ok(purchase)
    })
}
