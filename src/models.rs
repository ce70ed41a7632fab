//! Records persisted by the ledger. Each is stored CBOR-encoded under its id.
use crate::types::{CustomerId, Money, ProductId, PurchaseId, Quantity, RefundRequestId, TimeStamp};

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Customer {
    #[n(0)]
    pub id: CustomerId,
    #[n(1)]
    pub username: String,
    #[n(2)]
    pub wallet: Money, // never negative once a settlement commits
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Product {
    #[n(0)]
    pub id: ProductId,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub price: Money,
    #[n(3)]
    pub amount: u32, // units in stock
    #[n(4)]
    pub is_available: bool,
}

/// One invoice line. Never edited after creation; a refund deletes it.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Purchase {
    #[n(0)]
    pub id: PurchaseId,
    #[n(1)]
    pub customer: CustomerId,
    #[n(2)]
    pub product: ProductId,
    #[n(3)]
    pub amount: Quantity,
    #[n(4)]
    pub price_at_time_of_purchase: Money,
    #[n(5)]
    pub created_at: TimeStamp,
}

impl Purchase {
    /// What the customer paid, and what a refund gives back.
    pub fn total(&self) -> Option<Money> {
        self.price_at_time_of_purchase.checked_mul_qty(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct RefundRequest {
    #[n(0)]
    pub id: RefundRequestId,
    #[n(1)]
    pub purchase: PurchaseId,
    #[n(2)]
    pub customer: CustomerId, // owner of the purchase, kept for per-customer listings
    #[n(3)]
    pub requested_at: TimeStamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{decode_record, encode_record};

    fn purchase() -> Purchase {
        Purchase {
            id: PurchaseId::from("purchase1test"),
            customer: CustomerId::from("cust1test"),
            product: ProductId::from("prod1test"),
            amount: Quantity::new(3).unwrap(),
            price_at_time_of_purchase: Money::from_cents(3_000),
            created_at: TimeStamp::new_with(2024, 6, 15, 10, 30, 0).unwrap(),
        }
    }

    #[test]
    fn purchase_total_uses_locked_price() {
        assert_eq!(purchase().total(), Some(Money::from_cents(9_000)));
    }

    #[test]
    fn purchase_record_encoding() {
        let original = purchase();

        let bytes = encode_record(&original).unwrap();
        let decoded: Purchase = decode_record(&bytes).unwrap();

        assert_eq!(original, decoded);
    }
}
