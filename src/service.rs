//! Service layer API the presentation layer calls into
use std::sync::Arc;

use crate::access::{Action, Caller, authorize};
use crate::config::Settings;
use crate::error::ShopError;
use crate::ledger::Ledger;
use crate::models::{Customer, Product, Purchase, RefundRequest};
use crate::purchase;
use crate::refund_request::{self, RefundOutcome};
use crate::refund_window::RefundWindow;
use crate::types::{CustomerId, Money, ProductId, PurchaseId, RefundRequestId, TimeStamp};

#[derive(Debug, Clone)]
pub struct ShopService {
    ledger: Arc<Ledger>,
    window: RefundWindow,
}

impl ShopService {
    pub fn new(ledger: Arc<Ledger>, settings: &Settings) -> Self {
        Self {
            ledger,
            window: settings.refund_window(),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn refund_window(&self) -> &RefundWindow {
        &self.window
    }

    /// Customers only see products that are on sale; admins see everything
    pub fn catalogue(&self, caller: &Caller) -> Result<Vec<Product>, ShopError> {
        authorize(caller, Action::BrowseCatalogue)?;
        let mut products = self.ledger.products()?;
        if caller.customer_id().is_some() {
            products.retain(|p| p.is_available);
        }
        Ok(products)
    }

    /// Buy a product with the caller's wallet
    #[tracing::instrument(skip(self))]
    pub fn purchase(
        &self,
        caller: &Caller,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Purchase, ShopError> {
        authorize(caller, Action::Purchase)?;
        let customer_id = caller.customer_id().ok_or(ShopError::Forbidden("purchase products"))?;

        purchase::settle(&self.ledger, customer_id, product_id, quantity, TimeStamp::new())
    }

    /// Purchases of one customer, newest first
    pub fn purchases_of(
        &self,
        caller: &Caller,
        customer_id: &CustomerId,
    ) -> Result<Vec<Purchase>, ShopError> {
        authorize(caller, Action::ViewPurchases(customer_id))?;
        self.ledger.purchases_of(customer_id)
    }

    /// Ask for a purchase to be refunded
    #[tracing::instrument(skip(self))]
    pub fn request_refund(
        &self,
        caller: &Caller,
        purchase_id: &PurchaseId,
    ) -> Result<RefundOutcome, ShopError> {
        authorize(caller, Action::RequestRefund)?;
        let customer_id = caller.customer_id().ok_or(ShopError::Forbidden("request refunds"))?;

        refund_request::request_refund(
            &self.ledger,
            &self.window,
            customer_id,
            purchase_id,
            TimeStamp::new(),
        )
    }

    /// Refund requests the caller filed and that are still open
    pub fn my_refund_requests(&self, caller: &Caller) -> Result<Vec<RefundRequest>, ShopError> {
        authorize(caller, Action::ViewOwnRefundRequests)?;
        let customer_id = caller
            .customer_id()
            .ok_or(ShopError::Forbidden("view their own refund requests"))?;

        self.ledger.refund_requests_of(customer_id)
    }

    /// All open refund requests, for the administrators' queue
    pub fn list_pending_refund_requests(
        &self,
        caller: &Caller,
    ) -> Result<Vec<RefundRequest>, ShopError> {
        authorize(caller, Action::ListPendingRefunds)?;
        refund_request::list_pending_refund_requests(&self.ledger)
    }

    /// Approve a refund request, crediting the customer and restocking
    #[tracing::instrument(skip(self))]
    pub fn approve_refund(
        &self,
        caller: &Caller,
        request_id: &RefundRequestId,
    ) -> Result<Purchase, ShopError> {
        authorize(caller, Action::ApproveRefund)?;
        refund_request::approve_refund(&self.ledger, request_id)
    }

    /// Reject a refund request, leaving the purchase in place
    #[tracing::instrument(skip(self))]
    pub fn reject_refund(
        &self,
        caller: &Caller,
        request_id: &RefundRequestId,
    ) -> Result<RefundRequest, ShopError> {
        authorize(caller, Action::RejectRefund)?;
        refund_request::reject_refund(&self.ledger, request_id)
    }

    /// Open a customer account.
    ///
    /// Registration happens before the caller has an identity, so it is not
    /// gated by [`authorize`].
    #[tracing::instrument(skip(self))]
    pub fn register_customer(
        &self,
        username: &str,
        opening_wallet: Money,
    ) -> Result<Customer, ShopError> {
        self.ledger.register_customer(username, opening_wallet)
    }

    #[tracing::instrument(skip(self))]
    pub fn add_product(
        &self,
        caller: &Caller,
        name: &str,
        price: Money,
        amount: u32,
        is_available: bool,
    ) -> Result<Product, ShopError> {
        authorize(caller, Action::ManageCatalog)?;
        self.ledger.add_product(name, price, amount, is_available)
    }

    #[tracing::instrument(skip(self))]
    pub fn set_product_price(
        &self,
        caller: &Caller,
        product_id: &ProductId,
        price: Money,
    ) -> Result<Product, ShopError> {
        authorize(caller, Action::ManageCatalog)?;
        self.ledger.set_product_price(product_id, price)
    }

    #[tracing::instrument(skip(self))]
    pub fn set_product_availability(
        &self,
        caller: &Caller,
        product_id: &ProductId,
        is_available: bool,
    ) -> Result<Product, ShopError> {
        authorize(caller, Action::ManageCatalog)?;
        self.ledger.set_product_availability(product_id, is_available)
    }
}
