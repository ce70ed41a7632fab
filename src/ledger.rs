//! Ledger store: durable customers, products, purchases and refund requests.
//!
//! Every record kind lives in its own sled tree, keyed by its id and stored as
//! CBOR. Index trees back the uniqueness rules: one customer per username, one
//! product per name and one refund request per purchase.
//!
//! Writers go through `Ledger::atomically`, which runs a serializable sled
//! transaction over all trees. sled re-runs the closure when it detects a
//! conflicting writer; the ledger bounds how often that may happen before it
//! gives up with [`ShopError::ConcurrentModification`]. Any error returned from
//! the closure rolls the whole transaction back.
//!
//! Only the settlement modules inside this crate get write access. Outside
//! callers see reads plus the registration and catalogue operations.
use std::cell::Cell;
use std::path::Path;

use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::{Db, Transactional, Tree};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::ShopError;
use crate::models::{Customer, Product, Purchase, RefundRequest};
use crate::types::{CustomerId, Money, ProductId, PurchaseId, RefundRequestId};
use crate::utils::{decode_record, encode_record};

pub(crate) type TxResult<T> = ConflictableTransactionResult<T, ShopError>;

/// Abort the running transaction with `err`, rolling back its writes.
pub(crate) fn reject<T>(err: ShopError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

fn lift<T>(res: Result<T, ShopError>) -> TxResult<T> {
    res.map_err(ConflictableTransactionError::Abort)
}

/// Durable shop state.
///
/// Writes to wallets and stock go through the settlement modules only; the
/// transaction boundary is not part of the public surface.
///
/// ```compile_fail
/// use shop_settlement::{Ledger, Settings};
///
/// let ledger = Ledger::temporary(&Settings::default()).unwrap();
/// ledger.atomically("top_up", |_tx| Ok(())).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Ledger {
    db: Db,
    customers: Tree,
    customer_names: Tree,
    products: Tree,
    product_names: Tree,
    purchases: Tree,
    refund_requests: Tree,
    refunds_by_purchase: Tree,
    conflict_retries: u32,
}

impl Ledger {
    pub fn new(db: Db, settings: &Settings) -> Result<Self, ShopError> {
        Ok(Self {
            customers: db.open_tree("customers")?,
            customer_names: db.open_tree("customer_names")?,
            products: db.open_tree("products")?,
            product_names: db.open_tree("product_names")?,
            purchases: db.open_tree("purchases")?,
            refund_requests: db.open_tree("refund_requests")?,
            refunds_by_purchase: db.open_tree("refunds_by_purchase")?,
            conflict_retries: settings.conflict_retries,
            db,
        })
    }

    pub fn open(path: impl AsRef<Path>, settings: &Settings) -> Result<Self, ShopError> {
        Self::new(sled::open(path)?, settings)
    }

    /// A throwaway ledger that is removed from disk when dropped.
    pub fn temporary(settings: &Settings) -> Result<Self, ShopError> {
        Self::new(sled::Config::new().temporary(true).open()?, settings)
    }

    pub fn flush(&self) -> Result<(), ShopError> {
        self.db.flush()?;
        Ok(())
    }

    /// Run `f` as one all-or-nothing transaction.
    ///
    /// `f` may be invoked more than once if sled detects a conflict, so it must
    /// not have side effects outside the transaction it is handed.
    pub(crate) fn atomically<A, F>(&self, operation: &'static str, f: F) -> Result<A, ShopError>
    where
        F: Fn(&LedgerTx<'_>) -> TxResult<A>,
    {
        let max_attempts = self.conflict_retries.saturating_add(1);
        let attempts = Cell::new(0u32);

        let trees = (
            &self.customers,
            &self.customer_names,
            &self.products,
            &self.product_names,
            &self.purchases,
            &self.refund_requests,
            &self.refunds_by_purchase,
        );

        let res = trees.transaction(|views| {
            let (
                customers,
                customer_names,
                products,
                product_names,
                purchases,
                refund_requests,
                refunds_by_purchase,
            ) = views;
            let attempt = attempts.get() + 1;
            attempts.set(attempt);
            if attempt > max_attempts {
                warn!(
                    operation,
                    attempts = max_attempts,
                    "giving up after repeated transaction conflicts"
                );
                return reject(ShopError::ConcurrentModification {
                    attempts: max_attempts,
                });
            }
            if attempt > 1 {
                debug!(operation, attempt, "re-running after transaction conflict");
            }

            let tx = LedgerTx {
                customers,
                customer_names,
                products,
                product_names,
                purchases,
                refund_requests,
                refunds_by_purchase,
            };
            f(&tx)
        });

        match res {
            Ok(value) => Ok(value),
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    pub fn customer(&self, id: &CustomerId) -> Result<Customer, ShopError> {
        read(&self.customers, id.key())?.ok_or_else(|| ShopError::not_found("customer", id))
    }

    pub fn product(&self, id: &ProductId) -> Result<Product, ShopError> {
        read(&self.products, id.key())?.ok_or_else(|| ShopError::not_found("product", id))
    }

    pub fn purchase(&self, id: &PurchaseId) -> Result<Purchase, ShopError> {
        read(&self.purchases, id.key())?.ok_or_else(|| ShopError::not_found("purchase", id))
    }

    pub fn refund_request(&self, id: &RefundRequestId) -> Result<RefundRequest, ShopError> {
        read(&self.refund_requests, id.key())?
            .ok_or_else(|| ShopError::not_found("refund request", id))
    }

    /// Whole catalogue, ordered by name.
    pub fn products(&self) -> Result<Vec<Product>, ShopError> {
        let mut products: Vec<Product> = scan(&self.products)?;
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    /// Every purchase, newest first.
    pub fn purchases(&self) -> Result<Vec<Purchase>, ShopError> {
        let mut purchases: Vec<Purchase> = scan(&self.purchases)?;
        purchases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(purchases)
    }

    pub fn purchases_of(&self, customer: &CustomerId) -> Result<Vec<Purchase>, ShopError> {
        let mut purchases = self.purchases()?;
        purchases.retain(|p| &p.customer == customer);
        Ok(purchases)
    }

    /// Pending refund requests, newest first.
    pub fn refund_requests(&self) -> Result<Vec<RefundRequest>, ShopError> {
        let mut requests: Vec<RefundRequest> = scan(&self.refund_requests)?;
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }

    pub fn refund_requests_of(
        &self,
        customer: &CustomerId,
    ) -> Result<Vec<RefundRequest>, ShopError> {
        let mut requests = self.refund_requests()?;
        requests.retain(|r| &r.customer == customer);
        Ok(requests)
    }

    /// Open an account with a starting wallet balance. Usernames are unique.
    pub fn register_customer(
        &self,
        username: &str,
        opening_wallet: Money,
    ) -> Result<Customer, ShopError> {
        if opening_wallet.is_negative() {
            return Err(ShopError::InvalidAmount(format!(
                "opening wallet {opening_wallet} is negative"
            )));
        }
        let customer = Customer {
            id: CustomerId::generate()?,
            username: username.to_owned(),
            wallet: opening_wallet,
        };

        self.atomically("register_customer", |tx| {
            tx.claim_customer_name(&customer.username, &customer.id)?;
            tx.put_customer(&customer)
        })?;

        info!(customer = %customer.id, username, wallet = %opening_wallet, "customer registered");
        Ok(customer)
    }

    pub fn add_product(
        &self,
        name: &str,
        price: Money,
        amount: u32,
        is_available: bool,
    ) -> Result<Product, ShopError> {
        check_price(price)?;
        let product = Product {
            id: ProductId::generate()?,
            name: name.to_owned(),
            price,
            amount,
            is_available,
        };

        self.atomically("add_product", |tx| {
            tx.claim_product_name(&product.name, &product.id)?;
            tx.put_product(&product)
        })?;

        info!(product = %product.id, name, price = %price, amount, "product added");
        Ok(product)
    }

    /// Re-price a product. Purchases already made keep the price they were sold at.
    pub fn set_product_price(&self, id: &ProductId, price: Money) -> Result<Product, ShopError> {
        check_price(price)?;

        let product = self.atomically("set_product_price", |tx| {
            let mut product = tx.product(id)?;
            product.price = price;
            tx.put_product(&product)?;
            Ok(product)
        })?;

        info!(product = %id, price = %price, "product re-priced");
        Ok(product)
    }

    pub fn set_product_availability(
        &self,
        id: &ProductId,
        is_available: bool,
    ) -> Result<Product, ShopError> {
        let product = self.atomically("set_product_availability", |tx| {
            let mut product = tx.product(id)?;
            product.is_available = is_available;
            tx.put_product(&product)?;
            Ok(product)
        })?;

        info!(product = %id, is_available, "product availability changed");
        Ok(product)
    }
}

fn check_price(price: Money) -> Result<(), ShopError> {
    if !price.is_positive() {
        return Err(ShopError::InvalidAmount(format!(
            "price {price} must be greater than zero"
        )));
    }
    Ok(())
}

fn read<T>(tree: &Tree, key: &[u8]) -> Result<Option<T>, ShopError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    match tree.get(key)? {
        Some(raw) => Ok(Some(decode_record(&raw)?)),
        None => Ok(None),
    }
}

fn scan<T>(tree: &Tree) -> Result<Vec<T>, ShopError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    tree.iter()
        .values()
        .map(|raw| decode_record(&raw?))
        .collect()
}

/// Handle to the trees inside one running transaction.
///
/// Reads see the transaction's own writes; nothing is visible to other
/// readers until the surrounding `Ledger::atomically` commits.
pub(crate) struct LedgerTx<'a> {
    customers: &'a TransactionalTree,
    customer_names: &'a TransactionalTree,
    products: &'a TransactionalTree,
    product_names: &'a TransactionalTree,
    purchases: &'a TransactionalTree,
    refund_requests: &'a TransactionalTree,
    refunds_by_purchase: &'a TransactionalTree,
}

impl LedgerTx<'_> {
    pub(crate) fn customer(&self, id: &CustomerId) -> TxResult<Customer> {
        match get(self.customers, id.key())? {
            Some(customer) => Ok(customer),
            None => reject(ShopError::not_found("customer", id)),
        }
    }

    pub(crate) fn put_customer(&self, customer: &Customer) -> TxResult<()> {
        put(self.customers, customer.id.key(), customer)
    }

    fn claim_customer_name(&self, username: &str, id: &CustomerId) -> TxResult<()> {
        claim(self.customer_names, "customer", username, id.key())
    }

    pub(crate) fn product(&self, id: &ProductId) -> TxResult<Product> {
        match get(self.products, id.key())? {
            Some(product) => Ok(product),
            None => reject(ShopError::not_found("product", id)),
        }
    }

    pub(crate) fn put_product(&self, product: &Product) -> TxResult<()> {
        put(self.products, product.id.key(), product)
    }

    fn claim_product_name(&self, name: &str, id: &ProductId) -> TxResult<()> {
        claim(self.product_names, "product", name, id.key())
    }

    pub(crate) fn purchase(&self, id: &PurchaseId) -> TxResult<Purchase> {
        match get(self.purchases, id.key())? {
            Some(purchase) => Ok(purchase),
            None => reject(ShopError::not_found("purchase", id)),
        }
    }

    pub(crate) fn insert_purchase(&self, purchase: &Purchase) -> TxResult<()> {
        put(self.purchases, purchase.id.key(), purchase)
    }

    pub(crate) fn remove_purchase(&self, id: &PurchaseId) -> TxResult<Purchase> {
        match self.purchases.remove(id.key())? {
            Some(raw) => lift(decode_record(&raw)),
            None => reject(ShopError::not_found("purchase", id)),
        }
    }

    /// The pending request filed against `purchase`, if any.
    pub(crate) fn refund_request_for(&self, purchase: &PurchaseId) -> TxResult<Option<RefundRequest>> {
        let Some(raw_id) = self.refunds_by_purchase.get(purchase.key())? else {
            return Ok(None);
        };
        let id = lift(
            std::str::from_utf8(&raw_id)
                .map(RefundRequestId::from)
                .map_err(|e| ShopError::Internal(e.to_string())),
        )?;

        match get(self.refund_requests, id.key())? {
            Some(request) => Ok(Some(request)),
            None => reject(ShopError::Internal(format!(
                "refund index for purchase {purchase} points at missing request {id}"
            ))),
        }
    }

    /// Fails with `DuplicateRequest` if the purchase already has a pending request.
    pub(crate) fn insert_refund_request(&self, request: &RefundRequest) -> TxResult<()> {
        if self
            .refunds_by_purchase
            .get(request.purchase.key())?
            .is_some()
        {
            return reject(ShopError::DuplicateRequest(request.purchase.to_string()));
        }
        self.refunds_by_purchase
            .insert(request.purchase.key(), request.id.key())?;
        put(self.refund_requests, request.id.key(), request)
    }

    pub(crate) fn remove_refund_request(&self, id: &RefundRequestId) -> TxResult<RefundRequest> {
        let request: RefundRequest = match self.refund_requests.remove(id.key())? {
            Some(raw) => lift(decode_record(&raw))?,
            None => return reject(ShopError::not_found("refund request", id)),
        };
        self.refunds_by_purchase.remove(request.purchase.key())?;
        Ok(request)
    }
}

/// Reserve `name` in a uniqueness index, pointing it at the record `owner`.
fn claim(
    index: &TransactionalTree,
    kind: &'static str,
    name: &str,
    owner: &[u8],
) -> TxResult<()> {
    if index.get(name.as_bytes())?.is_some() {
        return reject(ShopError::DuplicateName {
            kind,
            name: name.to_owned(),
        });
    }
    index.insert(name.as_bytes(), owner)?;
    Ok(())
}

fn get<T>(tree: &TransactionalTree, key: &[u8]) -> TxResult<Option<T>>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    match tree.get(key)? {
        Some(raw) => lift(decode_record(&raw)).map(Some),
        None => Ok(None),
    }
}

fn put<T: minicbor::Encode<()>>(tree: &TransactionalTree, key: &[u8], record: &T) -> TxResult<()> {
    let bytes = lift(encode_record(record))?;
    tree.insert(key, bytes)?;
    Ok(())
}
