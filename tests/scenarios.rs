use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use shop_settlement::{
    Caller, Ledger, Money, RefundOutcome, Settings, ShopError, ShopService, TimeStamp, purchase,
    refund_request,
};
use tempfile::tempdir; // Use for test db cleanup.
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn money(s: &str) -> Money {
    s.parse().unwrap()
}

#[test]
fn purchase_then_approved_refund_restores_wallet_and_stock() -> anyhow::Result<()> {
    init_tracing();
    // Sled locks its files, so every test opens its own database on temp.
    let temp_dir = tempdir()?;
    let settings = Settings::default();
    let ledger = Ledger::open(temp_dir.path().join("purchase_then_refund.db"), &settings)?;
    let service = ShopService::new(Arc::new(ledger), &settings);

    let customer = service.register_customer("alice", money("100.00"))?;
    let product = service.add_product(&Caller::Admin, "kettle", money("30.00"), 5, true)?;
    let alice = Caller::Customer(customer.id.clone());

    let bought = service
        .purchase(&alice, &product.id, 3)
        .context("Purchase failed: ")?;

    assert_eq!(bought.price_at_time_of_purchase, money("30.00"));
    assert_eq!(service.ledger().customer(&customer.id)?.wallet, money("10.00"));
    assert_eq!(service.ledger().product(&product.id)?.amount, 2);

    // with the purchase settled the customer asks for their money back
    let outcome = service
        .request_refund(&alice, &bought.id)
        .context("Refund request failed: ")?;
    let RefundOutcome::Filed(request) = outcome else {
        anyhow::bail!("expected a freshly filed request, got {outcome:?}");
    };

    let pending = service.list_pending_refund_requests(&Caller::Admin)?;
    assert_eq!(pending, vec![request.clone()]);

    let refunded = service
        .approve_refund(&Caller::Admin, &request.id)
        .context("Refund approval failed: ")?;
    assert_eq!(refunded.id, bought.id);

    assert_eq!(service.ledger().customer(&customer.id)?.wallet, money("100.00"));
    assert_eq!(service.ledger().product(&product.id)?.amount, 5);
    assert!(matches!(
        service.ledger().purchase(&bought.id),
        Err(ShopError::NotFound { .. })
    ));
    assert!(service.list_pending_refund_requests(&Caller::Admin)?.is_empty());

    service.ledger().flush()?;
    Ok(())
}

#[test]
fn insufficient_funds_changes_nothing() -> anyhow::Result<()> {
    init_tracing();
    let temp_dir = tempdir()?;
    let settings = Settings::default();
    let ledger = Ledger::open(temp_dir.path().join("insufficient_funds.db"), &settings)?;
    let service = ShopService::new(Arc::new(ledger), &settings);

    let customer = service.register_customer("bob", money("10.00"))?;
    let product = service.add_product(&Caller::Admin, "lamp", money("30.00"), 5, true)?;
    let bob = Caller::Customer(customer.id.clone());

    let res = service.purchase(&bob, &product.id, 1);

    match res {
        Err(ShopError::InsufficientFunds { total, wallet }) => {
            assert_eq!(total, money("30.00"));
            assert_eq!(wallet, money("10.00"));
        }
        other => anyhow::bail!("expected InsufficientFunds, got {other:?}"),
    }

    assert_eq!(service.ledger().customer(&customer.id)?.wallet, money("10.00"));
    assert_eq!(service.ledger().product(&product.id)?.amount, 5);
    assert!(service.purchases_of(&bob, &customer.id)?.is_empty());

    Ok(())
}

#[test]
fn refund_uses_price_locked_at_sale() -> anyhow::Result<()> {
    init_tracing();
    let temp_dir = tempdir()?;
    let settings = Settings::default();
    let ledger = Ledger::open(temp_dir.path().join("price_lock.db"), &settings)?;
    let service = ShopService::new(Arc::new(ledger), &settings);

    let customer = service.register_customer("carol", money("100.00"))?;
    let product = service.add_product(&Caller::Admin, "chair", money("25.00"), 10, true)?;
    let carol = Caller::Customer(customer.id.clone());

    let bought = service.purchase(&carol, &product.id, 2)?;
    assert_eq!(service.ledger().customer(&customer.id)?.wallet, money("50.00"));

    // the shop doubles the price after the sale
    service.set_product_price(&Caller::Admin, &product.id, money("50.00"))?;

    let request = service.request_refund(&carol, &bought.id)?.request().clone();
    service.approve_refund(&Caller::Admin, &request.id)?;

    assert_eq!(service.ledger().customer(&customer.id)?.wallet, money("100.00"));
    assert_eq!(service.ledger().product(&product.id)?.amount, 10);
    assert_eq!(service.ledger().product(&product.id)?.price, money("50.00"));

    Ok(())
}

#[test]
fn filing_twice_yields_one_request() -> anyhow::Result<()> {
    init_tracing();
    let temp_dir = tempdir()?;
    let settings = Settings::default();
    let ledger = Ledger::open(temp_dir.path().join("idempotent_refund.db"), &settings)?;
    let service = ShopService::new(Arc::new(ledger), &settings);

    let customer = service.register_customer("dave", money("40.00"))?;
    let product = service.add_product(&Caller::Admin, "mug", money("4.00"), 10, true)?;
    let dave = Caller::Customer(customer.id.clone());
    let bought = service.purchase(&dave, &product.id, 1)?;

    let first = service.request_refund(&dave, &bought.id)?;
    let second = service.request_refund(&dave, &bought.id)?;

    assert!(matches!(first, RefundOutcome::Filed(_)));
    assert_eq!(second, RefundOutcome::AlreadyPending(first.request().clone()));
    assert_eq!(service.list_pending_refund_requests(&Caller::Admin)?.len(), 1);
    assert_eq!(service.my_refund_requests(&dave)?, vec![first.request().clone()]);
    assert_eq!(service.ledger().refund_request(&first.request().id)?, *first.request());

    Ok(())
}

#[test]
fn rejected_refund_keeps_the_purchase() -> anyhow::Result<()> {
    init_tracing();
    let temp_dir = tempdir()?;
    let settings = Settings::default();
    let ledger = Ledger::open(temp_dir.path().join("rejected_refund.db"), &settings)?;
    let service = ShopService::new(Arc::new(ledger), &settings);

    let customer = service.register_customer("erin", money("40.00"))?;
    let product = service.add_product(&Caller::Admin, "pen", money("2.50"), 10, true)?;
    let erin = Caller::Customer(customer.id.clone());
    let bought = service.purchase(&erin, &product.id, 4)?;

    let request = service.request_refund(&erin, &bought.id)?.request().clone();
    service.reject_refund(&Caller::Admin, &request.id)?;

    assert_eq!(service.ledger().purchase(&bought.id)?, bought);
    assert_eq!(service.ledger().customer(&customer.id)?.wallet, money("30.00"));
    assert_eq!(service.ledger().product(&product.id)?.amount, 6);
    assert!(service.list_pending_refund_requests(&Caller::Admin)?.is_empty());

    // a rejected purchase can be asked about again while the window is open
    let again = service.request_refund(&erin, &bought.id)?;
    assert!(matches!(again, RefundOutcome::Filed(_)));

    Ok(())
}

#[test]
fn refund_window_boundary() -> anyhow::Result<()> {
    init_tracing();
    let temp_dir = tempdir()?;
    let settings = Settings::default();
    let ledger = Ledger::open(temp_dir.path().join("window_boundary.db"), &settings)?;
    let window = settings.refund_window();

    let customer = ledger.register_customer("frank", money("100.00"))?;
    let product = ledger.add_product("clock", money("10.00"), 5, true)?;

    // bought one minute before midnight at the end of a year
    let bought_at = TimeStamp::new_with(2023, 12, 31, 23, 59, 0).context("bad date")?;
    let late = purchase::settle(&ledger, &customer.id, &product.id, 1, bought_at)?;
    let early = purchase::settle(&ledger, &customer.id, &product.id, 1, bought_at)?;

    let deadline = bought_at
        .checked_add(Duration::minutes(i64::from(settings.refund_period_minutes)))
        .context("deadline out of range")?;
    let second_before = deadline
        .checked_add(Duration::seconds(-1))
        .context("deadline out of range")?;

    let res = refund_request::request_refund(&ledger, &window, &customer.id, &late.id, deadline);
    assert!(matches!(res, Err(ShopError::WindowExpired(_))));
    assert!(ledger.refund_requests()?.is_empty());

    let res = refund_request::request_refund(&ledger, &window, &customer.id, &early.id, second_before)?;
    assert!(matches!(res, RefundOutcome::Filed(_)));
    assert_eq!(ledger.refund_requests()?.len(), 1);

    Ok(())
}
