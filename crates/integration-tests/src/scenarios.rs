//! Checkout scenarios shared by the in-memory and PostgreSQL suites.
//!
//! Each function sets up its own users and products, so scenarios can run
//! against a shared database without interfering.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rust_decimal::Decimal;

use cartwright_core::{OrderId, Price, Quantity};
use cartwright_storefront::models::{NewOrder, ProductUpdate};
use cartwright_storefront::services::checkout::{CheckoutEngine, CheckoutError};
use cartwright_storefront::services::orders::{OrderError, OrderService};
use cartwright_storefront::store::Storefront;

use crate::{add_to_cart, admin, customer, price, product, stock_of};

/// Stock 1, two customers each check out 1 unit at the same time.
pub async fn last_unit_goes_to_one_buyer<S: Storefront + 'static>(store: Arc<S>) {
    let owner = admin(store.as_ref()).await;
    let item = product(store.as_ref(), owner.user_id, "Last Lamp", "80.00", 1).await;
    let first = customer(store.as_ref()).await;
    let second = customer(store.as_ref()).await;
    add_to_cart(store.as_ref(), first.user_id, item.id, 1).await;
    add_to_cart(store.as_ref(), second.user_id, item.id, 1).await;

    let handles = [first, second].map(|buyer| {
        let store = Arc::clone(&store);
        tokio::spawn(async move { CheckoutEngine::new(store.as_ref()).checkout(&buyer).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("checkout task panicked"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one buyer gets the last unit");
    assert!(results.iter().any(|r| matches!(
        r,
        Err(CheckoutError::InsufficientStock { available: 0, .. })
    )));
    assert_eq!(stock_of(store.as_ref(), item.id).await, 0);
}

/// `buyers` customers race for `stock` units, one each.
pub async fn stock_is_never_oversold<S: Storefront + 'static>(
    store: Arc<S>,
    stock: i32,
    buyers: usize,
) {
    let owner = admin(store.as_ref()).await;
    let item = product(store.as_ref(), owner.user_id, "Limited Print", "25.00", stock).await;

    let mut identities = Vec::with_capacity(buyers);
    for _ in 0..buyers {
        let buyer = customer(store.as_ref()).await;
        add_to_cart(store.as_ref(), buyer.user_id, item.id, 1).await;
        identities.push(buyer);
    }

    let handles = identities.into_iter().map(|buyer| {
        let store = Arc::clone(&store);
        tokio::spawn(async move { CheckoutEngine::new(store.as_ref()).checkout(&buyer).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("checkout task panicked"))
        .collect();

    let sold = results.iter().filter(|r| r.is_ok()).count();
    let expected = usize::try_from(stock).expect("non-negative stock").min(buyers);
    assert_eq!(sold, expected);
    for rejected in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(rejected, CheckoutError::InsufficientStock { .. }),
            "unexpected rejection: {rejected}"
        );
    }

    let remaining = stock - i32::try_from(sold).expect("small count");
    assert_eq!(stock_of(store.as_ref(), item.id).await, remaining);
}

/// A rejected checkout changes nothing: cart, stock, and orders stay put.
pub async fn failed_validation_has_no_effects<S: Storefront + ?Sized>(store: &S) {
    let owner = admin(store).await;
    let plenty = product(store, owner.user_id, "Tea Towel", "6.00", 50).await;
    let scarce = product(store, owner.user_id, "Copper Kettle", "70.00", 1).await;
    let buyer = customer(store).await;
    add_to_cart(store, buyer.user_id, plenty.id, 3).await;
    add_to_cart(store, buyer.user_id, scarce.id, 2).await;

    let result = CheckoutEngine::new(store).checkout(&buyer).await;
    match result {
        Err(CheckoutError::InsufficientStock {
            product_id,
            requested,
            available,
            ..
        }) => {
            assert_eq!(product_id, scarce.id);
            assert_eq!(requested, 2);
            assert_eq!(available, 1);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    assert_eq!(stock_of(store, plenty.id).await, 50);
    assert_eq!(stock_of(store, scarce.id).await, 1);
    assert_eq!(store.list_lines(buyer.user_id).await.expect("cart").len(), 2);
    assert!(store.list_orders(buyer.user_id).await.expect("orders").is_empty());
}

/// The order keeps the price paid even after the catalog price changes.
pub async fn order_keeps_price_at_purchase<S: Storefront + ?Sized>(store: &S) {
    let owner = admin(store).await;
    let item = product(store, owner.user_id, "Linen Apron", "10.00", 5).await;
    let buyer = customer(store).await;
    add_to_cart(store, buyer.user_id, item.id, 3).await;

    let order = CheckoutEngine::new(store)
        .checkout(&buyer)
        .await
        .expect("checkout succeeds");
    assert_eq!(order.total_amount, price("30.00").amount());

    store
        .update_product(
            item.id,
            &ProductUpdate {
                price: Some(price("20.00")),
                ..ProductUpdate::default()
            },
        )
        .await
        .expect("update price")
        .expect("product exists");

    let stored = OrderService::new(store)
        .detail(buyer.user_id, order.id)
        .await
        .expect("order detail");
    assert_eq!(stored.total_amount, price("30.00").amount());
    assert_eq!(stored.lines.len(), 1);
    assert_eq!(stored.lines[0].price_at_purchase, price("10.00"));
}

/// Success empties the cart, decrements stock, and records the order.
pub async fn checkout_clears_cart<S: Storefront + ?Sized>(store: &S) {
    let owner = admin(store).await;
    let mug = product(store, owner.user_id, "Stoneware Mug", "14.00", 10).await;
    let bowl = product(store, owner.user_id, "Stoneware Bowl", "18.50", 4).await;
    let buyer = customer(store).await;
    add_to_cart(store, buyer.user_id, bowl.id, 1).await;
    add_to_cart(store, buyer.user_id, mug.id, 4).await;

    let order = CheckoutEngine::new(store)
        .checkout(&buyer)
        .await
        .expect("checkout succeeds");

    assert_eq!(order.lines.len(), 2);
    assert_eq!(order.total_amount, price("74.50").amount());
    assert!(order.lines.windows(2).all(|w| w[0].product_id < w[1].product_id));
    assert!(store.list_lines(buyer.user_id).await.expect("cart").is_empty());
    assert_eq!(stock_of(store, mug.id).await, 6);
    assert_eq!(stock_of(store, bowl.id).await, 3);

    let history = store.list_orders(buyer.user_id).await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, order.id);
    assert_eq!(history[0].item_count, 2);
}

/// Another user's order looks exactly like a missing one.
pub async fn orders_are_private<S: Storefront + ?Sized>(store: &S) {
    let owner = admin(store).await;
    let item = product(store, owner.user_id, "Oak Board", "32.00", 3).await;
    let alice = customer(store).await;
    let bob = customer(store).await;
    add_to_cart(store, alice.user_id, item.id, 1).await;
    let order = CheckoutEngine::new(store)
        .checkout(&alice)
        .await
        .expect("checkout succeeds");

    let orders = OrderService::new(store);
    assert!(orders.detail(alice.user_id, order.id).await.is_ok());

    let foreign = orders.detail(bob.user_id, order.id).await;
    let missing = orders.detail(bob.user_id, OrderId::new(i32::MAX)).await;
    assert!(matches!(foreign, Err(OrderError::NotFound)));
    assert!(matches!(missing, Err(OrderError::NotFound)));
    assert!(orders.history(bob.user_id).await.expect("history").is_empty());
}

/// An empty cart is refused and produces no order.
pub async fn empty_cart_is_rejected<S: Storefront + ?Sized>(store: &S) {
    let buyer = customer(store).await;
    let result = CheckoutEngine::new(store).checkout(&buyer).await;
    assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    assert!(store.list_orders(buyer.user_id).await.expect("orders").is_empty());
}

/// Submitting twice creates one order; the second call finds an empty cart.
pub async fn double_submission_is_not_idempotent<S: Storefront + ?Sized>(store: &S) {
    let owner = admin(store).await;
    let item = product(store, owner.user_id, "Wool Throw", "95.00", 4).await;
    let buyer = customer(store).await;
    add_to_cart(store, buyer.user_id, item.id, 1).await;

    let engine = CheckoutEngine::new(store);
    engine.checkout(&buyer).await.expect("first checkout");
    assert!(matches!(
        engine.checkout(&buyer).await,
        Err(CheckoutError::EmptyCart)
    ));

    add_to_cart(store, buyer.user_id, item.id, 1).await;
    engine.checkout(&buyer).await.expect("refilled cart checks out");
    assert_eq!(store.list_orders(buyer.user_id).await.expect("orders").len(), 2);
    assert_eq!(stock_of(store, item.id).await, 2);
}

/// A checkout dropped while waiting on a locked product changes nothing.
pub async fn abandoned_checkout_has_no_effects<S: Storefront + ?Sized>(store: &S) {
    let owner = admin(store).await;
    let item = product(store, owner.user_id, "Cast Iron Pan", "45.00", 3).await;
    let buyer = customer(store).await;
    let other = customer(store).await;
    add_to_cart(store, buyer.user_id, item.id, 2).await;

    // Another checkout holds the product, so the buyer's stalls on its lock.
    let mut blocker = store.begin_checkout(other.user_id).await.expect("begin");
    blocker.lock_product(item.id).await.expect("lock product");

    let attempt = tokio::time::timeout(
        Duration::from_millis(100),
        CheckoutEngine::new(store).checkout(&buyer),
    )
    .await;
    assert!(attempt.is_err(), "checkout should still be waiting");
    blocker.rollback().await.expect("rollback");

    assert_eq!(stock_of(store, item.id).await, 3);
    assert!(store.list_orders(buyer.user_id).await.expect("orders").is_empty());
    assert_eq!(store.list_lines(buyer.user_id).await.expect("cart").len(), 1);

    CheckoutEngine::new(store)
        .checkout(&buyer)
        .await
        .expect("retry succeeds");
    assert_eq!(stock_of(store, item.id).await, 1);
}

/// Totals past what an order can record are refused before any write, and
/// the largest price and total survive storage exactly.
pub async fn order_total_is_bounded<S: Storefront + ?Sized>(store: &S) {
    let owner = admin(store).await;
    let item = product(store, owner.user_id, "Grand Piano", "9999999999.99", 200).await;
    assert_eq!(item.price.amount(), Price::MAX);
    let buyer = customer(store).await;
    add_to_cart(store, buyer.user_id, item.id, 150).await;

    let result = CheckoutEngine::new(store).checkout(&buyer).await;
    assert!(matches!(result, Err(CheckoutError::TotalTooLarge)));
    assert_eq!(stock_of(store, item.id).await, 200);
    assert!(store.list_orders(buyer.user_id).await.expect("orders").is_empty());

    store
        .set_line_quantity(buyer.user_id, item.id, Quantity::new(100).expect("quantity"))
        .await
        .expect("set quantity")
        .expect("line exists");
    let order = CheckoutEngine::new(store)
        .checkout(&buyer)
        .await
        .expect("checkout at the limit");
    assert_eq!(order.total_amount, Decimal::new(99_999_999_999_900, 2));
    assert!(order.total_amount <= NewOrder::MAX_TOTAL);

    let stored = OrderService::new(store)
        .detail(buyer.user_id, order.id)
        .await
        .expect("order detail");
    assert_eq!(stored.total_amount, order.total_amount);
    assert_eq!(stored.lines[0].price_at_purchase.amount(), Price::MAX);
}
