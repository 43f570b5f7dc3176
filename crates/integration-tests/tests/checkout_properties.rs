//! Checkout guarantees against the in-memory store.
//!
//! Always runs; no external services needed.

use std::sync::Arc;

use cartwright_integration_tests::scenarios;
use cartwright_storefront::store::MemoryStore;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_unit_goes_to_one_buyer() {
    for _ in 0..25 {
        scenarios::last_unit_goes_to_one_buyer(Arc::new(MemoryStore::new())).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stock_is_never_oversold() {
    scenarios::stock_is_never_oversold(Arc::new(MemoryStore::new()), 5, 20).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_enough_stock_serves_everyone() {
    scenarios::stock_is_never_oversold(Arc::new(MemoryStore::new()), 30, 12).await;
}

#[tokio::test]
async fn test_failed_validation_has_no_effects() {
    scenarios::failed_validation_has_no_effects(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_order_keeps_price_at_purchase() {
    scenarios::order_keeps_price_at_purchase(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_checkout_clears_cart() {
    scenarios::checkout_clears_cart(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_orders_are_private() {
    scenarios::orders_are_private(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_empty_cart_is_rejected() {
    scenarios::empty_cart_is_rejected(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_double_submission_is_not_idempotent() {
    scenarios::double_submission_is_not_idempotent(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_abandoned_checkout_has_no_effects() {
    scenarios::abandoned_checkout_has_no_effects(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_order_total_is_bounded() {
    scenarios::order_total_is_bounded(&MemoryStore::new()).await;
}
