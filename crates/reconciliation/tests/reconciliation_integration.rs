//! Integration tests for delivery reconciliation.
//!
//! These tests run the full service against the in-memory store and check
//! both the returned outcome and the resulting store state.

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{Money, OrderId, ProductId, WarehouseId};
use entity_store::{EntityStore, InMemoryEntityStore, Order, Product, Warehouse};
use reconciliation::{DeliveryClaim, ReconciliationError, ReconciliationService};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

/// Product 1 at $10.00, warehouse 1, outstanding order 5 for 3 units created at T0.
async fn scenario_store() -> InMemoryEntityStore {
    let store = InMemoryEntityStore::new();
    store
        .insert_product(Product::new(
            ProductId::new(1),
            "Widget",
            Money::from_dollars(10),
        ))
        .await;
    store
        .insert_warehouse(Warehouse::new(WarehouseId::new(1), "Main"))
        .await;
    store
        .insert_order(Order::new(OrderId::new(5), ProductId::new(1), 3, t0()))
        .await;
    store
}

fn create_service(store: &InMemoryEntityStore) -> ReconciliationService<InMemoryEntityStore> {
    ReconciliationService::new(store.clone())
}

fn matching_claim() -> DeliveryClaim {
    DeliveryClaim::new(1, 1, 3, t0() + Duration::hours(1))
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn a_matching_delivery_fulfills_the_order() {
        let store = scenario_store().await;
        let service = create_service(&store);

        let record_id = service.reconcile(matching_claim()).await.unwrap();

        let order = store.get_order(OrderId::new(5)).await.unwrap().unwrap();
        assert!(order.fulfilled_at.is_some());

        let records = store
            .inventory_records_for_order(OrderId::new(5))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, record_id);
        assert_eq!(records[0].total_value, Money::from_dollars(30));
        assert_eq!(records[0].quantity, 3);
        assert_eq!(records[0].delivered_at, t0() + Duration::hours(1));
    }

    #[tokio::test]
    async fn b_repeated_delivery_is_already_fulfilled() {
        let store = scenario_store().await;
        let service = create_service(&store);

        service.reconcile(matching_claim()).await.unwrap();
        let fulfilled_at = store
            .get_order(OrderId::new(5))
            .await
            .unwrap()
            .unwrap()
            .fulfilled_at;

        let result = service.reconcile(matching_claim()).await;

        assert!(matches!(
            result,
            Err(ReconciliationError::OrderAlreadyFulfilled(id)) if id == OrderId::new(5)
        ));
        assert_eq!(store.inventory_record_count().await, 1);
        let order = store.get_order(OrderId::new(5)).await.unwrap().unwrap();
        assert_eq!(order.fulfilled_at, fulfilled_at);
    }

    #[tokio::test]
    async fn c_unknown_product_is_not_found() {
        let store = scenario_store().await;
        let service = create_service(&store);

        let result = service
            .reconcile(DeliveryClaim::new(99, 1, 3, t0() + Duration::hours(1)))
            .await;

        assert!(matches!(
            result,
            Err(ReconciliationError::ProductNotFound(id)) if id == ProductId::new(99)
        ));
        assert_eq!(store.inventory_record_count().await, 0);
        assert!(store.orders().await.iter().all(Order::is_outstanding));
    }

    #[tokio::test]
    async fn d_quantity_mismatch_has_no_matching_order() {
        let store = scenario_store().await;
        let service = create_service(&store);

        let result = service
            .reconcile(DeliveryClaim::new(1, 1, 5, t0() + Duration::hours(1)))
            .await;

        assert!(matches!(result, Err(ReconciliationError::NoMatchingOrder)));
        assert_eq!(store.inventory_record_count().await, 0);
    }

    #[tokio::test]
    async fn e_tied_orders_resolve_to_lowest_id_every_time() {
        for _ in 0..10 {
            let store = scenario_store().await;
            store
                .insert_order(Order::new(OrderId::new(12), ProductId::new(1), 4, t0()))
                .await;
            store
                .insert_order(Order::new(OrderId::new(11), ProductId::new(1), 4, t0()))
                .await;
            let service = create_service(&store);

            let record_id = service
                .reconcile(DeliveryClaim::new(1, 1, 4, t0() + Duration::hours(1)))
                .await
                .unwrap();

            let record = store.get_inventory_record(record_id).await.unwrap().unwrap();
            assert_eq!(record.order_id, OrderId::new(11));
            let later = store.get_order(OrderId::new(12)).await.unwrap().unwrap();
            assert!(later.is_outstanding());
        }
    }
}

mod matching {
    use super::*;

    #[tokio::test]
    async fn earliest_order_is_fulfilled_first() {
        let store = scenario_store().await;
        store
            .insert_order(Order::new(
                OrderId::new(2),
                ProductId::new(1),
                3,
                t0() + Duration::minutes(10),
            ))
            .await;
        let service = create_service(&store);

        let first = service.reconcile(matching_claim()).await.unwrap();
        let second = service.reconcile(matching_claim()).await.unwrap();

        let first = store.get_inventory_record(first).await.unwrap().unwrap();
        let second = store.get_inventory_record(second).await.unwrap().unwrap();
        assert_eq!(first.order_id, OrderId::new(5));
        assert_eq!(second.order_id, OrderId::new(2));

        let third = service.reconcile(matching_claim()).await;
        assert!(matches!(
            third,
            Err(ReconciliationError::OrderAlreadyFulfilled(id)) if id == OrderId::new(5)
        ));
    }

    #[tokio::test]
    async fn order_created_at_delivery_instant_does_not_match() {
        let store = scenario_store().await;
        let service = create_service(&store);

        let result = service.reconcile(DeliveryClaim::new(1, 1, 3, t0())).await;

        assert!(matches!(result, Err(ReconciliationError::NoMatchingOrder)));
    }

    #[tokio::test]
    async fn value_uses_price_at_delivery_time() {
        let store = scenario_store().await;
        store
            .insert_product(Product::new(
                ProductId::new(1),
                "Widget",
                Money::from_cents(1299),
            ))
            .await;
        let service = create_service(&store);

        let record_id = service.reconcile(matching_claim()).await.unwrap();

        let record = store.get_inventory_record(record_id).await.unwrap().unwrap();
        assert_eq!(record.total_value, Money::from_cents(3897));
    }
}

mod failures_leave_store_unchanged {
    use super::*;

    async fn assert_unchanged(store: &InMemoryEntityStore) {
        assert_eq!(store.inventory_record_count().await, 0);
        let order = store.get_order(OrderId::new(5)).await.unwrap().unwrap();
        assert!(order.is_outstanding());
    }

    #[tokio::test]
    async fn unknown_warehouse() {
        let store = scenario_store().await;
        let service = create_service(&store);

        let result = service
            .reconcile(DeliveryClaim::new(1, 7, 3, t0() + Duration::hours(1)))
            .await;

        assert!(matches!(
            result,
            Err(ReconciliationError::WarehouseNotFound(id)) if id == WarehouseId::new(7)
        ));
        assert_unchanged(&store).await;
    }

    #[tokio::test]
    async fn invalid_claim() {
        let store = scenario_store().await;
        let service = create_service(&store);

        let result = service
            .reconcile(DeliveryClaim::new(1, 1, -3, t0() + Duration::hours(1)))
            .await;

        assert!(matches!(result, Err(ReconciliationError::InvalidClaim(_))));
        assert_unchanged(&store).await;
    }

    #[tokio::test]
    async fn store_fault_is_retryable_and_recoverable() {
        let store = scenario_store().await;
        let service = create_service(&store);
        store.set_fail_on_insert(true);

        let err = service.reconcile(matching_claim()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_unchanged(&store).await;

        store.set_fail_on_insert(false);
        assert!(service.reconcile(matching_claim()).await.is_ok());
    }
}
