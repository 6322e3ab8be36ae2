//! Public entry point for reconciling deliveries.

use common::InventoryRecordId;
use entity_store::EntityStore;

use crate::claim::DeliveryClaim;
use crate::coordinator::FulfillmentCoordinator;
use crate::error::ReconciliationError;

/// Service for reconciling delivery claims against purchase orders.
///
/// Validates each claim before any store access and delegates the
/// transactional work to a [`FulfillmentCoordinator`]. It never retries;
/// use [`ReconciliationError::is_retryable`] to decide at the call site.
pub struct ReconciliationService<S: EntityStore> {
    coordinator: FulfillmentCoordinator<S>,
}

impl<S: EntityStore> ReconciliationService<S> {
    /// Creates a new reconciliation service with the given store.
    pub fn new(store: S) -> Self {
        Self {
            coordinator: FulfillmentCoordinator::new(store),
        }
    }

    /// Returns a reference to the underlying coordinator.
    pub fn coordinator(&self) -> &FulfillmentCoordinator<S> {
        &self.coordinator
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        self.coordinator.store()
    }

    /// Reconciles one delivery and returns the created inventory record's ID.
    #[tracing::instrument(skip(self), fields(attempt_id = %uuid::Uuid::new_v4()))]
    pub async fn reconcile(
        &self,
        claim: DeliveryClaim,
    ) -> Result<InventoryRecordId, ReconciliationError> {
        metrics::counter!("reconciliations_total").increment(1);
        let started = std::time::Instant::now();

        let result = match claim.validate() {
            Ok(valid) => self.coordinator.fulfill(&valid).await,
            Err(err) => Err(err),
        };

        metrics::histogram!("reconciliation_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(record_id) => {
                tracing::info!(inventory_record_id = %record_id, "delivery reconciled");
            }
            Err(err) => {
                metrics::counter!("reconciliation_failures_total", "kind" => err.kind())
                    .increment(1);
                if err.is_retryable() {
                    tracing::warn!(kind = err.kind(), error = %err, "reconciliation failed");
                } else {
                    tracing::info!(kind = err.kind(), error = %err, "delivery rejected");
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use common::{Money, OrderId, ProductId, WarehouseId};
    use entity_store::{InMemoryEntityStore, Order, Product, Warehouse};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    async fn create_service() -> ReconciliationService<InMemoryEntityStore> {
        let store = InMemoryEntityStore::new();
        store
            .insert_product(Product::new(ProductId::new(1), "Widget", Money::from_dollars(10)))
            .await;
        store
            .insert_warehouse(Warehouse::new(WarehouseId::new(1), "Main"))
            .await;
        store
            .insert_order(Order::new(OrderId::new(5), ProductId::new(1), 3, t0()))
            .await;
        ReconciliationService::new(store)
    }

    #[tokio::test]
    async fn test_reconcile_returns_record_id() {
        let service = create_service().await;

        let record_id = service
            .reconcile(DeliveryClaim::new(1, 1, 3, t0() + Duration::hours(1)))
            .await
            .unwrap();

        let record = service
            .store()
            .get_inventory_record(record_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.order_id, OrderId::new(5));
    }

    #[tokio::test]
    async fn test_invalid_claim_is_rejected_before_store_access() {
        let service = create_service().await;
        // A held transaction would block any store access by the service.
        let _held = service.store().begin().await.unwrap();

        let result = service
            .reconcile(DeliveryClaim::new(0, 1, 3, t0() + Duration::hours(1)))
            .await;

        assert!(matches!(result, Err(ReconciliationError::InvalidClaim(_))));
    }

    #[tokio::test]
    async fn test_duplicate_claim_reports_already_fulfilled() {
        let service = create_service().await;
        let claim = DeliveryClaim::new(1, 1, 3, t0() + Duration::hours(1));

        service.reconcile(claim).await.unwrap();
        let result = service.reconcile(claim).await;

        assert!(matches!(
            result,
            Err(ReconciliationError::OrderAlreadyFulfilled(id)) if id == OrderId::new(5)
        ));
    }
}
