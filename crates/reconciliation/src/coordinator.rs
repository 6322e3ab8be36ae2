//! Fulfillment transaction coordinator.

use chrono::Utc;
use common::InventoryRecordId;
use entity_store::{EntityStore, NewInventoryRecord, StoreError, StoreTransaction};

use crate::claim::ValidClaim;
use crate::error::ReconciliationError;
use crate::matcher::{MatchOutcome, OrderMatcher};

/// Runs one reconciliation as a single store transaction.
///
/// The coordinator:
/// 1. Resolves the product and the warehouse
/// 2. Matches the delivery to an outstanding order
/// 3. Re-checks that the order has no inventory record yet
/// 4. Marks the order fulfilled and inserts the inventory record
/// 5. Commits, or rolls back everything on any failure
pub struct FulfillmentCoordinator<S: EntityStore> {
    store: S,
}

impl<S: EntityStore> FulfillmentCoordinator<S> {
    /// Creates a new coordinator over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fulfills the order matched by `claim` and records the delivery.
    ///
    /// Returns the new inventory record's ID. On error no write of this
    /// call is visible.
    #[tracing::instrument(
        skip(self, claim),
        fields(
            product_id = %claim.product_id(),
            warehouse_id = %claim.warehouse_id(),
            quantity = claim.quantity(),
        )
    )]
    pub async fn fulfill(
        &self,
        claim: &ValidClaim,
    ) -> Result<InventoryRecordId, ReconciliationError> {
        let mut tx = self.store.begin().await?;

        match Self::fulfill_in(&mut tx, claim).await {
            Ok(record_id) => {
                tx.commit().await?;
                Ok(record_id)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn fulfill_in(
        tx: &mut S::Transaction,
        claim: &ValidClaim,
    ) -> Result<InventoryRecordId, ReconciliationError> {
        let product = tx
            .get_product(claim.product_id())
            .await?
            .ok_or(ReconciliationError::ProductNotFound(claim.product_id()))?;

        let warehouse = tx
            .get_warehouse(claim.warehouse_id())
            .await?
            .ok_or(ReconciliationError::WarehouseNotFound(claim.warehouse_id()))?;

        let order = match OrderMatcher::find_outstanding_order(
            tx,
            product.id,
            claim.quantity(),
            claim.delivered_at(),
        )
        .await?
        {
            MatchOutcome::Outstanding(order) => order,
            MatchOutcome::AlreadyFulfilled(order_id) => {
                return Err(ReconciliationError::OrderAlreadyFulfilled(order_id));
            }
            MatchOutcome::NoMatch => return Err(ReconciliationError::NoMatchingOrder),
        };

        // The match may be stale: another writer can have recorded the
        // delivery without stamping the order.
        if !order.is_outstanding() || tx.has_inventory_record_for_order(order.id).await? {
            return Err(ReconciliationError::OrderAlreadyFulfilled(order.id));
        }

        tx.mark_order_fulfilled(order.id, Utc::now()).await?;

        let total_value = product
            .unit_price
            .checked_multiply(claim.quantity())
            .ok_or_else(|| {
                StoreError::Constraint(format!(
                    "total value of {} x {} overflows",
                    product.unit_price,
                    claim.quantity()
                ))
            })?;

        let record_id = tx
            .insert_inventory_record(NewInventoryRecord {
                warehouse_id: warehouse.id,
                product_id: product.id,
                order_id: order.id,
                quantity: claim.quantity(),
                total_value,
                delivered_at: claim.delivered_at(),
            })
            .await?;

        tracing::debug!(order_id = %order.id, %record_id, %total_value, "order fulfilled");
        Ok(record_id)
    }
}
