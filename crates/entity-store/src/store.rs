use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    InventoryRecord, InventoryRecordId, NewInventoryRecord, Order, OrderId, OrderMatch, Product,
    ProductId, Result, Warehouse, WarehouseId,
};

/// Durable storage for products, warehouses, orders and inventory records.
///
/// All implementations must be thread-safe (Send + Sync). Reconciliation
/// work happens inside a [`StoreTransaction`] obtained from [`begin`];
/// the remaining methods are committed-state reads outside any transaction.
///
/// [`begin`]: EntityStore::begin
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// The transaction type handed out by [`EntityStore::begin`].
    type Transaction: StoreTransaction;

    /// Opens a transaction.
    ///
    /// Two open transactions that fulfill the same order must not both
    /// commit.
    async fn begin(&self) -> Result<Self::Transaction>;

    /// Loads an order by ID.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Loads an inventory record by ID.
    async fn get_inventory_record(&self, id: InventoryRecordId) -> Result<Option<InventoryRecord>>;

    /// Returns every inventory record that references `order_id`.
    ///
    /// Never more than one for a consistent store.
    async fn inventory_records_for_order(&self, order_id: OrderId)
    -> Result<Vec<InventoryRecord>>;
}

/// A single unit of work against the entity store.
///
/// Writes become visible to other transactions only after [`commit`].
/// Dropping the transaction without committing discards every write,
/// which is how cancellation of the surrounding future rolls back.
///
/// [`commit`]: StoreTransaction::commit
#[async_trait]
pub trait StoreTransaction: Send {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    async fn get_warehouse(&mut self, id: WarehouseId) -> Result<Option<Warehouse>>;

    /// Returns the earliest outstanding order satisfying `query`.
    ///
    /// Implementations may lock the returned row until the transaction ends.
    async fn find_outstanding_order(&mut self, query: &OrderMatch) -> Result<Option<Order>>;

    /// Returns the earliest already-fulfilled order satisfying `query`.
    async fn find_fulfilled_order(&mut self, query: &OrderMatch) -> Result<Option<Order>>;

    async fn has_inventory_record_for_order(&mut self, order_id: OrderId) -> Result<bool>;

    /// Sets `fulfilled_at` on an outstanding order.
    ///
    /// Fails with `StoreError::Conflict` if the order is no longer outstanding.
    async fn mark_order_fulfilled(
        &mut self,
        order_id: OrderId,
        fulfilled_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Inserts an inventory record and returns its generated ID.
    ///
    /// Fails with `StoreError::Conflict` if a record already references the
    /// same order.
    async fn insert_inventory_record(
        &mut self,
        record: NewInventoryRecord,
    ) -> Result<InventoryRecordId>;

    /// Makes every write of this transaction visible atomically.
    async fn commit(self) -> Result<()>;

    /// Discards every write of this transaction.
    async fn rollback(self) -> Result<()>;
}
