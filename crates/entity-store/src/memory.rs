use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    EntityStore, InventoryRecord, InventoryRecordId, NewInventoryRecord, Order, OrderId,
    OrderMatch, Product, ProductId, Result, StoreError, StoreTransaction, Warehouse, WarehouseId,
};

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    warehouses: HashMap<WarehouseId, Warehouse>,
    orders: BTreeMap<OrderId, Order>,
    inventory_records: BTreeMap<InventoryRecordId, InventoryRecord>,
    last_record_id: i64,
}

impl Tables {
    fn record_for_order(&self, order_id: OrderId) -> Option<&InventoryRecord> {
        self.inventory_records
            .values()
            .find(|r| r.order_id == order_id)
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_on_insert: AtomicBool,
    fail_on_commit: AtomicBool,
}

/// In-memory entity store for testing and local runs.
///
/// A transaction holds the table lock from `begin` until it commits or is
/// dropped, so transactions are serialized. Writes are staged inside the
/// transaction and only applied to the tables on commit.
#[derive(Clone, Default)]
pub struct InMemoryEntityStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
}

impl InMemoryEntityStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        self.tables
            .lock()
            .await
            .products
            .insert(product.id, product);
    }

    pub async fn insert_warehouse(&self, warehouse: Warehouse) {
        self.tables
            .lock()
            .await
            .warehouses
            .insert(warehouse.id, warehouse);
    }

    pub async fn insert_order(&self, order: Order) {
        self.tables.lock().await.orders.insert(order.id, order);
    }

    /// Inserts an inventory record directly, without touching its order.
    ///
    /// Still enforces one record per order.
    pub async fn insert_inventory_record(
        &self,
        record: NewInventoryRecord,
    ) -> Result<InventoryRecordId> {
        let mut tables = self.tables.lock().await;
        if tables.record_for_order(record.order_id).is_some() {
            return Err(StoreError::Conflict {
                order_id: record.order_id,
                reason: "inventory record already exists for order".to_string(),
            });
        }
        tables.last_record_id += 1;
        let id = InventoryRecordId::new(tables.last_record_id);
        tables
            .inventory_records
            .insert(id, record.into_record(id, Utc::now()));
        Ok(id)
    }

    /// Returns the total number of inventory records stored.
    pub async fn inventory_record_count(&self) -> usize {
        self.tables.lock().await.inventory_records.len()
    }

    /// Returns a copy of every order, ordered by ID.
    pub async fn orders(&self) -> Vec<Order> {
        self.tables.lock().await.orders.values().cloned().collect()
    }

    /// Makes every subsequent `insert_inventory_record` inside a transaction fail.
    pub fn set_fail_on_insert(&self, fail: bool) {
        self.faults.fail_on_insert.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent transaction commit fail.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.faults.fail_on_commit.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let tables = self.tables.clone().lock_owned().await;
        Ok(InMemoryTransaction {
            tables,
            faults: self.faults.clone(),
            fulfilled: Vec::new(),
            inserted: Vec::new(),
        })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.lock().await.orders.get(&id).cloned())
    }

    async fn get_inventory_record(&self, id: InventoryRecordId) -> Result<Option<InventoryRecord>> {
        Ok(self
            .tables
            .lock()
            .await
            .inventory_records
            .get(&id)
            .cloned())
    }

    async fn inventory_records_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<InventoryRecord>> {
        Ok(self
            .tables
            .lock()
            .await
            .inventory_records
            .values()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect())
    }
}

/// Transaction over an [`InMemoryEntityStore`].
pub struct InMemoryTransaction {
    tables: OwnedMutexGuard<Tables>,
    faults: Arc<Faults>,
    fulfilled: Vec<(OrderId, DateTime<Utc>)>,
    inserted: Vec<InventoryRecord>,
}

impl InMemoryTransaction {
    /// Orders as this transaction sees them, staged fulfillments included.
    fn visible_orders(&self) -> Vec<Order> {
        self.tables
            .orders
            .values()
            .map(|order| {
                let mut order = order.clone();
                if let Some((_, at)) = self.fulfilled.iter().find(|(id, _)| *id == order.id) {
                    order.fulfilled_at = Some(*at);
                }
                order
            })
            .collect()
    }

    fn has_record(&self, order_id: OrderId) -> bool {
        self.tables.record_for_order(order_id).is_some()
            || self.inserted.iter().any(|r| r.order_id == order_id)
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.products.get(&id).cloned())
    }

    async fn get_warehouse(&mut self, id: WarehouseId) -> Result<Option<Warehouse>> {
        Ok(self.tables.warehouses.get(&id).cloned())
    }

    async fn find_outstanding_order(&mut self, query: &OrderMatch) -> Result<Option<Order>> {
        let orders = self.visible_orders();
        Ok(query.select_outstanding(&orders).cloned())
    }

    async fn find_fulfilled_order(&mut self, query: &OrderMatch) -> Result<Option<Order>> {
        let orders = self.visible_orders();
        Ok(query.select_fulfilled(&orders).cloned())
    }

    async fn has_inventory_record_for_order(&mut self, order_id: OrderId) -> Result<bool> {
        Ok(self.has_record(order_id))
    }

    async fn mark_order_fulfilled(
        &mut self,
        order_id: OrderId,
        fulfilled_at: DateTime<Utc>,
    ) -> Result<()> {
        let Some(order) = self.tables.orders.get(&order_id) else {
            return Err(StoreError::Constraint(format!(
                "order {order_id} does not exist"
            )));
        };

        let already_staged = self.fulfilled.iter().any(|(id, _)| *id == order_id);
        if !order.is_outstanding() || already_staged {
            return Err(StoreError::Conflict {
                order_id,
                reason: "order is no longer outstanding".to_string(),
            });
        }

        self.fulfilled.push((order_id, fulfilled_at));
        Ok(())
    }

    async fn insert_inventory_record(
        &mut self,
        record: NewInventoryRecord,
    ) -> Result<InventoryRecordId> {
        if self.faults.fail_on_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "inventory record insert rejected".to_string(),
            ));
        }

        if self.has_record(record.order_id) {
            return Err(StoreError::Conflict {
                order_id: record.order_id,
                reason: "inventory record already exists for order".to_string(),
            });
        }

        let id = InventoryRecordId::new(self.tables.last_record_id + self.inserted.len() as i64 + 1);
        self.inserted.push(record.into_record(id, Utc::now()));
        Ok(id)
    }

    async fn commit(mut self) -> Result<()> {
        if self.faults.fail_on_commit.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("commit rejected".to_string()));
        }

        let fulfilled = std::mem::take(&mut self.fulfilled);
        for (order_id, at) in fulfilled {
            if let Some(order) = self.tables.orders.get_mut(&order_id) {
                order.fulfilled_at = Some(at);
            }
        }

        let inserted = std::mem::take(&mut self.inserted);
        for record in inserted {
            self.tables.last_record_id = self.tables.last_record_id.max(record.id.get());
            self.tables.inventory_records.insert(record.id, record);
        }

        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::Money;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    async fn seeded_store() -> InMemoryEntityStore {
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
        store
    }

    fn new_record(order_id: OrderId) -> NewInventoryRecord {
        NewInventoryRecord {
            warehouse_id: WarehouseId::new(1),
            product_id: ProductId::new(1),
            order_id,
            quantity: 3,
            total_value: Money::from_dollars(30),
            delivered_at: t0() + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = seeded_store().await;

        let mut tx = store.begin().await.unwrap();
        tx.mark_order_fulfilled(OrderId::new(5), t0() + Duration::hours(2))
            .await
            .unwrap();
        let id = tx
            .insert_inventory_record(new_record(OrderId::new(5)))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let order = store.get_order(OrderId::new(5)).await.unwrap().unwrap();
        assert!(!order.is_outstanding());
        let record = store.get_inventory_record(id).await.unwrap().unwrap();
        assert_eq!(record.order_id, OrderId::new(5));
        assert_eq!(record.total_value, Money::from_dollars(30));
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = seeded_store().await;

        let mut tx = store.begin().await.unwrap();
        tx.mark_order_fulfilled(OrderId::new(5), t0()).await.unwrap();
        tx.insert_inventory_record(new_record(OrderId::new(5)))
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        let order = store.get_order(OrderId::new(5)).await.unwrap().unwrap();
        assert!(order.is_outstanding());
        assert_eq!(store.inventory_record_count().await, 0);
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = seeded_store().await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.mark_order_fulfilled(OrderId::new(5), t0()).await.unwrap();
        }

        let order = store.get_order(OrderId::new(5)).await.unwrap().unwrap();
        assert!(order.is_outstanding());
    }

    #[tokio::test]
    async fn transaction_sees_its_own_staged_writes() {
        let store = seeded_store().await;
        let query = OrderMatch::new(ProductId::new(1), 3, t0() + Duration::hours(1));

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_outstanding_order(&query).await.unwrap().is_some());

        tx.mark_order_fulfilled(OrderId::new(5), t0()).await.unwrap();
        assert!(tx.find_outstanding_order(&query).await.unwrap().is_none());
        assert!(tx.find_fulfilled_order(&query).await.unwrap().is_some());

        tx.insert_inventory_record(new_record(OrderId::new(5)))
            .await
            .unwrap();
        assert!(
            tx.has_inventory_record_for_order(OrderId::new(5))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn second_fulfillment_conflicts() {
        let store = seeded_store().await;

        let mut tx = store.begin().await.unwrap();
        tx.mark_order_fulfilled(OrderId::new(5), t0()).await.unwrap();
        let result = tx.mark_order_fulfilled(OrderId::new(5), t0()).await;

        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn second_record_for_order_conflicts() {
        let store = seeded_store().await;
        store
            .insert_inventory_record(new_record(OrderId::new(5)))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        let result = tx.insert_inventory_record(new_record(OrderId::new(5))).await;

        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn fulfilling_unknown_order_is_a_constraint_violation() {
        let store = seeded_store().await;

        let mut tx = store.begin().await.unwrap();
        let result = tx.mark_order_fulfilled(OrderId::new(99), t0()).await;

        assert!(matches!(result, Err(StoreError::Constraint(_))));
    }

    #[tokio::test]
    async fn failed_commit_leaves_tables_untouched() {
        let store = seeded_store().await;
        store.set_fail_on_commit(true);

        let mut tx = store.begin().await.unwrap();
        tx.mark_order_fulfilled(OrderId::new(5), t0()).await.unwrap();
        tx.insert_inventory_record(new_record(OrderId::new(5)))
            .await
            .unwrap();
        assert!(tx.commit().await.is_err());

        let order = store.get_order(OrderId::new(5)).await.unwrap().unwrap();
        assert!(order.is_outstanding());
        assert_eq!(store.inventory_record_count().await, 0);
    }

    #[tokio::test]
    async fn record_ids_increase() {
        let store = seeded_store().await;
        store
            .insert_order(Order::new(OrderId::new(6), ProductId::new(1), 3, t0()))
            .await;

        let first = store
            .insert_inventory_record(new_record(OrderId::new(5)))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        let second = tx
            .insert_inventory_record(new_record(OrderId::new(6)))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(second > first);
        assert_eq!(store.inventory_record_count().await, 2);
    }
}
