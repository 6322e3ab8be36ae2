use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    EntityStore, InventoryRecord, InventoryRecordId, Money, NewInventoryRecord, Order, OrderId,
    OrderMatch, Product, ProductId, Result, StoreError, StoreTransaction, Warehouse, WarehouseId,
};

/// Name of the unique constraint on `inventory_records.order_id`.
const UNIQUE_RECORD_PER_ORDER: &str = "unique_inventory_record_order";

const ORDER_COLUMNS: &str = "id, product_id, quantity, created_at, fulfilled_at";

const RECORD_COLUMNS: &str = "id, warehouse_id, product_id, order_id, quantity, total_value_cents, delivered_at, recorded_at";

/// PostgreSQL-backed entity store implementation.
#[derive(Clone)]
pub struct PostgresEntityStore {
    pool: PgPool,
}

impl PostgresEntityStore {
    /// Creates a new PostgreSQL entity store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query("INSERT INTO products (id, name, unit_price_cents) VALUES ($1, $2, $3)")
            .bind(product.id.get())
            .bind(&product.name)
            .bind(product.unit_price.cents())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<()> {
        sqlx::query("INSERT INTO warehouses (id, name) VALUES ($1, $2)")
            .bind(warehouse.id.get())
            .bind(&warehouse.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_order(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, product_id, quantity, created_at, fulfilled_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id.get())
        .bind(order.product_id.get())
        .bind(order.quantity)
        .bind(order.created_at)
        .bind(order.fulfilled_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            quantity: row.try_get("quantity")?,
            created_at: row.try_get("created_at")?,
            fulfilled_at: row.try_get("fulfilled_at")?,
        })
    }

    fn row_to_record(row: PgRow) -> Result<InventoryRecord> {
        Ok(InventoryRecord {
            id: InventoryRecordId::new(row.try_get("id")?),
            warehouse_id: WarehouseId::new(row.try_get("warehouse_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            quantity: row.try_get("quantity")?,
            total_value: Money::from_cents(row.try_get("total_value_cents")?),
            delivered_at: row.try_get("delivered_at")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

#[async_trait]
impl EntityStore for PostgresEntityStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn get_inventory_record(&self, id: InventoryRecordId) -> Result<Option<InventoryRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_records WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn inventory_records_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<InventoryRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_records WHERE order_id = $1 ORDER BY id ASC"
        ))
        .bind(order_id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }
}

/// Transaction over a [`PostgresEntityStore`].
///
/// Dropping it without committing rolls the database transaction back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, unit_price_cents FROM products WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(Some(Product {
                id: ProductId::new(row.try_get("id")?),
                name: row.try_get("name")?,
                unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            })),
            None => Ok(None),
        }
    }

    async fn get_warehouse(&mut self, id: WarehouseId) -> Result<Option<Warehouse>> {
        let row = sqlx::query("SELECT id, name FROM warehouses WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(Some(Warehouse {
                id: WarehouseId::new(row.try_get("id")?),
                name: row.try_get("name")?,
            })),
            None => Ok(None),
        }
    }

    async fn find_outstanding_order(&mut self, query: &OrderMatch) -> Result<Option<Order>> {
        // The row lock makes a concurrent fulfiller wait here; once it
        // commits the row no longer qualifies and is skipped.
        let row = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE product_id = $1 AND quantity = $2 AND created_at < $3 AND fulfilled_at IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE
            "#
        ))
        .bind(query.product_id.get())
        .bind(query.quantity)
        .bind(query.created_before)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(PostgresEntityStore::row_to_order).transpose()
    }

    async fn find_fulfilled_order(&mut self, query: &OrderMatch) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE product_id = $1 AND quantity = $2 AND created_at < $3 AND fulfilled_at IS NOT NULL
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#
        ))
        .bind(query.product_id.get())
        .bind(query.quantity)
        .bind(query.created_before)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(PostgresEntityStore::row_to_order).transpose()
    }

    async fn has_inventory_record_for_order(&mut self, order_id: OrderId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM inventory_records WHERE order_id = $1)",
        )
        .bind(order_id.get())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn mark_order_fulfilled(
        &mut self,
        order_id: OrderId,
        fulfilled_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE orders SET fulfilled_at = $1 WHERE id = $2 AND fulfilled_at IS NULL",
        )
        .bind(fulfilled_at)
        .bind(order_id.get())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict {
                order_id,
                reason: "order is no longer outstanding".to_string(),
            });
        }

        Ok(())
    }

    async fn insert_inventory_record(
        &mut self,
        record: NewInventoryRecord,
    ) -> Result<InventoryRecordId> {
        let order_id = record.order_id;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO inventory_records
                (warehouse_id, product_id, order_id, quantity, total_value_cents, delivered_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(record.warehouse_id.get())
        .bind(record.product_id.get())
        .bind(order_id.get())
        .bind(record.quantity)
        .bind(record.total_value.cents())
        .bind(record.delivered_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(UNIQUE_RECORD_PER_ORDER)
            {
                return StoreError::Conflict {
                    order_id,
                    reason: "inventory record already exists for order".to_string(),
                };
            }
            StoreError::Database(e)
        })?;

        Ok(InventoryRecordId::new(id))
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
