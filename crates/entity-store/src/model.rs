//! Row models for the four tables the reconciliation workflow touches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{InventoryRecordId, Money, OrderId, ProductId, WarehouseId};

/// A product that can be ordered and stocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Price of a single unit. Never negative.
    pub unit_price: Money,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, unit_price: Money) -> Self {
        Self {
            id,
            name: name.into(),
            unit_price,
        }
    }
}

/// A warehouse that receives deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
}

impl Warehouse {
    pub fn new(id: WarehouseId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A purchase order awaiting delivery.
///
/// An order is outstanding until `fulfilled_at` is set, which happens
/// exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates an outstanding order.
    pub fn new(
        id: OrderId,
        product_id: ProductId,
        quantity: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id,
            quantity,
            created_at,
            fulfilled_at: None,
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.fulfilled_at.is_none()
    }
}

/// Stock recorded in a warehouse as the result of fulfilling an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: InventoryRecordId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub order_id: OrderId,
    pub quantity: i64,
    /// Unit price at delivery time multiplied by the delivered quantity.
    pub total_value: Money,
    pub delivered_at: DateTime<Utc>,
    /// When the row was written.
    pub recorded_at: DateTime<Utc>,
}

/// Insert shape of an [`InventoryRecord`]; the store assigns `id` and `recorded_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInventoryRecord {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub order_id: OrderId,
    pub quantity: i64,
    pub total_value: Money,
    pub delivered_at: DateTime<Utc>,
}

impl NewInventoryRecord {
    pub(crate) fn into_record(
        self,
        id: InventoryRecordId,
        recorded_at: DateTime<Utc>,
    ) -> InventoryRecord {
        InventoryRecord {
            id,
            warehouse_id: self.warehouse_id,
            product_id: self.product_id,
            order_id: self.order_id,
            quantity: self.quantity,
            total_value: self.total_value,
            delivered_at: self.delivered_at,
            recorded_at,
        }
    }
}
