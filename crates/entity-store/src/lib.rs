//! Entity store for delivery reconciliation.
//!
//! Products, warehouses, purchase orders and inventory records behind a
//! transactional interface, with in-memory and PostgreSQL implementations.

pub mod error;
pub mod matching;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{InventoryRecordId, Money, OrderId, ProductId, WarehouseId};
pub use error::{Result, StoreError};
pub use matching::OrderMatch;
pub use memory::{InMemoryEntityStore, InMemoryTransaction};
pub use model::{InventoryRecord, NewInventoryRecord, Order, Product, Warehouse};
pub use postgres::{PostgresEntityStore, PostgresTransaction};
pub use store::{EntityStore, StoreTransaction};
