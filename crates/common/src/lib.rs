//! Shared identifiers and value types for the reconciliation workspace.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{InventoryRecordId, OrderId, ProductId, WarehouseId};
