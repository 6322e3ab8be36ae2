//! Reconciliation error types.

use common::{OrderId, ProductId, WarehouseId};
use entity_store::StoreError;
use thiserror::Error;

/// Errors that can occur while reconciling a delivery.
///
/// Validation, not-found, duplicate and store failures are separate
/// variants so callers can choose between fixing input, ignoring a
/// duplicate delivery and retrying.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// The claim is malformed. Nothing was read or written.
    #[error("Invalid delivery claim: {0}")]
    InvalidClaim(String),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Warehouse not found: {0}")]
    WarehouseNotFound(WarehouseId),

    /// No order for this product and quantity was placed before the delivery.
    #[error("No outstanding order matches the delivery")]
    NoMatchingOrder,

    /// The matched order already has an inventory record.
    #[error("Order {0} is already fulfilled")]
    OrderAlreadyFulfilled(OrderId),

    /// The store failed, conflicted, or the unit of work was abandoned.
    /// All writes of the attempt were discarded.
    #[error("Transaction failed: {0}")]
    TransactionFailed(#[from] StoreError),
}

impl ReconciliationError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconciliationError::InvalidClaim(_) => "invalid_claim",
            ReconciliationError::ProductNotFound(_) => "product_not_found",
            ReconciliationError::WarehouseNotFound(_) => "warehouse_not_found",
            ReconciliationError::NoMatchingOrder => "no_matching_order",
            ReconciliationError::OrderAlreadyFulfilled(_) => "order_already_fulfilled",
            ReconciliationError::TransactionFailed(_) => "transaction_failed",
        }
    }

    /// Returns true if repeating the same claim unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconciliationError::TransactionFailed(_))
    }
}
